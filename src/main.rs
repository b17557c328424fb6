//! Hexclash - Entry Point
//!
//! Headless battle simulator: builds a sample battle from command-line
//! options, runs quick combat or steps through it with the auto policy,
//! and prints the action log.

use clap::Parser;

use hexclash::battle::{
    ArmySetup, BattleResult, Battlefield, CreatureStats, TroopEntry,
};
use hexclash::core::config::CombatConfig;
use hexclash::core::error::Result;
use hexclash::core::types::{Environment, Side};

#[derive(Parser, Debug)]
#[command(name = "hexclash", about = "Tactical hex-battle simulator")]
struct Args {
    /// RNG seed for the battle
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Run a siege battle instead of an open-field one
    #[arg(long)]
    siege: bool,

    /// Step through turns and print each log entry as it happens
    #[arg(long)]
    stepwise: bool,

    /// Optional TOML file overriding the combat rules configuration
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn sample_troop(name: &str, count: u32, health: u32, speed: u32, initiative: u32) -> TroopEntry {
    TroopEntry {
        stats: CreatureStats {
            id: 1,
            name: name.into(),
            health,
            attack: 6,
            defense: 3,
            damage_min: 2,
            damage_max: 5,
            speed,
            initiative,
            value: health,
            ..CreatureStats::default()
        },
        count,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => CombatConfig::from_path(path)?,
        None => CombatConfig::default(),
    };

    let attacker = ArmySetup {
        troops: vec![
            sample_troop("Swordsman", 30, 35, 5, 8),
            sample_troop("Archer", 20, 10, 4, 9),
        ],
        hero: None,
    };
    let defender = ArmySetup {
        troops: vec![
            sample_troop("Pikeman", 40, 20, 4, 7),
            sample_troop("Griffin", 12, 25, 6, 10),
        ],
        hero: None,
    };

    let mut battle = if args.siege {
        Battlefield::new_siege_battle(attacker, defender, Environment::Grass, args.seed, config)?
    } else {
        Battlefield::new_hero_battle(attacker, defender, Environment::Grass, args.seed, config)?
    };

    tracing::info!(seed = args.seed, siege = args.siege, "battle starting");

    let result = if args.stepwise {
        let mut printed = 0;
        while battle.result() == BattleResult::InProgress {
            let Some(handle) = battle.active_unit() else {
                break;
            };
            battle.auto_move(handle);
            for entry in &battle.log()[printed..] {
                println!("{}", serde_json::to_string(entry)?);
            }
            printed = battle.log().len();
        }
        battle.result()
    } else {
        battle.run_quick_combat()
    };

    println!();
    println!("Result after {} rounds: {:?}", battle.round(), result);
    for side in [Side::Attacker, Side::Defender] {
        println!("{side:?} survivors:");
        for (stats, count) in battle.survivors(side) {
            println!("  {count} x {}", stats.name);
        }
    }
    println!("Winner experience: {}", battle.experience_for_winner());

    Ok(())
}
