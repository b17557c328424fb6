//! Turn scheduler: forward-looking initiative queue
//!
//! The queue is rebuilt from scratch whenever any unit's eligibility may
//! have changed; ordering is fully deterministic for a given battlefield
//! state. Consumption (auto-fire units, mismorale gating, round-end
//! processing) is driven by the battlefield.

use std::cmp::Ordering;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::battle::constants::QUEUE_LOOKAHEAD;
use crate::core::types::{Side, UnitHandle};

/// One slot of the forward queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueueEntry {
    Unit(UnitHandle),
    /// Consumed to trigger round-end processing
    RoundBoundary,
}

/// Scheduler states as seen by the battlefield
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No queue built yet (or nothing left alive)
    Idle,
    /// A unit is at the front
    Queued,
    /// A round boundary is at the front
    RoundBoundary,
}

/// Ordering inputs for one eligible unit
#[derive(Debug, Clone, Copy)]
pub struct QueueUnit {
    pub handle: UnitHandle,
    pub initiative: u32,
    pub speed: u32,
    pub screen_position: i32,
    pub waited: bool,
    pub acted: bool,
}

/// The forward move-queue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TurnQueue {
    entries: VecDeque<QueueEntry>,
}

impl TurnQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        match self.entries.front() {
            None => SchedulerState::Idle,
            Some(QueueEntry::Unit(_)) => SchedulerState::Queued,
            Some(QueueEntry::RoundBoundary) => SchedulerState::RoundBoundary,
        }
    }

    pub fn front(&self) -> Option<QueueEntry> {
        self.entries.front().copied()
    }

    pub fn pop(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    /// Rebuild the queue from the eligible units of both armies.
    ///
    /// `units` holds every living, non-disabled unit; per-round flags are
    /// honored for the current round and assumed cleared for lookahead
    /// rounds. `last_acted` seeds the exact-tie alternation.
    pub fn rebuild(&mut self, units: &[QueueUnit], last_acted: Side) {
        self.entries.clear();
        if units.is_empty() {
            return;
        }

        let mut alternator = last_acted.opposite();
        let mut first_round = true;

        while self.entries.len() < QUEUE_LOOKAHEAD {
            // The first planned round may be empty when everyone has
            // already acted; the boundary still goes in
            let round = plan_round(units, first_round, &mut alternator);
            first_round = false;

            self.entries.extend(round);
            self.entries.push_back(QueueEntry::RoundBoundary);
        }
    }
}

/// Plan one round of turns, honoring wait deferral and tie alternation
fn plan_round(units: &[QueueUnit], honor_flags: bool, alternator: &mut Side) -> Vec<QueueEntry> {
    let pending = |u: &&QueueUnit| !honor_flags || !u.acted;

    let mut normal: Vec<&QueueUnit> = units
        .iter()
        .filter(pending)
        .filter(|u| !honor_flags || !u.waited)
        .collect();
    let mut deferred: Vec<&QueueUnit> = units
        .iter()
        .filter(pending)
        .filter(|u| honor_flags && u.waited)
        .collect();

    // Fastest first within a side, screen position as the final tie-break
    normal.sort_by(|a, b| {
        b.initiative
            .cmp(&a.initiative)
            .then(b.speed.cmp(&a.speed))
            .then(a.screen_position.cmp(&b.screen_position))
    });
    // Whoever waited with the lowest initiative moves first among waiters
    deferred.sort_by(|a, b| {
        a.initiative
            .cmp(&b.initiative)
            .then(a.screen_position.cmp(&b.screen_position))
    });

    let mut round = Vec::with_capacity(normal.len() + deferred.len());
    merge_sides(&normal, alternator, &mut round, |a, b| {
        (b.initiative, b.speed).cmp(&(a.initiative, a.speed))
    });
    merge_sides(&deferred, alternator, &mut round, |a, b| {
        a.initiative.cmp(&b.initiative)
    });
    round
}

/// Interleave the attacker and defender queues of one group, alternating
/// on exact ties
fn merge_sides(
    group: &[&QueueUnit],
    alternator: &mut Side,
    out: &mut Vec<QueueEntry>,
    compare: impl Fn(&QueueUnit, &QueueUnit) -> Ordering,
) {
    let mut attackers = group
        .iter()
        .filter(|u| u.handle.side == Side::Attacker)
        .peekable();
    let mut defenders = group
        .iter()
        .filter(|u| u.handle.side == Side::Defender)
        .peekable();

    loop {
        match (attackers.peek(), defenders.peek()) {
            (Some(a), Some(d)) => {
                let pick_attacker = match compare(a, d) {
                    Ordering::Less => true,
                    Ordering::Greater => false,
                    Ordering::Equal => {
                        let side = *alternator;
                        *alternator = side.opposite();
                        side == Side::Attacker
                    }
                };
                let unit = if pick_attacker {
                    attackers.next()
                } else {
                    defenders.next()
                };
                out.push(QueueEntry::Unit(unit.expect("peeked").handle));
            }
            (Some(_), None) => {
                out.extend(attackers.by_ref().map(|u| QueueEntry::Unit(u.handle)));
            }
            (None, Some(_)) => {
                out.extend(defenders.by_ref().map(|u| QueueEntry::Unit(u.handle)));
            }
            (None, None) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qu(side: Side, slot: u8, initiative: u32, speed: u32, screen: i32) -> QueueUnit {
        QueueUnit {
            handle: UnitHandle::new(side, slot),
            initiative,
            speed,
            screen_position: screen,
            waited: false,
            acted: false,
        }
    }

    fn handles(queue: &TurnQueue) -> Vec<QueueEntry> {
        queue.entries().copied().collect()
    }

    #[test]
    fn test_empty_input_leaves_idle() {
        let mut queue = TurnQueue::new();
        queue.rebuild(&[], Side::Defender);
        assert_eq!(queue.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_higher_initiative_acts_first() {
        let mut queue = TurnQueue::new();
        let units = [
            qu(Side::Attacker, 0, 3, 5, 0),
            qu(Side::Defender, 0, 7, 2, 100),
        ];
        queue.rebuild(&units, Side::Defender);

        assert_eq!(
            queue.front(),
            Some(QueueEntry::Unit(UnitHandle::new(Side::Defender, 0)))
        );
    }

    #[test]
    fn test_speed_breaks_initiative_tie() {
        let mut queue = TurnQueue::new();
        let units = [
            qu(Side::Attacker, 0, 5, 3, 0),
            qu(Side::Defender, 0, 5, 6, 100),
        ];
        queue.rebuild(&units, Side::Defender);

        assert_eq!(
            queue.front(),
            Some(QueueEntry::Unit(UnitHandle::new(Side::Defender, 0)))
        );
    }

    #[test]
    fn test_exact_tie_goes_to_side_that_did_not_act_last() {
        let units = [
            qu(Side::Attacker, 0, 5, 5, 0),
            qu(Side::Defender, 0, 5, 5, 100),
        ];

        let mut queue = TurnQueue::new();
        queue.rebuild(&units, Side::Defender);
        assert_eq!(
            queue.front(),
            Some(QueueEntry::Unit(UnitHandle::new(Side::Attacker, 0)))
        );

        queue.rebuild(&units, Side::Attacker);
        assert_eq!(
            queue.front(),
            Some(QueueEntry::Unit(UnitHandle::new(Side::Defender, 0)))
        );
    }

    #[test]
    fn test_consecutive_ties_alternate_within_round() {
        let units = [
            qu(Side::Attacker, 0, 5, 5, 0),
            qu(Side::Attacker, 1, 5, 5, 1),
            qu(Side::Defender, 0, 5, 5, 100),
            qu(Side::Defender, 1, 5, 5, 101),
        ];
        let mut queue = TurnQueue::new();
        queue.rebuild(&units, Side::Defender);

        let first_round: Vec<Side> = handles(&queue)
            .iter()
            .take(4)
            .map(|e| match e {
                QueueEntry::Unit(h) => h.side,
                QueueEntry::RoundBoundary => panic!("boundary too early"),
            })
            .collect();
        assert_eq!(
            first_round,
            vec![Side::Attacker, Side::Defender, Side::Attacker, Side::Defender]
        );
    }

    #[test]
    fn test_waited_units_go_last_lowest_initiative_first() {
        let mut fast_waiter = qu(Side::Attacker, 0, 9, 9, 0);
        fast_waiter.waited = true;
        let mut slow_waiter = qu(Side::Attacker, 1, 2, 2, 1);
        slow_waiter.waited = true;
        let normal = qu(Side::Defender, 0, 1, 1, 100);

        let mut queue = TurnQueue::new();
        queue.rebuild(&[fast_waiter, slow_waiter, normal], Side::Defender);

        let first_three: Vec<QueueEntry> = handles(&queue).into_iter().take(3).collect();
        assert_eq!(
            first_three,
            vec![
                QueueEntry::Unit(normal.handle),
                QueueEntry::Unit(slow_waiter.handle),
                QueueEntry::Unit(fast_waiter.handle),
            ]
        );
    }

    #[test]
    fn test_acted_units_skip_current_round_only() {
        let mut acted = qu(Side::Attacker, 0, 9, 9, 0);
        acted.acted = true;
        let fresh = qu(Side::Defender, 0, 1, 1, 100);

        let mut queue = TurnQueue::new();
        queue.rebuild(&[acted, fresh], Side::Defender);

        let entries = handles(&queue);
        // Current round: only the fresh unit before the first boundary
        assert_eq!(entries[0], QueueEntry::Unit(fresh.handle));
        assert_eq!(entries[1], QueueEntry::RoundBoundary);
        // Next round: the acted unit is back, and first (higher initiative)
        assert_eq!(entries[2], QueueEntry::Unit(acted.handle));
    }

    #[test]
    fn test_lookahead_depth_filled() {
        let units = [qu(Side::Attacker, 0, 5, 5, 0), qu(Side::Defender, 0, 4, 4, 100)];
        let mut queue = TurnQueue::new();
        queue.rebuild(&units, Side::Defender);
        assert!(queue.entries().count() >= QUEUE_LOOKAHEAD);
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let units = [
            qu(Side::Attacker, 0, 5, 5, 0),
            qu(Side::Attacker, 1, 3, 7, 20),
            qu(Side::Defender, 0, 5, 5, 100),
            qu(Side::Defender, 1, 6, 1, 120),
        ];
        let mut a = TurnQueue::new();
        let mut b = TurnQueue::new();
        a.rebuild(&units, Side::Defender);
        b.rebuild(&units, Side::Defender);
        assert_eq!(handles(&a), handles(&b));
    }

    #[test]
    fn test_screen_position_orders_same_side_ties() {
        let units = [
            qu(Side::Attacker, 1, 5, 5, 40),
            qu(Side::Attacker, 0, 5, 5, 3),
        ];
        let mut queue = TurnQueue::new();
        queue.rebuild(&units, Side::Defender);
        assert_eq!(
            queue.front(),
            Some(QueueEntry::Unit(UnitHandle::new(Side::Attacker, 0)))
        );
    }
}
