//! Repeating timers keyed by simulation time.
//!
//! A min-heap ordered by due time, then by scheduling order. The
//! simulation drains it once per tick; a timer whose period elapsed
//! several times within one tick fires once per elapsed period.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::Serialize;

use crate::factions::Faction;
use crate::math::Fixed;

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Credit base income.
    BaseIncome,
    /// Let idle combat units look for targets.
    AutoEngageScan,
    /// AI: idle workers harvest or wander.
    AiHarvest(Faction),
    /// AI: build a barracks or start production.
    AiBuild(Faction),
    /// AI: send an attack wave.
    AiAttackWave(Faction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ScheduledTimer {
    due: Fixed,
    seq: u64,
    kind: TimerKind,
    interval: Fixed,
}

/// Queue of repeating timers.
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<ScheduledTimer>>,
    next_seq: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `kind` to fire at `first_due` and every `interval` after.
    ///
    /// Non-positive intervals are refused (they would fire forever within
    /// a single tick).
    pub fn schedule_repeating(&mut self, kind: TimerKind, first_due: Fixed, interval: Fixed) {
        if interval <= Fixed::ZERO {
            tracing::warn!(?kind, %interval, "Refusing timer with non-positive interval");
            return;
        }
        self.push(kind, first_due, interval);
    }

    fn push(&mut self, kind: TimerKind, due: Fixed, interval: Fixed) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(ScheduledTimer {
            due,
            seq,
            kind,
            interval,
        }));
    }

    /// Pop the earliest timer due at or before `now`, rescheduling it.
    ///
    /// A timer whose next due time would pass [`Fixed::MAX`] fires this
    /// last time and is retired.
    pub fn pop_due(&mut self, now: Fixed) -> Option<TimerKind> {
        let Reverse(next) = *self.heap.peek()?;
        if next.due > now {
            return None;
        }
        self.heap.pop();
        match next.due.checked_add(next.interval) {
            Some(due) => self.push(next.kind, due, next.interval),
            None => tracing::warn!(kind = ?next.kind, "Retiring timer at end of clock range"),
        }
        Some(next.kind)
    }

    /// When the next timer fires.
    #[must_use]
    pub fn next_due(&self) -> Option<Fixed> {
        self.heap.peek().map(|Reverse(t)| t.due)
    }

    /// Number of scheduled timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether no timers are scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(queue: &mut TimerQueue, now: Fixed) -> Vec<TimerKind> {
        std::iter::from_fn(|| queue.pop_due(now)).collect()
    }

    #[test]
    fn test_fires_in_due_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_repeating(TimerKind::AiBuild(Faction::Enemy), Fixed::from_num(15), Fixed::from_num(15));
        queue.schedule_repeating(TimerKind::BaseIncome, Fixed::ONE, Fixed::ONE);

        assert!(drain(&mut queue, Fixed::from_num(0.5)).is_empty());
        assert_eq!(drain(&mut queue, Fixed::ONE), vec![TimerKind::BaseIncome]);
        assert_eq!(queue.next_due(), Some(Fixed::from_num(2)));
    }

    #[test]
    fn test_catch_up_fires_once_per_period() {
        let mut queue = TimerQueue::new();
        queue.schedule_repeating(TimerKind::BaseIncome, Fixed::ONE, Fixed::ONE);
        let fired = drain(&mut queue, Fixed::from_num(3.5));
        assert_eq!(fired, vec![TimerKind::BaseIncome; 3]);
        assert_eq!(queue.next_due(), Some(Fixed::from_num(4)));
    }

    #[test]
    fn test_same_due_time_keeps_schedule_order() {
        let mut queue = TimerQueue::new();
        queue.schedule_repeating(TimerKind::AiHarvest(Faction::Enemy), Fixed::ONE, Fixed::ONE);
        queue.schedule_repeating(TimerKind::BaseIncome, Fixed::ONE, Fixed::ONE);
        assert_eq!(
            drain(&mut queue, Fixed::ONE),
            vec![TimerKind::AiHarvest(Faction::Enemy), TimerKind::BaseIncome]
        );
    }

    #[test]
    fn test_timer_retires_at_end_of_clock() {
        let mut queue = TimerQueue::new();
        queue.schedule_repeating(TimerKind::BaseIncome, Fixed::MAX, Fixed::ONE);
        assert_eq!(drain(&mut queue, Fixed::MAX), vec![TimerKind::BaseIncome]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        let mut queue = TimerQueue::new();
        queue.schedule_repeating(TimerKind::BaseIncome, Fixed::ZERO, Fixed::ZERO);
        assert!(queue.is_empty());
    }
}
