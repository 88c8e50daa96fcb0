//! Deterministic timer queue.
//!
//! Timers never fire on their own: the owner asks for everything that is due
//! at a given instant and runs it. That keeps the engine single-threaded and
//! lets tests jump through time without sleeping.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    RegenerationTick,
    BoosterExpiry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimer {
    pub id: TimerId,
    pub kind: TimerKind,
    pub due: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Entry {
    due: DateTime<Utc>,
    seq: u64,
    id: TimerId,
    kind: TimerKind,
    period: Option<Duration>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // Reversed so the BinaryHeap pops the earliest due time, then the
    // earliest scheduled.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Entry>,
    cancelled: HashSet<TimerId>,
    next_id: u64,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule_once(&mut self, due: DateTime<Utc>, kind: TimerKind) -> TimerId {
        self.push(due, kind, None)
    }

    /// First firing at `first_due`, then every `period` after the previous due time.
    pub fn schedule_repeating(
        &mut self,
        first_due: DateTime<Utc>,
        period: Duration,
        kind: TimerKind,
    ) -> TimerId {
        let period = period.max(Duration::milliseconds(1));
        self.push(first_due, kind, Some(period))
    }

    pub fn cancel(&mut self, id: TimerId) -> bool {
        if self.queue.iter().any(|entry| entry.id == id) {
            self.cancelled.insert(id)
        } else {
            false
        }
    }

    pub fn cancel_kind(&mut self, kind: TimerKind) -> usize {
        let ids: Vec<TimerId> = self
            .queue
            .iter()
            .filter(|entry| entry.kind == kind && !self.cancelled.contains(&entry.id))
            .map(|entry| entry.id)
            .collect();
        let count = ids.len();
        self.cancelled.extend(ids);
        count
    }

    /// Removes and returns the earliest timer due at or before `now`.
    /// Repeating timers are re-armed one period after their due time.
    pub fn pop_due(&mut self, now: DateTime<Utc>) -> Option<DueTimer> {
        loop {
            let head = self.queue.peek()?;
            if head.due > now {
                return None;
            }

            let entry = self.queue.pop()?;
            if self.cancelled.remove(&entry.id) {
                continue;
            }

            if let Some(period) = entry.period {
                let seq = self.bump_seq();
                self.queue.push(Entry {
                    due: entry.due + period,
                    seq,
                    ..entry.clone()
                });
            }

            return Some(DueTimer {
                id: entry.id,
                kind: entry.kind,
                due: entry.due,
            });
        }
    }

    pub fn pending(&self) -> usize {
        self.queue
            .iter()
            .filter(|entry| !self.cancelled.contains(&entry.id))
            .count()
    }

    pub fn pending_of_kind(&self, kind: TimerKind) -> usize {
        self.queue
            .iter()
            .filter(|entry| entry.kind == kind && !self.cancelled.contains(&entry.id))
            .count()
    }

    fn push(&mut self, due: DateTime<Utc>, kind: TimerKind, period: Option<Duration>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let seq = self.bump_seq();
        self.queue.push(Entry {
            due,
            seq,
            id,
            kind,
            period,
        });
        id
    }

    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}
