//! Scheduled world tasks on a virtual clock.
//!
//! Every task is keyed by what it acts on. Scheduling a key again replaces
//! the pending task, cancelling removes it, and entries left behind in the
//! heap are skipped when popped.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

use crate::entities::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {
    /// Bring a dead mob back
    MobRespawn(EntityId),
    /// Walk a mob that forgot everyone back to its spawning point
    MobReturn(EntityId),
    /// Warn that a dropped item is about to disappear
    ItemBlink(EntityId),
    ItemDespawn(EntityId),
    /// Re-add a static item after it was taken
    ItemRespawn(EntityId),
    /// Firefox armor wears off
    FirepotionExpire(EntityId),
    /// Close a connection that has been silent for too long
    IdleDisconnect(EntityId),
    /// Periodic roaming pass over all mob areas
    AreaRoam,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<(Duration, u64, Task)>>,
    live: HashMap<Task, u64>,
    seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `task` at `at`, replacing any pending task with the same key
    pub fn schedule(&mut self, task: Task, at: Duration) {
        self.seq += 1;
        self.live.insert(task, self.seq);
        self.heap.push(Reverse((at, self.seq, task)));
    }

    pub fn cancel(&mut self, task: Task) {
        self.live.remove(&task);
    }

    pub fn is_scheduled(&self, task: Task) -> bool {
        self.live.contains_key(&task)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.live.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Next live task due at or before `now`, with its due time
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, Task)> {
        while let Some(Reverse((at, seq, task))) = self.heap.peek().copied() {
            if at > now {
                return None;
            }
            self.heap.pop();
            if self.live.get(&task) == Some(&seq) {
                self.live.remove(&task);
                return Some((at, task));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_tasks_fire_in_due_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(Task::ItemBlink(2), ms(200));
        timers.schedule(Task::ItemBlink(1), ms(100));
        timers.schedule(Task::AreaRoam, ms(100));

        assert_eq!(timers.pop_due(ms(50)), None);
        assert_eq!(timers.pop_due(ms(150)), Some((ms(100), Task::ItemBlink(1))));
        assert_eq!(timers.pop_due(ms(150)), Some((ms(100), Task::AreaRoam)));
        assert_eq!(timers.pop_due(ms(150)), None);
        assert_eq!(timers.pop_due(ms(200)), Some((ms(200), Task::ItemBlink(2))));
        assert!(timers.is_empty());
    }

    #[test]
    fn test_reschedule_replaces_and_cancel_removes() {
        let mut timers = TimerQueue::new();
        timers.schedule(Task::MobReturn(7), ms(100));
        timers.schedule(Task::MobReturn(7), ms(300));
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.pop_due(ms(200)), None);
        assert_eq!(timers.pop_due(ms(300)), Some((ms(300), Task::MobReturn(7))));

        timers.schedule(Task::IdleDisconnect(5), ms(100));
        assert!(timers.is_scheduled(Task::IdleDisconnect(5)));
        timers.cancel(Task::IdleDisconnect(5));
        assert!(!timers.is_scheduled(Task::IdleDisconnect(5)));
        assert_eq!(timers.pop_due(ms(1000)), None);
    }
}
