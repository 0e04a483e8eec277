//! Named scheduling primitives
//!
//! The guard never touches real timers. Its deferred work is expressed
//! against three host-provided scheduling points ("after the current task",
//! "after N milliseconds", "on the next animation frame") and queued here. The host pumps the queue with its own clock, so tests drive
//! everything with virtual time.

/// When a queued task becomes runnable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    /// After the currently-running host task completes
    Microtask,
    /// `ms` milliseconds from the moment of scheduling
    AfterMs(u64),
    /// On the next animation frame (frames only run while visible)
    NextFrame,
}

#[derive(Debug)]
struct Timer<K> {
    due_at: u64,
    order: u64,
    kind: K,
}

/// Deadline queue generic over the task payload.
///
/// Timers run in `(due_at, order)` order so same-deadline tasks fire in
/// scheduling order, matching host timer semantics.
#[derive(Debug)]
pub struct TaskQueue<K> {
    timers: Vec<Timer<K>>,
    frame: Vec<K>,
    micro: std::collections::VecDeque<K>,
    next_order: u64,
}

impl<K> Default for TaskQueue<K> {
    fn default() -> Self {
        Self {
            timers: Vec::new(),
            frame: Vec::new(),
            micro: std::collections::VecDeque::new(),
            next_order: 0,
        }
    }
}

impl<K> TaskQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, due: Due, now: u64, kind: K) {
        match due {
            Due::Microtask => self.micro.push_back(kind),
            Due::NextFrame => self.frame.push(kind),
            Due::AfterMs(ms) => {
                let order = self.next_order;
                self.next_order += 1;
                self.timers.push(Timer { due_at: now.saturating_add(ms), order, kind });
            }
        }
    }

    /// Earliest timer deadline, if any timer is pending
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.iter().map(|t| t.due_at).min()
    }

    /// Remove and return all timers with `due_at <= now`, fire-ordered
    pub fn take_due(&mut self, now: u64) -> Vec<K> {
        let mut due: Vec<Timer<K>> = Vec::new();
        let mut rest: Vec<Timer<K>> = Vec::new();
        for t in self.timers.drain(..) {
            if t.due_at <= now {
                due.push(t);
            } else {
                rest.push(t);
            }
        }
        self.timers = rest;
        due.sort_by_key(|t| (t.due_at, t.order));
        due.into_iter().map(|t| t.kind).collect()
    }

    /// Remove and return all tasks waiting for the next frame
    pub fn take_frame(&mut self) -> Vec<K> {
        std::mem::take(&mut self.frame)
    }

    /// Remove and return queued microtasks in FIFO order
    pub fn take_micro(&mut self) -> Vec<K> {
        self.micro.drain(..).collect()
    }

    pub fn has_micro(&self) -> bool {
        !self.micro.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty() && self.frame.is_empty() && self.micro.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
        self.frame.clear();
        self.micro.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timers_fire_in_deadline_then_schedule_order() {
        let mut q: TaskQueue<&str> = TaskQueue::new();
        q.schedule(Due::AfterMs(50), 0, "b");
        q.schedule(Due::AfterMs(10), 0, "a");
        q.schedule(Due::AfterMs(50), 0, "c");
        assert_eq!(q.next_deadline(), Some(10));
        assert_eq!(q.take_due(9), Vec::<&str>::new());
        assert_eq!(q.take_due(50), vec!["a", "b", "c"]);
        assert!(q.is_empty());
    }

    #[test]
    fn due_is_relative_to_schedule_time() {
        let mut q: TaskQueue<u32> = TaskQueue::new();
        q.schedule(Due::AfterMs(100), 250, 1);
        assert_eq!(q.next_deadline(), Some(350));
        assert!(q.take_due(349).is_empty());
        assert_eq!(q.take_due(350), vec![1]);
    }

    #[test]
    fn frame_and_micro_buckets_are_separate() {
        let mut q: TaskQueue<&str> = TaskQueue::new();
        q.schedule(Due::NextFrame, 0, "f");
        q.schedule(Due::Microtask, 0, "m1");
        q.schedule(Due::Microtask, 0, "m2");
        assert!(q.has_micro());
        assert_eq!(q.take_micro(), vec!["m1", "m2"]);
        assert!(!q.has_micro());
        assert_eq!(q.take_frame(), vec!["f"]);
        assert!(q.take_frame().is_empty());
    }

    #[test]
    fn clear_drops_everything() {
        let mut q: TaskQueue<u8> = TaskQueue::new();
        q.schedule(Due::AfterMs(5), 0, 1);
        q.schedule(Due::NextFrame, 0, 2);
        q.schedule(Due::Microtask, 0, 3);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.next_deadline(), None);
    }
}
