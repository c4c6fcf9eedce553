use crate::event::{EventKey, IslandEvent};

/// Maximum number of events kept in the pending queue.
pub const MAX_QUEUE_LEN: usize = 10;

/// Pending events, highest priority first.
///
/// Holds at most `capacity` entries. Entries with the same [`EventKey`] are
/// collapsed into one (the one already queued wins), ties in priority keep
/// their insertion order, and when the queue overflows the lowest-priority
/// entries are dropped.
#[derive(Debug, Clone)]
pub struct EventQueue {
    events: Vec<IslandEvent>,
    capacity: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::with_capacity(MAX_QUEUE_LEN)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity + 1),
            capacity: capacity.max(1),
        }
    }

    /// Inserts `event`, re-sorts and truncates. Returns false when an entry
    /// with the same key was already queued.
    pub fn push(&mut self, event: IslandEvent) -> bool {
        let key = event.key();
        if self.contains(key) {
            return false;
        }
        self.events.push(event);
        // `sort_by` is stable, so equal priorities keep arrival order.
        self.events.sort_by(|a, b| b.priority.cmp(&a.priority));
        self.events.truncate(self.capacity);
        true
    }

    pub fn front(&self) -> Option<&IslandEvent> {
        self.events.first()
    }

    pub fn pop_front(&mut self) -> Option<IslandEvent> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }

    /// Removes the entry with `key`, if queued.
    pub fn remove(&mut self, key: EventKey) -> Option<IslandEvent> {
        let index = self.events.iter().position(|e| e.key() == key)?;
        Some(self.events.remove(index))
    }

    pub fn contains(&self, key: EventKey) -> bool {
        self.events.iter().any(|e| e.key() == key)
    }

    pub fn get_mut(&mut self, key: EventKey) -> Option<&mut IslandEvent> {
        self.events.iter_mut().find(|e| e.key() == key)
    }

    pub fn events(&self) -> &[IslandEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Keeps only the entries for which `keep` returns true. Order is preserved.
    pub fn retain(&mut self, keep: impl FnMut(&IslandEvent) -> bool) {
        self.events.retain(keep);
    }

    /// Mutable access to the entries. Keys and priorities must not change.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut IslandEvent> {
        self.events.iter_mut()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::*;
    use crate::event::{Payload, SoundMode};

    fn note(timestamp: i64, priority: u8) -> IslandEvent {
        IslandEvent::at(Payload::Notification(notification("app", "t")), timestamp)
            .with_priority(priority)
    }

    fn priorities(q: &EventQueue) -> Vec<u8> {
        q.events().iter().map(|e| e.priority).collect()
    }

    fn timestamps(q: &EventQueue) -> Vec<i64> {
        q.events().iter().map(|e| e.timestamp).collect()
    }

    // ── ordering ──────────────────────────────────────────────────────────────

    #[test]
    fn push_keeps_descending_priority() {
        let mut q = EventQueue::new();
        for (ts, p) in [(1, 3), (2, 9), (3, 1), (4, 7), (5, 5)] {
            q.push(note(ts, p));
            let ps = priorities(&q);
            assert!(ps.windows(2).all(|w| w[0] >= w[1]), "unsorted: {ps:?}");
        }
        assert_eq!(priorities(&q), vec![9, 7, 5, 3, 1]);
    }

    #[test]
    fn equal_priorities_keep_insertion_order() {
        let mut q = EventQueue::new();
        q.push(note(30, 5));
        q.push(note(10, 5));
        q.push(note(20, 8));
        q.push(note(40, 5));
        assert_eq!(timestamps(&q), vec![20, 30, 10, 40]);
    }

    // ── dedup ─────────────────────────────────────────────────────────────────

    #[test]
    fn same_kind_and_timestamp_collapse_to_one_entry() {
        let mut q = EventQueue::new();
        assert!(q.push(note(100, 5)));
        assert!(!q.push(note(100, 5)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn first_queued_duplicate_wins() {
        let mut q = EventQueue::new();
        q.push(note(100, 5));
        q.push(note(100, 9));
        assert_eq!(priorities(&q), vec![5]);
    }

    #[test]
    fn same_timestamp_different_kind_are_distinct() {
        let mut q = EventQueue::new();
        q.push(note(100, 5));
        q.push(IslandEvent::at(Payload::RingerMode(ringer(SoundMode::Silent)), 100));
        assert_eq!(q.len(), 2);
    }

    // ── capacity ──────────────────────────────────────────────────────────────

    #[test]
    fn fifteen_pushes_keep_ten_highest() {
        let mut q = EventQueue::new();
        // Priorities 0..=14; the ten highest are 5..=14.
        for i in 0..15u8 {
            q.push(note(i as i64, i));
        }
        assert_eq!(q.len(), MAX_QUEUE_LEN);
        assert_eq!(priorities(&q), (5..15u8).rev().collect::<Vec<_>>());
    }

    #[test]
    fn overflow_drops_latest_among_equal_lowest() {
        let mut q = EventQueue::with_capacity(3);
        q.push(note(1, 5));
        q.push(note(2, 5));
        q.push(note(3, 5));
        q.push(note(4, 5));
        assert_eq!(timestamps(&q), vec![1, 2, 3]);
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut q = EventQueue::with_capacity(0);
        q.push(note(1, 5));
        assert_eq!(q.len(), 1);
    }

    // ── removal ───────────────────────────────────────────────────────────────

    #[test]
    fn pop_front_returns_highest_priority() {
        let mut q = EventQueue::new();
        q.push(note(1, 5));
        q.push(note(2, 8));
        assert_eq!(q.pop_front().map(|e| e.priority), Some(8));
        assert_eq!(q.pop_front().map(|e| e.priority), Some(5));
        assert!(q.pop_front().is_none());
    }

    #[test]
    fn remove_by_key_leaves_others() {
        let mut q = EventQueue::new();
        q.push(note(1, 5));
        q.push(note(2, 5));
        let removed = q.remove(note(1, 5).key());
        assert_eq!(removed.map(|e| e.timestamp), Some(1));
        assert_eq!(timestamps(&q), vec![2]);
        assert!(q.remove(note(1, 5).key()).is_none());
    }

    #[test]
    fn retain_keeps_order() {
        let mut q = EventQueue::new();
        q.push(note(1, 5));
        q.push(note(2, 9));
        q.push(note(3, 5));
        q.retain(|e| e.timestamp != 1);
        assert_eq!(timestamps(&q), vec![2, 3]);
    }

    #[test]
    fn clear_empties_queue() {
        let mut q = EventQueue::new();
        q.push(note(1, 5));
        q.clear();
        assert!(q.is_empty());
        assert!(q.front().is_none());
    }
}
