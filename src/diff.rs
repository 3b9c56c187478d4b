//! Detects which entries of a fresh snapshot arrived since the previous one.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::model::FetchSnapshot;

/// How long a batch of new entries stays highlighted
pub const HIGHLIGHT_TTL: Duration = Duration::from_millis(1500);

/// Ids in `next` that were not in `previous`. Identity only: an id present in
/// both is never new, whatever its content. A first load highlights nothing.
pub fn diff(previous: &FetchSnapshot, next: &FetchSnapshot) -> HashSet<i64> {
    if previous.is_empty() {
        return HashSet::new();
    }
    let seen: HashSet<i64> = previous.ids().collect();
    next.ids().filter(|id| !seen.contains(id)).collect()
}

struct HighlightBatch {
    ids: HashSet<i64>,
    expires_at: Instant,
}

/// Transient set of "new" ids. Every batch expires on its own clock; a later
/// batch never extends an earlier one.
pub struct HighlightSet {
    ttl: Duration,
    batches: Vec<HighlightBatch>,
}

impl Default for HighlightSet {
    fn default() -> Self {
        Self::new(HIGHLIGHT_TTL)
    }
}

impl HighlightSet {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            batches: Vec::new(),
        }
    }

    /// Add a batch expiring `ttl` after `now`. Empty batches are ignored.
    pub fn insert(&mut self, ids: HashSet<i64>, now: Instant) {
        if ids.is_empty() {
            return;
        }
        self.batches.push(HighlightBatch {
            ids,
            expires_at: now + self.ttl,
        });
    }

    /// Drop every batch whose deadline has passed
    pub fn expire(&mut self, now: Instant) {
        self.batches.retain(|b| b.expires_at > now);
    }

    pub fn contains(&self, id: i64) -> bool {
        self.batches.iter().any(|b| b.ids.contains(&id))
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.batches
            .iter()
            .flat_map(|b| b.ids.iter())
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LogEntry, LogLevel};

    fn entry(id: Option<i64>, message: &str) -> LogEntry {
        LogEntry {
            id,
            timestamp: "2024-05-01 10:00:00".to_string(),
            level: LogLevel::Error,
            category: None,
            function: None,
            message: message.to_string(),
        }
    }

    fn snapshot(ids: &[i64]) -> FetchSnapshot {
        FetchSnapshot {
            entries: ids.iter().map(|id| entry(Some(*id), "m")).collect(),
            ..FetchSnapshot::default()
        }
    }

    #[test]
    fn test_diff_reports_only_new_ids() {
        let new = diff(&snapshot(&[1, 2, 3]), &snapshot(&[2, 3, 4, 5]));
        assert_eq!(new, HashSet::from([4, 5]));
    }

    #[test]
    fn test_first_load_highlights_nothing() {
        assert!(diff(&FetchSnapshot::empty(), &snapshot(&[1, 2, 3])).is_empty());
    }

    #[test]
    fn test_unchanged_ids_yield_nothing() {
        assert!(diff(&snapshot(&[1, 2, 3]), &snapshot(&[3, 2, 1])).is_empty());
    }

    #[test]
    fn test_content_change_is_not_new() {
        let prev = FetchSnapshot {
            entries: vec![entry(Some(1), "before")],
            ..FetchSnapshot::default()
        };
        let next = FetchSnapshot {
            entries: vec![entry(Some(1), "after")],
            ..FetchSnapshot::default()
        };
        assert!(diff(&prev, &next).is_empty());
    }

    #[test]
    fn test_entries_without_id_never_new() {
        let prev = snapshot(&[1]);
        let next = FetchSnapshot {
            entries: vec![entry(None, "anon"), entry(Some(1), "m"), entry(Some(9), "m")],
            ..FetchSnapshot::default()
        };
        assert_eq!(diff(&prev, &next), HashSet::from([9]));
    }

    #[test]
    fn test_diff_is_subset_of_next_minus_previous() {
        let cases: [(&[i64], &[i64]); 4] = [
            (&[1, 2], &[2, 3]),
            (&[5], &[]),
            (&[1, 2, 3], &[1, 2, 3, 4, 5, 6]),
            (&[10, 20], &[30, 10, 40]),
        ];
        for (a, b) in cases {
            let result = diff(&snapshot(a), &snapshot(b));
            for id in &result {
                assert!(b.contains(id));
                assert!(!a.contains(id));
            }
        }
    }

    #[test]
    fn test_batches_expire_independently() {
        let start = Instant::now();
        let mut set = HighlightSet::default();

        set.insert(HashSet::from([1]), start);
        set.insert(HashSet::from([2]), start + Duration::from_millis(1000));
        assert!(set.contains(1) && set.contains(2));
        assert_eq!(set.len(), 2);

        // First batch expires on its own deadline; the second does not extend it
        set.expire(start + Duration::from_millis(1500));
        assert!(!set.contains(1));
        assert!(set.contains(2));

        set.expire(start + Duration::from_millis(2500));
        assert!(set.is_empty());
    }

    #[test]
    fn test_empty_batch_ignored_and_clear() {
        let now = Instant::now();
        let mut set = HighlightSet::default();
        set.insert(HashSet::new(), now);
        assert!(set.is_empty());

        set.insert(HashSet::from([3]), now);
        assert_eq!(set.len(), 1);
        set.clear();
        assert!(set.is_empty());
    }
}
