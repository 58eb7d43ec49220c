use serde::{Deserialize, Serialize};

use super::TriggerKind;

/// Lines kept per trigger kind before the oldest is evicted.
pub const DEFAULT_CACHE_CAPACITY: usize = 20;

/// Per-kind pools of previously generated lines.
///
/// Each pool is ordered oldest-first; the last element is the most recent.
/// Persisted inside the profile document, hence the flat field layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueCache {
    #[serde(default)]
    pub scolding: Vec<String>,
    #[serde(default)]
    pub click: Vec<String>,
    #[serde(default)]
    pub pause: Vec<String>,
    #[serde(default)]
    pub start: Vec<String>,
}

impl DialogueCache {
    pub fn lines(&self, kind: TriggerKind) -> &[String] {
        match kind {
            TriggerKind::Scolding => &self.scolding,
            TriggerKind::Click => &self.click,
            TriggerKind::Pause => &self.pause,
            TriggerKind::Start => &self.start,
        }
    }

    fn lines_mut(&mut self, kind: TriggerKind) -> &mut Vec<String> {
        match kind {
            TriggerKind::Scolding => &mut self.scolding,
            TriggerKind::Click => &mut self.click,
            TriggerKind::Pause => &mut self.pause,
            TriggerKind::Start => &mut self.start,
        }
    }

    /// Append a line as the most recent entry, evicting the oldest beyond
    /// `capacity`. Blank lines and repeats of the latest line are rejected.
    pub fn push(&mut self, kind: TriggerKind, line: &str, capacity: usize) -> bool {
        let line = line.trim();
        if line.is_empty() || capacity == 0 {
            return false;
        }
        let pool = self.lines_mut(kind);
        if pool.last().map(String::as_str) == Some(line) {
            return false;
        }
        pool.push(line.to_string());
        if pool.len() > capacity {
            let overflow = pool.len() - capacity;
            pool.drain(..overflow);
        }
        true
    }

    /// Take the most recent line for `kind`.
    pub fn pop_recent(&mut self, kind: TriggerKind) -> Option<String> {
        self.lines_mut(kind).pop()
    }

    pub fn len(&self, kind: TriggerKind) -> usize {
        self.lines(kind).len()
    }

    pub fn is_empty(&self, kind: TriggerKind) -> bool {
        self.lines(kind).is_empty()
    }

    pub fn total_len(&self) -> usize {
        TriggerKind::ALL.iter().map(|k| self.len(*k)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_at_capacity() {
        let mut cache = DialogueCache::default();
        for line in ["a", "b", "c", "d"] {
            cache.push(TriggerKind::Click, line, 3);
        }
        assert_eq!(cache.lines(TriggerKind::Click), ["b", "c", "d"]);
    }

    #[test]
    fn push_rejects_consecutive_duplicates_and_blanks() {
        let mut cache = DialogueCache::default();
        assert!(cache.push(TriggerKind::Start, "hello", 5));
        assert!(!cache.push(TriggerKind::Start, " hello ", 5));
        assert!(!cache.push(TriggerKind::Start, "   ", 5));
        assert!(cache.push(TriggerKind::Start, "again", 5));
        assert!(cache.push(TriggerKind::Start, "hello", 5));
        assert_eq!(cache.len(TriggerKind::Start), 3);
    }

    #[test]
    fn pop_takes_most_recent_and_kinds_are_independent() {
        let mut cache = DialogueCache::default();
        cache.push(TriggerKind::Pause, "old", 5);
        cache.push(TriggerKind::Pause, "new", 5);
        cache.push(TriggerKind::Scolding, "hey", 5);
        assert_eq!(cache.pop_recent(TriggerKind::Pause).as_deref(), Some("new"));
        assert_eq!(cache.pop_recent(TriggerKind::Pause).as_deref(), Some("old"));
        assert_eq!(cache.pop_recent(TriggerKind::Pause), None);
        assert_eq!(cache.total_len(), 1);
    }

    #[test]
    fn deserializes_partial_document() {
        let cache: DialogueCache = serde_json::from_str(r#"{"click":["hi"]}"#).unwrap();
        assert_eq!(cache.lines(TriggerKind::Click), ["hi"]);
        assert!(cache.is_empty(TriggerKind::Scolding));
    }
}
