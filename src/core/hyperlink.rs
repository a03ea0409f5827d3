//! OSC 8 hyperlink registry
//!
//! Cells store a small numeric id; the registry maps ids back to URIs.
//! Ids are handed out in increasing order and never reused while the
//! registry is alive, so a stale id in an old cell can only resolve to
//! nothing, never to a different link.

use std::collections::{HashMap, HashSet};

/// Registry size that triggers a sweep of unreferenced entries
pub const MAX_HYPERLINKS: usize = 4096;

#[derive(Debug, Clone)]
pub struct HyperlinkRegistry {
    by_id: HashMap<u32, String>,
    by_uri: HashMap<String, u32>,
    next_id: u32,
}

impl Default for HyperlinkRegistry {
    fn default() -> Self {
        Self {
            by_id: HashMap::new(),
            by_uri: HashMap::new(),
            next_id: 1,
        }
    }
}

impl HyperlinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.by_id.len() >= MAX_HYPERLINKS
    }

    pub fn id_of(&self, uri: &str) -> Option<u32> {
        self.by_uri.get(uri).copied()
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    /// Id for `uri`, registering it if needed (never 0)
    pub fn intern(&mut self, uri: String) -> u32 {
        if let Some(id) = self.id_of(&uri) {
            return id;
        }
        let id = self.next_id;
        self.next_id = self.next_id.checked_add(1).unwrap_or(1);
        self.by_uri.insert(uri.clone(), id);
        self.by_id.insert(id, uri);
        id
    }

    /// Drop every entry whose id is not in `live`
    pub fn retain_live(&mut self, live: &HashSet<u32>) {
        self.by_id.retain(|id, _| live.contains(id));
        self.by_uri.retain(|_, id| live.contains(id));
    }

    /// Drop the `n` oldest entries
    pub fn evict_oldest(&mut self, n: usize) {
        let mut ids: Vec<u32> = self.by_id.keys().copied().collect();
        ids.sort_unstable();
        for id in ids.into_iter().take(n) {
            if let Some(uri) = self.by_id.remove(&id) {
                self.by_uri.remove(&uri);
            }
        }
    }

    pub fn clear(&mut self) {
        self.by_id.clear();
        self.by_uri.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_reuses_ids() {
        let mut links = HyperlinkRegistry::new();
        let a = links.intern("https://a".into());
        let b = links.intern("https://b".into());
        assert_ne!(a, 0);
        assert_ne!(a, b);
        assert_eq!(links.intern("https://a".into()), a);
        assert_eq!(links.get(b), Some("https://b"));
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_retain_live_and_no_reuse() {
        let mut links = HyperlinkRegistry::new();
        let a = links.intern("https://a".into());
        let b = links.intern("https://b".into());
        links.retain_live(&HashSet::from([b]));
        assert_eq!(links.get(a), None);
        assert_eq!(links.id_of("https://a"), None);
        assert_eq!(links.get(b), Some("https://b"));

        // A re-registered URI gets a fresh id
        let again = links.intern("https://a".into());
        assert_ne!(again, a);
    }

    #[test]
    fn test_evict_oldest() {
        let mut links = HyperlinkRegistry::new();
        let ids: Vec<u32> = (0..5).map(|i| links.intern(format!("https://{i}"))).collect();
        links.evict_oldest(2);
        assert_eq!(links.len(), 3);
        assert_eq!(links.get(ids[0]), None);
        assert_eq!(links.get(ids[1]), None);
        assert_eq!(links.get(ids[4]), Some("https://4"));
    }
}
