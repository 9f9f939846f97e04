use std::collections::HashMap;

/// A memo keyed by document path and guarded by the document's change
/// marker. A lookup with a different marker is a miss and drops the stale
/// entry.
#[derive(Debug)]
pub struct MarkerCache<T> {
    entries: HashMap<String, Entry<T>>,
}

#[derive(Debug)]
struct Entry<T> {
    marker: u64,
    value: T,
}

impl<T> Default for MarkerCache<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: Clone> MarkerCache<T> {
    pub fn get(&mut self, key: &str, marker: u64) -> Option<T> {
        match self.entries.get(key) {
            Some(entry) if entry.marker == marker => Some(entry.value.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, marker: u64, value: T) {
        self.entries.insert(key.into(), Entry { marker, value });
    }

    pub fn invalidate(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keeps only the entries whose key satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
