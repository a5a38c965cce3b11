use std::collections::HashMap;

// Sized for a typical lane; the map grows past this as needed.
const DUP_INITIAL_CAPACITY: usize = 1 << 16;

/// Alignment count per read identifier.
#[derive(Clone, Debug)]
pub struct DuplicateTracker {
    counts: HashMap<Vec<u8>, u32>,
    max_count: u32,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DupSummary {
    pub distinct: u64,
    pub ambiguous: u64,
    pub singletons: u64,
    pub max_count: u32,
}

impl DuplicateTracker {
    pub fn new() -> Self {
        Self {
            counts: HashMap::with_capacity(DUP_INITIAL_CAPACITY),
            max_count: 0,
        }
    }

    pub fn observe(&mut self, id: &[u8]) {
        let key = normalize_id(id);
        let count = match self.counts.get_mut(key) {
            Some(c) => {
                *c += 1;
                *c
            }
            None => {
                self.counts.insert(key.to_vec(), 1);
                1
            }
        };
        if count > self.max_count {
            self.max_count = count;
        }
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn count(&self, id: &[u8]) -> u32 {
        self.counts.get(normalize_id(id)).copied().unwrap_or(0)
    }

    /// Identifiers aligned more often than a template allows are ambiguous;
    /// with paired data a lone alignment is a singleton (mate unmapped).
    pub fn summarize(&self, paired: bool) -> DupSummary {
        let expected = if paired { 2 } else { 1 };
        let mut ambiguous = 0u64;
        let mut singletons = 0u64;
        for &c in self.counts.values() {
            if c > expected {
                ambiguous += 1;
            }
            if c == 1 && paired {
                singletons += 1;
            }
        }
        DupSummary {
            distinct: self.counts.len() as u64,
            ambiguous,
            singletons,
            max_count: self.max_count,
        }
    }

    pub fn is_ambiguous(&self, id: &[u8], paired: bool) -> bool {
        self.count(id) > if paired { 2 } else { 1 }
    }
}

impl Default for DuplicateTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Drops everything from the first whitespace on, so `read/1 extra` style
/// comments from different pipelines collapse onto one key.
fn normalize_id(id: &[u8]) -> &[u8] {
    match id.iter().position(|b| b.is_ascii_whitespace()) {
        Some(p) => &id[..p],
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(ids: &[&str]) -> DuplicateTracker {
        let mut t = DuplicateTracker::new();
        for id in ids {
            t.observe(id.as_bytes());
        }
        t
    }

    #[test]
    fn unpaired_double_alignment_is_ambiguous() {
        let t = tracker(&["r1", "r1", "r2"]);
        assert!(t.is_ambiguous(b"r1", false));
        assert!(!t.is_ambiguous(b"r2", false));
        let s = t.summarize(false);
        assert_eq!(s.ambiguous, 1);
        assert_eq!(s.singletons, 0);
        assert_eq!(s.distinct, 2);
        assert_eq!(s.max_count, 2);
    }

    #[test]
    fn paired_double_alignment_is_expected() {
        let t = tracker(&["r1", "r1", "r2"]);
        assert!(!t.is_ambiguous(b"r1", true));
        let s = t.summarize(true);
        assert_eq!(s.ambiguous, 0);
        // r2 has one mapped mate only
        assert_eq!(s.singletons, 1);
    }

    #[test]
    fn paired_full_templates_have_no_singletons() {
        let t = tracker(&["r1", "r1", "r2", "r2"]);
        let s = t.summarize(true);
        assert_eq!(s.ambiguous, 0);
        assert_eq!(s.singletons, 0);
    }

    #[test]
    fn identifier_suffix_is_stripped() {
        let t = tracker(&["HWI:1:2 1:N:0", "HWI:1:2 2:N:0", "HWI:1:2\tx"]);
        assert_eq!(t.distinct(), 1);
        assert_eq!(t.count(b"HWI:1:2"), 3);
        assert_eq!(t.max_count(), 3);
    }
}
