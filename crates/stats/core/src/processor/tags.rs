//! Reference-counted tag set.
//!
//! Independent sources tagging the same processor with the same tag do not
//! clobber each other: N adds require N removes before the tag disappears.

use std::collections::HashMap;

use crate::ids::Tag;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagSet {
    counts: HashMap<Tag, u32>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the tag's count. Returns true if the tag became present.
    pub fn add(&mut self, tag: Tag) -> bool {
        let count = self.counts.entry(tag).or_insert(0);
        *count += 1;
        *count == 1
    }

    /// Decrements the tag's count, deleting it at zero.
    ///
    /// Returns true if the tag disappeared. Removing an absent tag is a no-op.
    pub fn remove(&mut self, tag: &str) -> bool {
        let Some(count) = self.counts.get_mut(tag) else {
            return false;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(tag);
            return true;
        }
        false
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.counts.contains_key(tag)
    }

    /// Current reference count (0 if absent).
    pub fn count(&self, tag: &str) -> u32 {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, u32)> + '_ {
        self.counts.iter().map(|(tag, count)| (tag, *count))
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn n_adds_need_n_removes() {
        let mut tags = TagSet::new();
        assert!(tags.add("Burning".into()));
        assert!(!tags.add("Burning".into()));
        assert_eq!(tags.count("Burning"), 2);
        assert_eq!(tags.len(), 1);

        assert!(!tags.remove("Burning"));
        assert!(tags.contains("Burning"));
        assert_eq!(tags.count("Burning"), 1);

        assert!(tags.remove("Burning"));
        assert!(!tags.contains("Burning"));
        assert_eq!(tags.len(), 0);
        assert!(tags.is_empty());
    }

    #[test]
    fn removing_absent_tag_is_noop() {
        let mut tags = TagSet::new();
        assert!(!tags.remove("Frozen"));
        assert_eq!(tags.count("Frozen"), 0);
    }
}
