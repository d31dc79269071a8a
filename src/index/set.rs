//! The set index: an unordered collection of unique byte values per key.

use rand::seq::IteratorRandom;
use rand::Rng;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct SetIndex {
    record: HashMap<Vec<u8>, HashSet<Vec<u8>>>,
}

impl SetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member, returning the cardinality afterwards.
    pub fn sadd(&mut self, key: &[u8], member: Vec<u8>) -> usize {
        let set = self.record.entry(key.to_vec()).or_default();
        set.insert(member);
        set.len()
    }

    /// Removes a member, returning whether it was present.
    pub fn srem(&mut self, key: &[u8], member: &[u8]) -> bool {
        self.record
            .get_mut(key)
            .is_some_and(|set| set.remove(member))
    }

    /// Removes and returns up to `count` random members.
    pub fn spop(&mut self, key: &[u8], count: usize) -> Vec<Vec<u8>> {
        let Some(set) = self.record.get_mut(key) else {
            return Vec::new();
        };
        let mut rng = rand::thread_rng();
        let picked: Vec<Vec<u8>> = set.iter().cloned().choose_multiple(&mut rng, count);
        for member in &picked {
            set.remove(member);
        }
        picked
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> bool {
        self.record.get(key).is_some_and(|set| set.contains(member))
    }

    /// Random members without removal. A non-negative `count` yields up to
    /// `count` distinct members (the whole set when it is smaller); a
    /// negative `count` yields `-count` members that may repeat.
    pub fn srandmember(&self, key: &[u8], count: i64) -> Vec<Vec<u8>> {
        let Some(set) = self.record.get(key) else {
            return Vec::new();
        };
        if set.is_empty() || count == 0 {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        if count > 0 {
            set.iter().cloned().choose_multiple(&mut rng, count as usize)
        } else {
            let members: Vec<&Vec<u8>> = set.iter().collect();
            (0..count.unsigned_abs())
                .map(|_| members[rng.gen_range(0..members.len())].clone())
                .collect()
        }
    }

    /// Moves a member from `src` to `dst`. Returns whether the member was
    /// present in `src`.
    pub fn smove(&mut self, src: &[u8], dst: &[u8], member: &[u8]) -> bool {
        let removed = self
            .record
            .get_mut(src)
            .is_some_and(|set| set.remove(member));
        if removed {
            self.record
                .entry(dst.to_vec())
                .or_default()
                .insert(member.to_vec());
        }
        removed
    }

    pub fn scard(&self, key: &[u8]) -> usize {
        self.record.get(key).map_or(0, |set| set.len())
    }

    pub fn smembers(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.record
            .get(key)
            .map_or_else(Vec::new, |set| set.iter().cloned().collect())
    }

    /// The union of the given sets.
    pub fn sunion(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut union: HashSet<Vec<u8>> = HashSet::new();
        for key in keys {
            if let Some(set) = self.record.get(*key) {
                union.extend(set.iter().cloned());
            }
        }
        union.into_iter().collect()
    }

    /// Members of the first set that appear in none of the others.
    pub fn sdiff(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let Some((first, rest)) = keys.split_first() else {
            return Vec::new();
        };
        let Some(base) = self.record.get(*first) else {
            return Vec::new();
        };

        base.iter()
            .filter(|member| {
                !rest.iter().any(|key| {
                    self.record
                        .get(*key)
                        .is_some_and(|set| set.contains(*member))
                })
            })
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut values: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        values.sort();
        values
    }

    #[test]
    fn test_add_rem_members() {
        let mut index = SetIndex::new();
        assert_eq!(index.sadd(b"S", b"a".to_vec()), 1);
        assert_eq!(index.sadd(b"S", b"b".to_vec()), 2);
        assert_eq!(index.sadd(b"S", b"a".to_vec()), 2);

        assert!(index.sismember(b"S", b"a"));
        assert!(!index.sismember(b"S", b"c"));
        assert_eq!(index.scard(b"S"), 2);

        assert!(index.srem(b"S", b"a"));
        assert!(!index.srem(b"S", b"a"));
        assert_eq!(sorted(index.smembers(b"S")), vec![b"b".to_vec()]);
    }

    #[test]
    fn test_smove() {
        let mut index = SetIndex::new();
        index.sadd(b"A", b"x".to_vec());

        assert!(index.smove(b"A", b"B", b"x"));
        assert!(!index.sismember(b"A", b"x"));
        assert!(index.sismember(b"B", b"x"));

        assert!(!index.smove(b"A", b"B", b"x"));
        assert!(!index.smove(b"missing", b"B", b"x"));
    }

    #[test]
    fn test_spop() {
        let mut index = SetIndex::new();
        for m in [b"a".as_slice(), b"b", b"c"] {
            index.sadd(b"S", m.to_vec());
        }

        let popped = index.spop(b"S", 2);
        assert_eq!(popped.len(), 2);
        assert_eq!(index.scard(b"S"), 1);
        for member in &popped {
            assert!(!index.sismember(b"S", member));
        }

        // Popping more than remain drains the set.
        let rest = index.spop(b"S", 10);
        assert_eq!(rest.len(), 1);
        assert_eq!(index.scard(b"S"), 0);
    }

    #[test]
    fn test_srandmember() {
        let mut index = SetIndex::new();
        for m in [b"a".as_slice(), b"b", b"c"] {
            index.sadd(b"S", m.to_vec());
        }

        assert_eq!(index.srandmember(b"S", 2).len(), 2);
        assert_eq!(index.srandmember(b"S", 10).len(), 3);
        assert_eq!(index.srandmember(b"S", -5).len(), 5);
        assert!(index.srandmember(b"S", 0).is_empty());
        assert!(index.srandmember(b"missing", 3).is_empty());
        assert_eq!(index.scard(b"S"), 3, "srandmember must not remove members");
    }

    #[test]
    fn test_union_diff() {
        let mut index = SetIndex::new();
        for m in [b"a".as_slice(), b"b"] {
            index.sadd(b"A", m.to_vec());
        }
        for m in [b"b".as_slice(), b"c"] {
            index.sadd(b"B", m.to_vec());
        }

        assert_eq!(
            sorted(index.sunion(&[b"A", b"B"])),
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(sorted(index.sdiff(&[b"A", b"B"])), vec![b"a".to_vec()]);
        assert_eq!(sorted(index.sdiff(&[b"B", b"A"])), vec![b"c".to_vec()]);
        assert!(index.sdiff(&[]).is_empty());
    }
}
