//! Sorted set operations.
//!
//! The score travels in the record's extra slot as decimal text. Rust's
//! float formatting emits the shortest string that round-trips, so a score
//! parsed back at recovery compares equal to the one that was written.

use crate::error::Result;
use crate::storage::entry::{Entry, EntryKind, ZSetMark};
use crate::store::{Inner, KilnDb};

impl KilnDb {
    /// Adds `member` with `score`, relocating it when it already exists.
    pub fn z_add(&self, key: &[u8], score: f64, member: &[u8]) -> Result<()> {
        self.check_key_value(key, &[member])?;
        let mut inner = self.write_guard();
        self.z_add_locked(&mut inner, key, score, member)
    }

    pub fn z_score(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        let inner = self.read_guard();
        inner.idx.zsets.zscore(key, member)
    }

    pub fn z_card(&self, key: &[u8]) -> usize {
        let inner = self.read_guard();
        inner.idx.zsets.zcard(key)
    }

    /// The member's rank in ascending score order.
    pub fn z_rank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        let inner = self.read_guard();
        inner.idx.zsets.zrank(key, member)
    }

    /// The member's rank in descending score order.
    pub fn z_rev_rank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        let inner = self.read_guard();
        inner.idx.zsets.zrevrank(key, member)
    }

    /// Adds `delta` to the member's score (absent members start at 0) and
    /// returns the new score.
    pub fn z_incr_by(&self, key: &[u8], delta: f64, member: &[u8]) -> Result<f64> {
        self.check_key_value(key, &[member])?;
        let mut inner = self.write_guard();
        let score = inner.idx.zsets.zscore(key, member).unwrap_or(0.0) + delta;
        self.z_add_locked(&mut inner, key, score, member)?;
        Ok(score)
    }

    /// Members in ascending rank order within `[start, stop]`.
    pub fn z_range(&self, key: &[u8], start: i64, stop: i64) -> Vec<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.zsets.zrange(key, start, stop)
    }

    /// Members in descending rank order within `[start, stop]`.
    pub fn z_rev_range(&self, key: &[u8], start: i64, stop: i64) -> Vec<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.zsets.zrevrange(key, start, stop)
    }

    /// The member and score at the given ascending rank.
    pub fn z_get_by_rank(&self, key: &[u8], rank: i64) -> Option<(Vec<u8>, f64)> {
        let inner = self.read_guard();
        inner.idx.zsets.zget_by_rank(key, rank)
    }

    /// The member and score at the given descending rank.
    pub fn z_rev_get_by_rank(&self, key: &[u8], rank: i64) -> Option<(Vec<u8>, f64)> {
        let inner = self.read_guard();
        inner.idx.zsets.zrev_get_by_rank(key, rank)
    }

    /// Members with scores in `[min, max]`, ascending.
    pub fn z_score_range(&self, key: &[u8], min: f64, max: f64) -> Vec<(Vec<u8>, f64)> {
        let inner = self.read_guard();
        inner.idx.zsets.zscore_range(key, min, max)
    }

    /// Members with scores in `[min, max]`, descending.
    pub fn z_rev_score_range(&self, key: &[u8], max: f64, min: f64) -> Vec<(Vec<u8>, f64)> {
        let inner = self.read_guard();
        inner.idx.zsets.zrev_score_range(key, max, min)
    }

    /// Removes `member`, returning whether it was present.
    pub fn z_rem(&self, key: &[u8], member: &[u8]) -> Result<bool> {
        self.check_key_value(key, &[member])?;
        let mut inner = self.write_guard();
        if !inner.idx.zsets.zrem(key, member) {
            return Ok(false);
        }

        let entry = Entry::without_extra(
            EntryKind::ZSet(ZSetMark::ZRem),
            key.to_vec(),
            member.to_vec(),
        );
        inner.store(&self.config, &entry)?;
        Ok(true)
    }

    fn z_add_locked(&self, inner: &mut Inner, key: &[u8], score: f64, member: &[u8]) -> Result<()> {
        let entry = Entry::new(
            EntryKind::ZSet(ZSetMark::ZAdd),
            key.to_vec(),
            member.to_vec(),
            score.to_string().into_bytes(),
        );
        inner.store(&self.config, &entry)?;
        inner.idx.zsets.zadd(key, score, member.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use tempfile::TempDir;

    fn create_test_db(temp_dir: &TempDir) -> KilnDb {
        KilnDb::open(Config::new(temp_dir.path())).expect("Failed to open database")
    }

    #[test]
    fn test_add_score_rank() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        db.z_add(b"Z", 1.0, b"one").unwrap();
        db.z_add(b"Z", 2.0, b"two").unwrap();
        db.z_add(b"Z", 3.0, b"three").unwrap();

        assert_eq!(db.z_score(b"Z", b"two"), Some(2.0));
        assert_eq!(db.z_card(b"Z"), 3);
        assert_eq!(db.z_rank(b"Z", b"one"), Some(0));
        assert_eq!(db.z_rev_rank(b"Z", b"one"), Some(2));
        assert_eq!(
            db.z_range(b"Z", 0, -1),
            vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
        );
        assert_eq!(db.z_get_by_rank(b"Z", 1), Some((b"two".to_vec(), 2.0)));
        assert_eq!(
            db.z_rev_get_by_rank(b"Z", 0),
            Some((b"three".to_vec(), 3.0))
        );
    }

    #[test]
    fn test_incr_by() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        assert_eq!(db.z_incr_by(b"Z", 2.5, b"m").unwrap(), 2.5);
        assert_eq!(db.z_incr_by(b"Z", -1.0, b"m").unwrap(), 1.5);
        assert_eq!(db.z_score(b"Z", b"m"), Some(1.5));
    }

    #[test]
    fn test_scores_survive_restart() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        // Fractional scores exercise the decimal text round trip.
        db.z_add(b"Z", 0.1, b"a").unwrap();
        db.z_add(b"Z", -7.25, b"b").unwrap();
        db.z_add(b"Z", 1e9, b"c").unwrap();
        db.z_add(b"Z", 2.0, b"gone").unwrap();
        db.z_rem(b"Z", b"gone").unwrap();

        db.close().expect("Failed to close");
        let db = KilnDb::reopen(temp_dir.path()).expect("Failed to reopen");

        assert_eq!(db.z_score(b"Z", b"a"), Some(0.1));
        assert_eq!(db.z_score(b"Z", b"b"), Some(-7.25));
        assert_eq!(db.z_score(b"Z", b"c"), Some(1e9));
        assert_eq!(db.z_score(b"Z", b"gone"), None);
        assert_eq!(
            db.z_range(b"Z", 0, -1),
            vec![b"b".to_vec(), b"a".to_vec(), b"c".to_vec()]
        );
    }

    #[test]
    fn test_score_ranges() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db = create_test_db(&temp_dir);

        for (score, member) in [(1.0, b"a".as_slice()), (2.0, b"b"), (3.0, b"c")] {
            db.z_add(b"Z", score, member).unwrap();
        }

        assert_eq!(
            db.z_score_range(b"Z", 1.5, 3.0),
            vec![(b"b".to_vec(), 2.0), (b"c".to_vec(), 3.0)]
        );
        assert_eq!(
            db.z_rev_score_range(b"Z", 2.5, 0.0),
            vec![(b"b".to_vec(), 2.0), (b"a".to_vec(), 1.0)]
        );
        assert_eq!(
            db.z_rev_range(b"Z", 0, 1),
            vec![b"c".to_vec(), b"b".to_vec()]
        );
    }
}
