//! Set operations. An SMove record stores the source as its key and the
//! destination in the extra slot, so replay can redo the move.

use crate::error::Result;
use crate::storage::entry::{Entry, EntryKind, SetMark};
use crate::store::KilnDb;

impl KilnDb {
    /// Adds members to the set, returning its cardinality afterwards.
    pub fn s_add(&self, key: &[u8], members: &[&[u8]]) -> Result<usize> {
        self.check_key_value(key, members)?;
        let mut inner = self.write_guard();
        let mut card = inner.idx.sets.scard(key);
        for member in members {
            let entry = Entry::without_extra(
                EntryKind::Set(SetMark::SAdd),
                key.to_vec(),
                member.to_vec(),
            );
            inner.store(&self.config, &entry)?;
            card = inner.idx.sets.sadd(key, member.to_vec());
        }
        Ok(card)
    }

    /// Removes and returns up to `count` random members.
    pub fn s_pop(&self, key: &[u8], count: usize) -> Result<Vec<Vec<u8>>> {
        self.check_key_value(key, &[])?;
        let mut inner = self.write_guard();
        let members = inner.idx.sets.spop(key, count);
        for member in &members {
            let entry = Entry::without_extra(
                EntryKind::Set(SetMark::SRem),
                key.to_vec(),
                member.clone(),
            );
            inner.store(&self.config, &entry)?;
        }
        Ok(members)
    }

    pub fn s_is_member(&self, key: &[u8], member: &[u8]) -> bool {
        let inner = self.read_guard();
        inner.idx.sets.sismember(key, member)
    }

    /// Random members without removal; a negative `count` may repeat.
    pub fn s_rand_member(&self, key: &[u8], count: i64) -> Vec<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.sets.srandmember(key, count)
    }

    /// Removes members, ignoring absent ones. Returns how many were
    /// actually removed.
    pub fn s_rem(&self, key: &[u8], members: &[&[u8]]) -> Result<usize> {
        self.check_key_value(key, members)?;
        let mut inner = self.write_guard();
        let mut removed = 0;
        for member in members {
            if inner.idx.sets.srem(key, member) {
                let entry = Entry::without_extra(
                    EntryKind::Set(SetMark::SRem),
                    key.to_vec(),
                    member.to_vec(),
                );
                inner.store(&self.config, &entry)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Moves `member` from `src` to `dst`. Returns whether the member was
    /// present in `src`.
    pub fn s_move(&self, src: &[u8], dst: &[u8], member: &[u8]) -> Result<bool> {
        self.check_key_value(src, &[member])?;
        self.check_key_value(dst, &[])?;
        let mut inner = self.write_guard();
        if !inner.idx.sets.smove(src, dst, member) {
            return Ok(false);
        }

        let entry = Entry::new(
            EntryKind::Set(SetMark::SMove),
            src.to_vec(),
            member.to_vec(),
            dst.to_vec(),
        );
        inner.store(&self.config, &entry)?;
        Ok(true)
    }

    pub fn s_card(&self, key: &[u8]) -> usize {
        let inner = self.read_guard();
        inner.idx.sets.scard(key)
    }

    pub fn s_members(&self, key: &[u8]) -> Vec<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.sets.smembers(key)
    }

    /// The union of the given sets.
    pub fn s_union(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.sets.sunion(keys)
    }

    /// Members of the first set that appear in none of the others.
    pub fn s_diff(&self, keys: &[&[u8]]) -> Vec<Vec<u8>> {
        let inner = self.read_guard();
        inner.idx.sets.sdiff(keys)
    }
}
