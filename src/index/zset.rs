//! The sorted set index: members ranked by a 64-bit float score.
//!
//! Each key holds both a member-to-score map for O(1) score lookups and a
//! score-ordered tree for rank and range queries. Ties are broken by member
//! bytes, and scores compare with `f64::total_cmp` so the ordering is total.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

#[derive(Clone, Debug)]
struct ScoredMember {
    score: f64,
    member: Vec<u8>,
}

impl PartialEq for ScoredMember {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ScoredMember {}

impl PartialOrd for ScoredMember {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredMember {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.member.cmp(&other.member))
    }
}

#[derive(Default)]
struct SortedSet {
    scores: HashMap<Vec<u8>, f64>,
    ranking: BTreeSet<ScoredMember>,
}

impl SortedSet {
    fn insert(&mut self, score: f64, member: Vec<u8>) {
        if let Some(old) = self.scores.insert(member.clone(), score) {
            self.ranking.remove(&ScoredMember {
                score: old,
                member: member.clone(),
            });
        }
        self.ranking.insert(ScoredMember { score, member });
    }

    fn remove(&mut self, member: &[u8]) -> bool {
        let Some(score) = self.scores.remove(member) else {
            return false;
        };
        self.ranking.remove(&ScoredMember {
            score,
            member: member.to_vec(),
        });
        true
    }
}

#[derive(Default)]
pub struct ZSetIndex {
    record: HashMap<Vec<u8>, SortedSet>,
}

impl ZSetIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a member or relocates it when it already exists with a
    /// different score.
    pub fn zadd(&mut self, key: &[u8], score: f64, member: Vec<u8>) {
        self.record
            .entry(key.to_vec())
            .or_default()
            .insert(score, member);
    }

    pub fn zscore(&self, key: &[u8], member: &[u8]) -> Option<f64> {
        self.record.get(key)?.scores.get(member).copied()
    }

    /// Removes a member, returning whether it was present.
    pub fn zrem(&mut self, key: &[u8], member: &[u8]) -> bool {
        self.record.get_mut(key).is_some_and(|set| set.remove(member))
    }

    pub fn zcard(&self, key: &[u8]) -> usize {
        self.record.get(key).map_or(0, |set| set.scores.len())
    }

    /// The member's position in ascending score order.
    pub fn zrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        let set = self.record.get(key)?;
        let score = *set.scores.get(member)?;
        set.ranking.iter().position(|sm| {
            sm.score.total_cmp(&score) == Ordering::Equal && sm.member == member
        })
    }

    /// The member's position in descending score order.
    pub fn zrevrank(&self, key: &[u8], member: &[u8]) -> Option<usize> {
        let rank = self.zrank(key, member)?;
        Some(self.zcard(key) - 1 - rank)
    }

    /// Adds `delta` to the member's score (absent members start at 0) and
    /// returns the new score.
    pub fn zincrby(&mut self, key: &[u8], delta: f64, member: &[u8]) -> f64 {
        let score = self.zscore(key, member).unwrap_or(0.0) + delta;
        self.zadd(key, score, member.to_vec());
        score
    }

    /// Members in rank order within the inclusive range `[start, stop]`;
    /// negative offsets count from the highest rank.
    pub fn zrange(&self, key: &[u8], start: i64, stop: i64) -> Vec<Vec<u8>> {
        self.select_range(key, start, stop, false)
    }

    /// Like `zrange` with ranks counted from the highest score down.
    pub fn zrevrange(&self, key: &[u8], start: i64, stop: i64) -> Vec<Vec<u8>> {
        self.select_range(key, start, stop, true)
    }

    /// The member and score at the given ascending rank.
    pub fn zget_by_rank(&self, key: &[u8], rank: i64) -> Option<(Vec<u8>, f64)> {
        let set = self.record.get(key)?;
        let rank = normalize(set.ranking.len(), rank)?;
        set.ranking
            .iter()
            .nth(rank)
            .map(|sm| (sm.member.clone(), sm.score))
    }

    /// The member and score at the given descending rank.
    pub fn zrev_get_by_rank(&self, key: &[u8], rank: i64) -> Option<(Vec<u8>, f64)> {
        let set = self.record.get(key)?;
        let rank = normalize(set.ranking.len(), rank)?;
        set.ranking
            .iter()
            .rev()
            .nth(rank)
            .map(|sm| (sm.member.clone(), sm.score))
    }

    /// Members with scores in `[min, max]`, ascending.
    pub fn zscore_range(&self, key: &[u8], min: f64, max: f64) -> Vec<(Vec<u8>, f64)> {
        let Some(set) = self.record.get(key) else {
            return Vec::new();
        };
        set.ranking
            .iter()
            .skip_while(|sm| sm.score < min)
            .take_while(|sm| sm.score <= max)
            .map(|sm| (sm.member.clone(), sm.score))
            .collect()
    }

    /// Members with scores in `[min, max]`, descending.
    pub fn zrev_score_range(&self, key: &[u8], max: f64, min: f64) -> Vec<(Vec<u8>, f64)> {
        let Some(set) = self.record.get(key) else {
            return Vec::new();
        };
        set.ranking
            .iter()
            .rev()
            .skip_while(|sm| sm.score > max)
            .take_while(|sm| sm.score >= min)
            .map(|sm| (sm.member.clone(), sm.score))
            .collect()
    }

    fn select_range(&self, key: &[u8], start: i64, stop: i64, rev: bool) -> Vec<Vec<u8>> {
        let Some(set) = self.record.get(key) else {
            return Vec::new();
        };
        let length = set.ranking.len();
        if length == 0 {
            return Vec::new();
        }

        let (start, stop) = clamp(length, start, stop);
        if start > stop || start >= length as i64 {
            return Vec::new();
        }

        let take = (stop - start + 1) as usize;
        if rev {
            set.ranking
                .iter()
                .rev()
                .skip(start as usize)
                .take(take)
                .map(|sm| sm.member.clone())
                .collect()
        } else {
            set.ranking
                .iter()
                .skip(start as usize)
                .take(take)
                .map(|sm| sm.member.clone())
                .collect()
        }
    }
}

fn normalize(length: usize, rank: i64) -> Option<usize> {
    let rank = if rank < 0 { rank + length as i64 } else { rank };
    (0..length as i64).contains(&rank).then_some(rank as usize)
}

fn clamp(length: usize, start: i64, stop: i64) -> (i64, i64) {
    let length = length as i64;
    let mut start = if start < 0 { start + length } else { start };
    let mut stop = if stop < 0 { stop + length } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= length {
        stop = length - 1;
    }
    (start, stop)
}
