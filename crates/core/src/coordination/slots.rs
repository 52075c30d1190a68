// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scored owner set backing one semaphore
//!
//! Mirrors the sorted-set operations the shared store performs atomically: members are
//! owner ids, scores are epoch-millisecond timestamps of the last acquire or refresh.

use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotSet {
    members: HashMap<String, u64>,
}

impl SlotSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, member: &str) -> bool {
        self.members.contains_key(member)
    }

    pub fn score(&self, member: &str) -> Option<u64> {
        self.members.get(member).copied()
    }

    /// Remove every member scored at or below `cutoff`, returning the removed ids
    pub fn sweep_expired(&mut self, cutoff: u64) -> Vec<String> {
        let expired: Vec<String> = self
            .members
            .iter()
            .filter(|(_, score)| **score <= cutoff)
            .map(|(member, _)| member.clone())
            .collect();
        for member in &expired {
            self.members.remove(member);
        }
        expired
    }

    /// Insert `member` only while the set holds fewer than `limit` members
    ///
    /// A member already present keeps its slot and has its score refreshed.
    pub fn insert_if_below(&mut self, member: &str, score: u64, limit: usize) -> bool {
        if let Some(existing) = self.members.get_mut(member) {
            *existing = score;
            return true;
        }
        if self.members.len() >= limit {
            return false;
        }
        self.members.insert(member.to_string(), score);
        true
    }

    /// Refresh an existing member's score; absent members are not re-added
    pub fn touch(&mut self, member: &str, score: u64) -> bool {
        match self.members.get_mut(member) {
            Some(existing) => {
                *existing = score;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, member: &str) -> bool {
        self.members.remove(member).is_some()
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, u64)> {
        self.members.iter().map(|(m, s)| (m.as_str(), *s))
    }
}

#[cfg(test)]
#[path = "slots_tests.rs"]
mod tests;
