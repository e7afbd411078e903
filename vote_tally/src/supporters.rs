use std::collections::HashMap;

use indexmap::IndexMap;
use log::debug;

use crate::line::VoteLine;
use crate::normalize::normalize;
use crate::partition::{VoteKey, VotePartition};

/// The identity of a voter for comparisons.
///
/// Forum user names only differ in case, so `Zoë` and `Zoe` are two voters.
pub fn voter_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// The identity of a plan for comparisons. Plan names are compared like vote text.
pub fn plan_key(name: &str) -> String {
    normalize(name)
}

/// The support of one voter for one vote.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Support {
    /// The voter name, as first written.
    pub voter: String,
    /// The rank given by the voter, for ranked votes.
    pub rank: Option<u8>,
}

/// A vote and the voters currently supporting it.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteEntry {
    /// The partition as it was first seen. This is the text displayed for the vote.
    pub partition: VotePartition,
    /// Supporters keyed by voter identity, in the order they joined.
    pub supporters: IndexMap<String, Support>,
}

impl VoteEntry {
    pub fn count(&self) -> usize {
        self.supporters.len()
    }
}

/// Where a voter currently votes from.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoterRecord {
    pub name: String,
    pub post_id: String,
    pub post_number: u32,
}

/// The votes of one vote type, with their supporters.
///
/// Invariant: all the support of a voter comes from a single commit (their
/// latest post), and votes without supporters are removed.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct SupporterMap {
    votes: IndexMap<VoteKey, VoteEntry>,
    voters: IndexMap<String, VoterRecord>,
    // The lines each voter last committed, used to resolve references.
    ballots: HashMap<String, Vec<VoteLine>>,
}

impl SupporterMap {
    pub fn new() -> SupporterMap {
        SupporterMap::default()
    }

    pub fn clear(&mut self) {
        self.votes.clear();
        self.voters.clear();
        self.ballots.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// The votes in the order they were first seen.
    pub fn votes(&self) -> impl Iterator<Item = (&VoteKey, &VoteEntry)> {
        self.votes.iter()
    }

    pub fn get(&self, key: &VoteKey) -> Option<&VoteEntry> {
        self.votes.get(key)
    }

    pub fn contains(&self, key: &VoteKey) -> bool {
        self.votes.contains_key(key)
    }

    pub fn voter(&self, name: &str) -> Option<&VoterRecord> {
        self.voters.get(&voter_key(name))
    }

    pub fn voters(&self) -> impl Iterator<Item = &VoterRecord> {
        self.voters.values()
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    pub fn ballot(&self, name: &str) -> Option<&Vec<VoteLine>> {
        self.ballots.get(&voter_key(name))
    }

    /// The lines last committed by every voter.
    pub fn ballots(&self) -> impl Iterator<Item = &Vec<VoteLine>> {
        self.ballots.values()
    }

    /// The keys of the votes the voter supports, in vote order.
    pub fn supported_keys(&self, name: &str) -> Vec<VoteKey> {
        let vk = voter_key(name);
        self.votes
            .iter()
            .filter(|(_, e)| e.supporters.contains_key(&vk))
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Replaces all the support of a voter with the given votes.
    ///
    /// `entries` holds the key, the partition and the rank of each vote. The
    /// previous support of the voter is removed first, then the new support is
    /// added and the post becomes the voter's current post.
    pub fn commit(
        &mut self,
        voter: &str,
        post_id: &str,
        post_number: u32,
        entries: Vec<(VoteKey, VotePartition, Option<u8>)>,
        ballot: Vec<VoteLine>,
    ) {
        let vk = voter_key(voter);
        self.remove_voter(&vk);
        let name = self
            .voters
            .get(&vk)
            .map(|r| r.name.clone())
            .unwrap_or_else(|| voter.to_string());
        for (key, partition, rank) in entries {
            let entry = self.votes.entry(key).or_insert_with(|| VoteEntry {
                partition,
                supporters: IndexMap::new(),
            });
            entry.supporters.insert(
                vk.clone(),
                Support {
                    voter: name.clone(),
                    rank,
                },
            );
        }
        self.voters.insert(
            vk.clone(),
            VoterRecord {
                name,
                post_id: post_id.to_string(),
                post_number,
            },
        );
        self.ballots.insert(vk, ballot);
    }

    // Removes the support of a voter everywhere. The voter record is kept.
    fn remove_voter(&mut self, vk: &str) {
        for entry in self.votes.values_mut() {
            entry.supporters.shift_remove(vk);
        }
        self.votes.retain(|_, e| !e.supporters.is_empty());
        self.ballots.remove(vk);
    }

    /// Moves all the supporters of `from` to `to` and removes `from`.
    ///
    /// A voter supporting both keeps their support (and rank) for `to`.
    pub fn merge(&mut self, from: &VoteKey, to: &VoteKey) -> bool {
        if from == to || !self.votes.contains_key(to) {
            return false;
        }
        let Some(removed) = self.votes.shift_remove(from) else {
            return false;
        };
        let moved: Vec<String> = removed.supporters.keys().cloned().collect();
        if let Some(target) = self.votes.get_mut(to) {
            for (vk, support) in removed.supporters {
                target.supporters.entry(vk).or_insert(support);
            }
        }
        self.rebuild_ballots(&moved);
        true
    }

    /// Changes the key and the displayed partition of a vote, keeping its position.
    ///
    /// Fails if the new key is already used by another vote.
    pub fn rekey(&mut self, from: &VoteKey, to: VoteKey, partition: VotePartition) -> bool {
        if from != &to && self.votes.contains_key(&to) {
            return false;
        }
        let Some(idx) = self.votes.get_index_of(from) else {
            return false;
        };
        let Some(mut entry) = self.votes.shift_remove(from) else {
            return false;
        };
        entry.partition = partition;
        let voters: Vec<String> = entry.supporters.keys().cloned().collect();
        let (new_idx, _) = self.votes.insert_full(to, entry);
        self.votes.move_index(new_idx, idx);
        self.rebuild_ballots(&voters);
        true
    }

    /// Removes a vote. Voters left without any support are forgotten.
    pub fn delete(&mut self, key: &VoteKey) -> bool {
        let Some(removed) = self.votes.shift_remove(key) else {
            return false;
        };
        let voters: Vec<String> = removed.supporters.keys().cloned().collect();
        for vk in voters.iter() {
            if !self.votes.values().any(|e| e.supporters.contains_key(vk)) {
                debug!("SupporterMap::delete: voter {} has no support left", vk);
                self.voters.shift_remove(vk);
                self.ballots.remove(vk);
            }
        }
        self.rebuild_ballots(&voters);
        true
    }

    /// Makes `voter` support exactly what `target` supports.
    pub fn join(&mut self, voter: &str, target: &str) -> bool {
        let (vk, tk) = (voter_key(voter), voter_key(target));
        if vk == tk || !self.voters.contains_key(&vk) || !self.voters.contains_key(&tk) {
            return false;
        }
        let name = self.voters.get(&vk).map(|r| r.name.clone()).unwrap_or_default();
        for entry in self.votes.values_mut() {
            entry.supporters.shift_remove(&vk);
            if let Some(rank) = entry.supporters.get(&tk).map(|s| s.rank) {
                entry.supporters.insert(
                    vk.clone(),
                    Support {
                        voter: name.clone(),
                        rank,
                    },
                );
            }
        }
        self.votes.retain(|_, e| !e.supporters.is_empty());
        self.rebuild_ballots(&[vk]);
        true
    }

    // Recomputes the ballot of voters from the votes they support.
    fn rebuild_ballots(&mut self, voters: &[String]) {
        for vk in voters {
            if !self.voters.contains_key(vk) {
                continue;
            }
            let lines: Vec<VoteLine> = self
                .votes
                .values()
                .filter_map(|e| {
                    e.supporters.get(vk).map(|s| {
                        e.partition
                            .lines()
                            .iter()
                            .map(|l| match s.rank {
                                Some(r) => VoteLine::new(l.depth, &r.to_string(), &l.task, &l.content),
                                None => l.clone(),
                            })
                            .collect::<Vec<VoteLine>>()
                    })
                })
                .flatten()
                .collect();
            self.ballots.insert(vk.clone(), lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::parse_vote_lines;
    use pretty_assertions::assert_eq;

    fn entry(text: &str) -> (VoteKey, VotePartition, Option<u8>) {
        let p = VotePartition::new(parse_vote_lines(text));
        (p.key(), p, None)
    }

    fn key(text: &str) -> VoteKey {
        entry(text).0
    }

    #[test]
    fn commit_replaces_previous_support() {
        let mut m = SupporterMap::new();
        m.commit("Alice", "10", 1, vec![entry("[x] First")], vec![]);
        m.commit("Bob", "11", 2, vec![entry("[x] First")], vec![]);
        m.commit("alice", "12", 3, vec![entry("[x] Second")], vec![]);
        assert_eq!(m.get(&key("[x] First")).map(|e| e.count()), Some(1));
        assert_eq!(m.get(&key("[x] Second")).map(|e| e.count()), Some(1));
        assert_eq!(m.voter("ALICE").map(|r| r.post_id.as_str()), Some("12"));
        // The name keeps its first spelling.
        assert_eq!(m.voter("alice").map(|r| r.name.as_str()), Some("Alice"));
    }

    #[test]
    fn voters_differ_beyond_case() {
        let mut m = SupporterMap::new();
        m.commit("Zoë", "1", 1, vec![entry("[x] Attack")], vec![]);
        m.commit("Zoe", "2", 2, vec![entry("[x] Retreat")], vec![]);
        m.commit("Bob.", "3", 3, vec![entry("[x] Attack")], vec![]);
        m.commit("bob", "4", 4, vec![entry("[x] Retreat")], vec![]);
        assert_eq!(m.voter_count(), 4);
        assert_eq!(m.get(&key("[x] Attack")).map(|e| e.count()), Some(2));
        assert_eq!(m.voter("ZOË").map(|r| r.post_id.as_str()), Some("1"));
        assert_eq!(m.voter("BOB").map(|r| r.name.as_str()), Some("bob"));
    }

    #[test]
    fn empty_votes_are_removed() {
        let mut m = SupporterMap::new();
        m.commit("Alice", "10", 1, vec![entry("[x] First")], vec![]);
        m.commit("Alice", "12", 2, vec![entry("[x] Second")], vec![]);
        assert!(!m.contains(&key("[x] First")));
    }

    #[test]
    fn first_text_is_displayed() {
        let mut m = SupporterMap::new();
        m.commit("Alice", "1", 1, vec![entry("[x] [b]Bold[/b] plan")], vec![]);
        m.commit("Bob", "2", 2, vec![entry("[X] bold plan.")], vec![]);
        let texts: Vec<String> = m.votes().map(|(_, e)| e.partition.text()).collect();
        assert_eq!(texts, vec!["[x] [b]Bold[/b] plan"]);
    }

    #[test]
    fn merge_moves_supporters() {
        let mut m = SupporterMap::new();
        m.commit("Alice", "1", 1, vec![entry("[x] Cat")], vec![]);
        m.commit("Bob", "2", 2, vec![entry("[x] Kitty")], vec![]);
        assert!(m.merge(&key("[x] Kitty"), &key("[x] Cat")));
        assert!(!m.contains(&key("[x] Kitty")));
        assert_eq!(m.get(&key("[x] Cat")).map(|e| e.count()), Some(2));
        let ballot: Vec<String> = m.ballot("Bob").unwrap().iter().map(|l| l.to_string()).collect();
        assert_eq!(ballot, vec!["[x] Cat"]);
        assert!(!m.merge(&key("[x] Cat"), &key("[x] Cat")));
    }

    #[test]
    fn rekey_keeps_position() {
        let mut m = SupporterMap::new();
        m.commit("Alice", "1", 1, vec![entry("[x] One"), entry("[x] Two")], vec![]);
        let (to, p, _) = entry("[x] Uno");
        assert!(m.rekey(&key("[x] One"), to, p));
        let texts: Vec<String> = m.votes().map(|(_, e)| e.partition.text()).collect();
        assert_eq!(texts, vec!["[x] Uno", "[x] Two"]);
        let (to, p, _) = entry("[x] Two");
        assert!(!m.rekey(&key("[x] Uno"), to, p));
    }

    #[test]
    fn delete_forgets_unsupported_voters() {
        let mut m = SupporterMap::new();
        m.commit("Alice", "1", 1, vec![entry("[x] One")], vec![]);
        m.commit("Bob", "2", 2, vec![entry("[x] One"), entry("[x] Two")], vec![]);
        assert!(m.delete(&key("[x] One")));
        assert!(m.voter("Alice").is_none());
        assert!(m.voter("Bob").is_some());
        assert_eq!(m.supported_keys("Bob"), vec![key("[x] Two")]);
    }

    #[test]
    fn join_copies_support() {
        let mut m = SupporterMap::new();
        m.commit("Alice", "1", 1, vec![entry("[x] One")], vec![]);
        m.commit("Bob", "2", 2, vec![entry("[x] Two")], vec![]);
        assert!(m.join("Bob", "Alice"));
        assert!(!m.contains(&key("[x] Two")));
        assert_eq!(m.supported_keys("Bob"), vec![key("[x] One")]);
        assert_eq!(m.voter("Bob").map(|r| r.post_id.as_str()), Some("2"));
    }
}
