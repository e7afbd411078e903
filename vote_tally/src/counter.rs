use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info, warn};

use crate::config::*;
use crate::line::{is_tally_post, parse_vote_lines, VoteLine};
use crate::normalize::{normalize, normalize_flat};
use crate::partition::{partition, plan_definitions, VoteKey, VotePartition};
use crate::reference::{expand_references, ReferenceLookup};
use crate::supporters::{plan_key, voter_key, SupporterMap, VoteEntry, VoterRecord};

/// How many interactive edits can be undone.
pub const MAX_UNDO: usize = 10;

/// The post number recorded for a voter whose votes were only added by hand.
/// Thread posts are numbered from 1.
pub const MANUAL_POST_NUMBER: u32 = 0;

/// An edit made by hand to the tally. Edits are replayed after every full tally.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum UserEdit {
    Merge {
        vote_type: VoteType,
        from: VoteKey,
        to: VoteKey,
    },
    Rename {
        vote_type: VoteType,
        from: VoteKey,
        text: String,
    },
    Delete {
        vote_type: VoteType,
        key: VoteKey,
    },
}

#[derive(Debug, Clone)]
struct Snapshot {
    standard: SupporterMap,
    ranked: SupporterMap,
    plans: SupporterMap,
    plan_authors: HashMap<String, String>,
    user_edits: Vec<UserEdit>,
}

/// The aggregation state of one tally session.
///
/// ```
/// use vote_tally::builder::ThreadBuilder;
/// use vote_tally::{TallyOptions, VoteCounter, VoteType};
///
/// let posts = ThreadBuilder::new()
///     .post("Quest Master", "The dragon attacks! What do you do?")
///     .post("Alice", "[x] Ferris wheel")
///     .post("Bob", "[x] Alice")
///     .build();
///
/// let mut counter = VoteCounter::new();
/// counter.tally_posts(&posts, &TallyOptions::DEFAULT_OPTIONS);
///
/// let supporters = counter.supporters("[x] Ferris wheel", VoteType::Vote);
/// assert_eq!(supporters, Some(vec!["Alice".to_string(), "Bob".to_string()]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct VoteCounter {
    standard: SupporterMap,
    ranked: SupporterMap,
    plans: SupporterMap,
    // Plan identity -> identity of the voter who first defined it.
    plan_authors: HashMap<String, String>,
    user_edits: Vec<UserEdit>,
    history: VecDeque<Snapshot>,
}

impl VoteCounter {
    pub fn new() -> VoteCounter {
        VoteCounter::default()
    }

    /// Clears all the votes, voters and plans. User edits are kept so that
    /// they can be replayed by the next tally.
    pub fn reset(&mut self) {
        for vote_type in VoteType::ALL {
            self.map_mut(vote_type).clear();
        }
        self.plan_authors.clear();
        self.history.clear();
    }

    /// Forgets the edits made by hand.
    pub fn forget_user_edits(&mut self) {
        self.user_edits.clear();
    }

    pub fn user_edits(&self) -> &[UserEdit] {
        &self.user_edits
    }

    pub fn map(&self, vote_type: VoteType) -> &SupporterMap {
        match vote_type {
            VoteType::Vote => &self.standard,
            VoteType::Rank => &self.ranked,
            VoteType::Plan => &self.plans,
        }
    }

    fn map_mut(&mut self, vote_type: VoteType) -> &mut SupporterMap {
        match vote_type {
            VoteType::Vote => &mut self.standard,
            VoteType::Rank => &mut self.ranked,
            VoteType::Plan => &mut self.plans,
        }
    }

    // ********* Tally **********

    /// Rebuilds the whole tally from the posts.
    ///
    /// Returns the number of posts that contributed votes.
    pub fn tally_posts(&mut self, posts: &[Post], options: &TallyOptions) -> usize {
        match self.run_tally(posts, options, &|_| false) {
            Ok(counted) => counted,
            Err(e) => {
                warn!("tally_posts: {}", e);
                0
            }
        }
    }

    /// Same as [`VoteCounter::tally_posts`], checking the cancellation flag before every post.
    ///
    /// When cancelled, the posts before the cancellation point are fully
    /// counted and the remaining ones are not counted at all.
    pub fn tally_posts_cancellable(
        &mut self,
        posts: &[Post],
        options: &TallyOptions,
        cancel: &AtomicBool,
    ) -> CounterResult<usize> {
        self.run_tally(posts, options, &|_| cancel.load(Ordering::Relaxed))
    }

    /// Same as [`VoteCounter::tally_posts_cancellable`], with the stop
    /// condition given as a function of the number of posts processed so far.
    pub fn tally_posts_until(
        &mut self,
        posts: &[Post],
        options: &TallyOptions,
        stop: &dyn Fn(usize) -> bool,
    ) -> CounterResult<usize> {
        self.run_tally(posts, options, stop)
    }

    fn run_tally(
        &mut self,
        posts: &[Post],
        options: &TallyOptions,
        stop: &dyn Fn(usize) -> bool,
    ) -> CounterResult<usize> {
        self.reset();
        let starter: Option<String> = options
            .thread_starter
            .as_deref()
            .map(voter_key)
            .or_else(|| {
                posts
                    .iter()
                    .find(|p| p.number == 1)
                    .map(|p| voter_key(&p.author))
            });

        let mut ordered: Vec<&Post> = posts.iter().filter(|p| options.in_range(p.number)).collect();
        ordered.sort_by_key(|p| (p.number, p.numeric_id()));
        info!(
            "run_tally: processing {} posts out of {}, options: {:?}",
            ordered.len(),
            posts.len(),
            options
        );

        let mut counted: usize = 0;
        for (processed, post) in ordered.iter().enumerate() {
            if stop(processed) {
                info!("run_tally: cancelled after {} posts", processed);
                return CancelledSnafu { processed }.fail();
            }
            if options.exclude_thread_starter && starter.as_deref() == Some(voter_key(&post.author).as_str()) {
                debug!("run_tally: skipping post {} by the thread starter", post.id);
                continue;
            }
            if is_tally_post(&post.text) {
                debug!("run_tally: skipping tally post {}", post.id);
                continue;
            }
            if self.process_post(post, options) {
                counted += 1;
            }
        }

        for edit in self.user_edits.clone() {
            if let Err(e) = self.apply_edit(&edit) {
                debug!("run_tally: user edit {:?} no longer applies: {}", edit, e);
            }
        }
        info!(
            "run_tally: {} posts counted, {} voters, {} votes",
            counted,
            self.standard.voter_count(),
            self.standard.votes().count()
        );
        Ok(counted)
    }

    // Parses, resolves and commits one post. Nothing is committed before
    // everything has been computed.
    fn process_post(&mut self, post: &Post, options: &TallyOptions) -> bool {
        let lines = parse_vote_lines(&post.text);
        if lines.is_empty() {
            return false;
        }
        let (ranked, standard): (Vec<VoteLine>, Vec<VoteLine>) =
            lines.into_iter().partition(|l| l.is_rank());

        let expanded = expand_references(&standard, &*self);
        let plans = plan_definitions(&expanded);
        let partitions = partition(&expanded, options.partition_mode);
        debug!(
            "process_post: post {} by {}: {} partitions, {} ranks, {} plans",
            post.id,
            post.author,
            partitions.len(),
            ranked.len(),
            plans.len()
        );

        let mut committed = false;
        if !partitions.is_empty() {
            let entries = partitions.into_iter().map(|p| (p.key(), p, None)).collect();
            self.standard
                .commit(&post.author, &post.id, post.number, entries, expanded);
            committed = true;
        }
        if options.tally_ranks && !ranked.is_empty() {
            let entries = ranked.iter().map(ranked_entry).collect();
            self.ranked
                .commit(&post.author, &post.id, post.number, entries, ranked);
            committed = true;
        }
        for (name, plan_lines) in plans {
            self.define_plan(&name, post, plan_lines);
        }
        committed
    }

    fn define_plan(&mut self, name: &str, post: &Post, lines: Vec<VoteLine>) {
        let plan = plan_key(name);
        let author = voter_key(&post.author);
        match self.plan_authors.get(&plan) {
            Some(owner) if *owner != author => {
                debug!(
                    "define_plan: plan {:?} belongs to another voter, ignoring the definition in post {}",
                    name, post.id
                );
                return;
            }
            _ => {}
        }
        let p = VotePartition::new(lines.clone());
        self.plans
            .commit(&plan, &post.id, post.number, vec![(p.key(), p, None)], lines);
        self.plan_authors.insert(plan, author);
    }

    // A plan stays usable while some voter's current vote still contains its definition.
    fn plan_is_supported(&self, plan: &str) -> bool {
        self.standard.ballots().any(|lines| {
            lines.iter().enumerate().any(|(idx, line)| {
                line.plan_name().map_or(false, |name| plan_key(&name) == plan)
                    && lines.get(idx + 1).map_or(false, |next| next.depth > line.depth)
            })
        })
    }

    // ********* Interactive edits **********

    /// Sets the votes of a voter by hand, replacing their current support.
    ///
    /// Each element of `votes` is the text of one vote (one or several vote
    /// lines). An empty list is accepted and changes nothing. A voter unknown
    /// to the tally gets [`MANUAL_POST_NUMBER`] as post number.
    pub fn add_votes(
        &mut self,
        votes: &[&str],
        voter: &str,
        post_id: &str,
        vote_type: VoteType,
    ) -> CounterResult<()> {
        if voter.trim().is_empty() {
            return EmptyVoterSnafu {}.fail();
        }
        if post_id.trim().is_empty() {
            return EmptyPostIdSnafu { voter }.fail();
        }
        if votes.is_empty() {
            return Ok(());
        }

        let mut entries: Vec<(VoteKey, VotePartition, Option<u8>)> = Vec::new();
        let mut ballot: Vec<VoteLine> = Vec::new();
        for text in votes {
            let lines = parse_vote_lines(text);
            if lines.is_empty() {
                return InvalidVoteTextSnafu { text: *text }.fail();
            }
            if vote_type == VoteType::Rank {
                entries.extend(lines.iter().map(ranked_entry));
            } else {
                let p = VotePartition::new(lines.clone());
                entries.push((p.key(), p, None));
            }
            ballot.extend(lines);
        }

        self.save_snapshot();
        let post_number = self
            .map(vote_type)
            .voter(voter)
            .map(|r| r.post_number)
            .unwrap_or(MANUAL_POST_NUMBER);
        self.map_mut(vote_type)
            .commit(voter, post_id, post_number, entries, ballot);
        Ok(())
    }

    /// Moves the supporters of one vote to another one.
    ///
    /// Ranked votes can only be merged within the same task. The rank each
    /// supporter gave is kept.
    pub fn merge(&mut self, from: &str, to: &str, vote_type: VoteType) -> CounterResult<()> {
        let from_key = self.require_key(from, vote_type)?;
        let to_key = self.require_key(to, vote_type)?;
        let edit = UserEdit::Merge {
            vote_type,
            from: from_key,
            to: to_key,
        };
        self.validate_edit(&edit)?;
        self.commit_edit(edit)
    }

    /// Changes the text of a vote. Renaming onto an existing vote merges them.
    pub fn rename(&mut self, from: &str, text: &str, vote_type: VoteType) -> CounterResult<()> {
        let from_key = self.require_key(from, vote_type)?;
        let edit = UserEdit::Rename {
            vote_type,
            from: from_key,
            text: text.to_string(),
        };
        self.validate_edit(&edit)?;
        self.commit_edit(edit)
    }

    /// Removes a vote and the support for it.
    pub fn delete(&mut self, key: &str, vote_type: VoteType) -> CounterResult<()> {
        let key = self.require_key(key, vote_type)?;
        self.commit_edit(UserEdit::Delete { vote_type, key })
    }

    /// Makes a voter support the same votes as another voter.
    pub fn join_voters(&mut self, voter: &str, target: &str, vote_type: VoteType) -> CounterResult<()> {
        for name in [voter, target] {
            if self.map(vote_type).voter(name).is_none() {
                return UnknownVoterSnafu { voter: name }.fail();
            }
        }
        if voter_key(voter) == voter_key(target) {
            return IdenticalMergeSnafu { key: voter }.fail();
        }
        self.save_snapshot();
        self.map_mut(vote_type).join(voter, target);
        Ok(())
    }

    /// Reverts the last interactive edit. Returns false if there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(snapshot) = self.history.pop_back() else {
            return false;
        };
        self.standard = snapshot.standard;
        self.ranked = snapshot.ranked;
        self.plans = snapshot.plans;
        self.plan_authors = snapshot.plan_authors;
        self.user_edits = snapshot.user_edits;
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    fn save_snapshot(&mut self) {
        self.history.push_back(Snapshot {
            standard: self.standard.clone(),
            ranked: self.ranked.clone(),
            plans: self.plans.clone(),
            plan_authors: self.plan_authors.clone(),
            user_edits: self.user_edits.clone(),
        });
        while self.history.len() > MAX_UNDO {
            self.history.pop_front();
        }
    }

    fn commit_edit(&mut self, edit: UserEdit) -> CounterResult<()> {
        self.save_snapshot();
        self.apply_edit(&edit)?;
        self.user_edits.push(edit);
        Ok(())
    }

    // Checks everything that can make an edit fail, without changing anything.
    fn validate_edit(&self, edit: &UserEdit) -> CounterResult<()> {
        match edit {
            UserEdit::Merge {
                vote_type,
                from,
                to,
            } => {
                if from == to {
                    return IdenticalMergeSnafu { key: from.as_str() }.fail();
                }
                let map = self.map(*vote_type);
                let from_entry = entry_or_fail(map, from)?;
                let to_entry = entry_or_fail(map, to)?;
                if *vote_type == VoteType::Rank {
                    check_same_task(from_entry, to_entry)?;
                }
                Ok(())
            }
            UserEdit::Rename {
                vote_type,
                from,
                text,
            } => {
                let map = self.map(*vote_type);
                let from_entry = entry_or_fail(map, from)?;
                let (to, partition) = parse_edit_text(text, *vote_type)?;
                if *vote_type == VoteType::Rank && to != *from {
                    if let Some(to_entry) = map.get(&to) {
                        check_same_task(from_entry, to_entry)?;
                    }
                }
                debug!("validate_edit: rename to {:?}", partition.text());
                Ok(())
            }
            UserEdit::Delete { vote_type, key } => {
                entry_or_fail(self.map(*vote_type), key).map(|_| ())
            }
        }
    }

    fn apply_edit(&mut self, edit: &UserEdit) -> CounterResult<()> {
        self.validate_edit(edit)?;
        match edit {
            UserEdit::Merge {
                vote_type,
                from,
                to,
            } => {
                self.map_mut(*vote_type).merge(from, to);
            }
            UserEdit::Rename {
                vote_type,
                from,
                text,
            } => {
                let (to, partition) = parse_edit_text(text, *vote_type)?;
                let map = self.map_mut(*vote_type);
                if to != *from && map.contains(&to) {
                    map.merge(from, &to);
                } else {
                    map.rekey(from, to, partition);
                }
            }
            UserEdit::Delete { vote_type, key } => {
                self.map_mut(*vote_type).delete(key);
            }
        }
        Ok(())
    }

    /// Finds the key of a vote from its text.
    ///
    /// The text may be the displayed vote, any text with the same normalized
    /// form, the key itself, or the vote without its nesting markers.
    pub fn find_key(&self, text: &str, vote_type: VoteType) -> Option<VoteKey> {
        let map = self.map(vote_type);
        if let Ok((key, _)) = parse_edit_text(text, vote_type) {
            if map.contains(&key) {
                return Some(key);
            }
        }
        let flat = normalize_flat(text);
        map.votes()
            .find(|(k, e)| k.as_str() == text || normalize_flat(&e.partition.text()) == flat)
            .map(|(k, _)| k.clone())
    }

    fn require_key(&self, text: &str, vote_type: VoteType) -> CounterResult<VoteKey> {
        match self.find_key(text, vote_type) {
            Some(key) => Ok(key),
            None => UnknownVoteSnafu { key: text }.fail(),
        }
    }

    // ********* Queries **********

    pub fn votes(&self, vote_type: VoteType) -> impl Iterator<Item = &VoteEntry> {
        self.map(vote_type).votes().map(|(_, e)| e)
    }

    /// The names of the voters supporting a vote, in the order they joined.
    pub fn supporters(&self, text: &str, vote_type: VoteType) -> Option<Vec<String>> {
        let key = self.find_key(text, vote_type)?;
        self.map(vote_type)
            .get(&key)
            .map(|e| e.supporters.values().map(|s| s.voter.clone()).collect())
    }

    pub fn voter_post(&self, voter: &str, vote_type: VoteType) -> Option<&VoterRecord> {
        self.map(vote_type).voter(voter)
    }

    pub fn voter_count(&self, vote_type: VoteType) -> usize {
        self.map(vote_type).voter_count()
    }

    pub fn supported_keys(&self, voter: &str, vote_type: VoteType) -> Vec<VoteKey> {
        self.map(vote_type).supported_keys(voter)
    }

    pub fn has_votes(&self) -> bool {
        !self.standard.is_empty() || !self.ranked.is_empty()
    }
}

impl ReferenceLookup for VoteCounter {
    fn voter_lines(&self, voter: &str) -> Option<Vec<VoteLine>> {
        self.standard.ballot(voter).cloned()
    }

    fn plan_lines(&self, plan: &str) -> Option<Vec<VoteLine>> {
        let key = plan_key(plan);
        if !self.plan_is_supported(&key) {
            return None;
        }
        self.plans.ballot(&key).cloned()
    }
}

fn ranked_entry(line: &VoteLine) -> (VoteKey, VotePartition, Option<u8>) {
    (
        VoteKey::ranked(line),
        VotePartition::new(vec![line.with_depth(0)]),
        line.rank(),
    )
}

fn entry_or_fail<'a>(map: &'a SupporterMap, key: &VoteKey) -> CounterResult<&'a VoteEntry> {
    match map.get(key) {
        Some(e) => Ok(e),
        None => UnknownVoteSnafu { key: key.as_str() }.fail(),
    }
}

fn check_same_task(from: &VoteEntry, to: &VoteEntry) -> CounterResult<()> {
    let (from_task, to_task) = (from.partition.task(), to.partition.task());
    if normalize(from_task) != normalize(to_task) {
        return TaskMismatchSnafu { from_task, to_task }.fail();
    }
    Ok(())
}

// The key and partition described by a vote text.
fn parse_edit_text(text: &str, vote_type: VoteType) -> CounterResult<(VoteKey, VotePartition)> {
    let lines = parse_vote_lines(text);
    match (vote_type, lines.as_slice()) {
        (_, []) => InvalidVoteTextSnafu { text }.fail(),
        (VoteType::Rank, [line]) => {
            let (key, p, _) = ranked_entry(line);
            Ok((key, p))
        }
        (VoteType::Rank, _) => InvalidVoteTextSnafu { text }.fail(),
        _ => {
            let p = VotePartition::new(lines);
            Ok((p.key(), p))
        }
    }
}
