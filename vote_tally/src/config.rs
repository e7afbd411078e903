// ********* Input data structures ***********

use snafu::Snafu;

/// One forum message, as handed over by a forum adapter.
///
/// The text is expected to be already converted from HTML to the BBCode-like
/// markup the vote lines are written in.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Post {
    /// The display name of the poster. Compared case-insensitively.
    pub author: String,
    /// The forum identifier of the post. Opaque, but usually numeric.
    pub id: String,
    /// The position of the post in the thread, starting at 1.
    pub number: u32,
    pub text: String,
}

impl Post {
    pub fn new(author: &str, id: &str, number: u32, text: &str) -> Post {
        Post {
            author: author.to_string(),
            id: id.to_string(),
            number,
            text: text.to_string(),
        }
    }

    /// The post id as a number, when the forum uses numeric ids.
    pub fn numeric_id(&self) -> Option<u64> {
        self.id.trim().parse::<u64>().ok()
    }
}

// ******** Aggregation data structures *********

/// The three kinds of supporter maps kept by the vote counter.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum VoteType {
    /// Standard `[x]` votes.
    Vote,
    /// Ranked `[1]`..`[9]` votes.
    Rank,
    /// Plan definitions, supported by the plan itself.
    Plan,
}

impl VoteType {
    pub const ALL: [VoteType; 3] = [VoteType::Vote, VoteType::Rank, VoteType::Plan];
}

/// How the vote lines of a post are cut into tallyable units.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PartitionMode {
    /// The whole post is a single vote.
    None,
    /// Every line is its own vote.
    Line,
    /// Every top-level line and its children form a vote.
    Block,
    /// Like `Block`, but plans are broken down into one vote per child line.
    BlockAll,
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TallyOptions {
    pub partition_mode: PartitionMode,
    /// First post number to consider (inclusive, 1-based).
    pub start_post: u32,
    /// Last post number to consider (inclusive). 0 means the end of the thread.
    pub end_post: u32,
    /// Skip the posts of the thread starter (usually the quest master).
    pub exclude_thread_starter: bool,
    /// The thread starter, when the first post of the thread is not part of the input.
    pub thread_starter: Option<String>,
    /// Ranked lines are ignored when false.
    pub tally_ranks: bool,
}

impl TallyOptions {
    pub const DEFAULT_OPTIONS: TallyOptions = TallyOptions {
        partition_mode: PartitionMode::None,
        start_post: 1,
        end_post: 0,
        exclude_thread_starter: true,
        thread_starter: None,
        tally_ranks: true,
    };

    pub fn with_partition_mode(&self, partition_mode: PartitionMode) -> TallyOptions {
        TallyOptions {
            partition_mode,
            ..self.clone()
        }
    }

    /// True if the post number falls in the configured range.
    pub fn in_range(&self, number: u32) -> bool {
        number >= self.start_post.max(1) && (self.end_post == 0 || number <= self.end_post)
    }
}

impl Default for TallyOptions {
    fn default() -> Self {
        TallyOptions::DEFAULT_OPTIONS
    }
}

/// Errors raised by the vote counter.
///
/// None of them leave the counter in a modified state: arguments are validated
/// before anything is applied.
#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum VoteCounterError {
    #[snafu(display("A voter name is required"))]
    EmptyVoter {},
    #[snafu(display("A post id is required for voter {voter}"))]
    EmptyPostId { voter: String },
    #[snafu(display("No vote matches {key:?}"))]
    UnknownVote { key: String },
    #[snafu(display("No voter named {voter:?}"))]
    UnknownVoter { voter: String },
    #[snafu(display("Cannot merge {key:?} into itself"))]
    IdenticalMerge { key: String },
    #[snafu(display("Cannot merge ranked votes across tasks ({from_task:?} -> {to_task:?})"))]
    TaskMismatch { from_task: String, to_task: String },
    #[snafu(display("Not a valid vote: {text:?}"))]
    InvalidVoteText { text: String },
    #[snafu(display("Tally cancelled after {processed} posts"))]
    Cancelled { processed: usize },
}

pub type CounterResult<T> = Result<T, VoteCounterError>;
