use clap::Parser;

/// This is a vote tally program for forum quest threads.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The quest configuration in JSON format.
    /// See the manual of the vote_tally crate for the format of the file.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference report. If provided, nettally will check that the report it
    /// produces is the same as the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) Where to write the report. Defaults to the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, the file containing the posts. Setting this option
    /// overrides the post sources of the configuration.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (json or dump) The type of the input. Guessed from the file extension if not specified.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (none, line, block or blockAll) How the votes of a post are split.
    #[clap(short, long, value_parser)]
    pub partition_mode: Option<String>,

    /// The number of the first post to read.
    #[clap(long, value_parser)]
    pub start: Option<u32>,

    /// The number of the last post to read. 0 reads to the end of the thread.
    #[clap(long, value_parser)]
    pub end: Option<u32>,

    /// (xenforo, vbulletin or nodebb) The forum software, used to write the links to the posts.
    #[clap(long, value_parser)]
    pub forum_type: Option<String>,

    /// The address of the thread.
    #[clap(long, value_parser)]
    pub thread_url: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
