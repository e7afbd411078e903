/*!
The text report of a tally, in the forum markup.

The report can be posted back to the thread as is. Its second line carries
the tally marker, so the counter ignores the report when it reads the thread
again.
*/

use std::collections::HashSet;

use crate::config::VoteType;
use crate::counter::VoteCounter;
use crate::line::TALLY_MARKER;
use crate::normalize::normalize;
use crate::supporters::{voter_key, VoteEntry};

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct FormatOptions {
    /// Shown after `Vote Tally` in the title line. Usually the thread name.
    pub title: String,
    /// Lists the votes with the most supporters first. Ties keep tally order.
    pub sort_by_support: bool,
    /// Puts the votes with the same task together, under a task heading.
    pub group_by_task: bool,
    /// Lists the supporters of each vote.
    pub show_voters: bool,
    /// Emits the hidden tally marker line.
    pub include_marker: bool,
}

impl FormatOptions {
    pub const DEFAULT_OPTIONS: FormatOptions = FormatOptions {
        title: String::new(),
        sort_by_support: false,
        group_by_task: false,
        show_voters: true,
        include_marker: true,
    };
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions::DEFAULT_OPTIONS
    }
}

/// Writes the report of the current state of the counter.
///
/// `permalink` turns a post id into the link shown for each supporter.
pub fn format_results(
    counter: &VoteCounter,
    permalink: &dyn Fn(&str) -> String,
    options: &FormatOptions,
) -> String {
    let mut out = String::new();
    if options.title.trim().is_empty() {
        out.push_str("[b]Vote Tally[/b]\n");
    } else {
        out.push_str(&format!("[b]Vote Tally[/b] : {}\n", options.title.trim()));
    }
    if options.include_marker {
        out.push_str(&format!(
            "[color=transparent]{} vote_tally {}[/color]\n",
            TALLY_MARKER,
            env!("CARGO_PKG_VERSION")
        ));
    }

    let standard = ordered_entries(counter, VoteType::Vote, options);
    let mut current_task: Option<String> = None;
    for entry in standard {
        if options.group_by_task {
            let task = normalize(entry.partition.task());
            if current_task.as_deref() != Some(task.as_str()) {
                if !task.is_empty() {
                    out.push_str(&format!("\n[b]Task: {}[/b]\n", entry.partition.task()));
                }
                current_task = Some(task);
            }
        }
        out.push('\n');
        out.push_str(&entry.partition.text());
        out.push('\n');
        write_supporters(&mut out, counter, entry, VoteType::Vote, permalink, options);
    }

    let ranked = ordered_entries(counter, VoteType::Rank, options);
    if !ranked.is_empty() {
        out.push_str("\n[b]Ranked votes[/b]\n");
    }
    for entry in ranked {
        out.push('\n');
        for line in entry.partition.lines() {
            if !line.task.is_empty() {
                out.push_str(&format!("[{}] ", line.task));
            }
            out.push_str(&line.content);
            out.push('\n');
        }
        write_supporters(&mut out, counter, entry, VoteType::Rank, permalink, options);
    }

    out.push_str(&format!("\nTotal No. of Voters: {}\n", total_voters(counter)));
    out
}

fn ordered_entries<'a>(
    counter: &'a VoteCounter,
    vote_type: VoteType,
    options: &FormatOptions,
) -> Vec<&'a VoteEntry> {
    let mut entries: Vec<&VoteEntry> = counter.votes(vote_type).collect();
    if options.sort_by_support {
        entries.sort_by(|a, b| b.count().cmp(&a.count()));
    }
    if options.group_by_task {
        let mut tasks: Vec<String> = Vec::new();
        for e in entries.iter() {
            let task = normalize(e.partition.task());
            if !tasks.contains(&task) {
                tasks.push(task);
            }
        }
        entries.sort_by_key(|e| {
            let task = normalize(e.partition.task());
            tasks.iter().position(|t| *t == task)
        });
    }
    entries
}

fn write_supporters(
    out: &mut String,
    counter: &VoteCounter,
    entry: &VoteEntry,
    vote_type: VoteType,
    permalink: &dyn Fn(&str) -> String,
    options: &FormatOptions,
) {
    out.push_str(&format!("[b]No. of Votes: {}[/b]\n", entry.count()));
    if !options.show_voters {
        return;
    }
    for support in entry.supporters.values() {
        let link = counter
            .voter_post(&support.voter, vote_type)
            .map(|r| permalink(&r.post_id));
        match link {
            Some(url) => out.push_str(&format!("[url=\"{}\"]{}[/url]", url, support.voter)),
            None => out.push_str(&support.voter),
        }
        if let Some(rank) = support.rank {
            out.push_str(&format!(" ({})", rank));
        }
        out.push('\n');
    }
}

// Voters of standard and ranked votes, each counted once.
fn total_voters(counter: &VoteCounter) -> usize {
    [VoteType::Vote, VoteType::Rank]
        .iter()
        .flat_map(|vt| counter.map(*vt).voters())
        .map(|r| voter_key(&r.name))
        .collect::<HashSet<String>>()
        .len()
}
