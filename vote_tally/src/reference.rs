/*!
Resolution of votes that point at other votes.

A voter may write `[x] SomeVoter` or `[x] Plan Something` instead of copying
a vote. Such a line is replaced by the lines the named voter or plan
currently supports. Only the state committed by earlier posts is visible,
so a reference can never see the post it is written in, nor a later one.
Names that match nothing, or that match several different votes, stay as
literal text for a human to review.
*/

use std::collections::HashSet;

use log::{debug, warn};

use crate::line::VoteLine;

/// Access to the votes known so far.
///
/// Names are compared case-insensitively by the implementations.
pub trait ReferenceLookup {
    /// The vote lines last committed by the voter.
    fn voter_lines(&self, voter: &str) -> Option<Vec<VoteLine>>;
    /// The lines of the plan, if it is defined and still has content.
    fn plan_lines(&self, plan: &str) -> Option<Vec<VoteLine>>;
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Resolution {
    /// Not a reference to anything known: keep the line as written.
    Literal,
    /// The name matches this many different votes. Kept as written.
    Ambiguous(usize),
    /// The lines to use instead of the reference.
    Resolved(Vec<VoteLine>),
}

/// Resolves a single line.
pub fn resolve(line: &VoteLine, lookup: &dyn ReferenceLookup) -> Resolution {
    if line.is_rank() {
        return Resolution::Literal;
    }
    let Some(reference) = line.reference() else {
        return Resolution::Literal;
    };

    let mut candidates: Vec<Vec<VoteLine>> = Vec::new();
    if let Some(plan) = &reference.plan {
        candidates.extend(lookup.plan_lines(plan));
        candidates.extend(lookup.voter_lines(plan));
    }
    candidates.extend(lookup.plan_lines(&reference.name));
    candidates.extend(lookup.voter_lines(&reference.name));

    let mut seen: HashSet<String> = HashSet::new();
    let mut distinct: Vec<Vec<VoteLine>> = candidates
        .into_iter()
        .filter(|lines| !lines.is_empty())
        .filter(|lines| seen.insert(lines_key(lines)))
        .collect();

    match distinct.len() {
        0 => Resolution::Literal,
        1 => Resolution::Resolved(graft(line, distinct.remove(0))),
        n => Resolution::Ambiguous(n),
    }
}

/// Replaces every reference line by the lines it points to.
///
/// Lines that have nested children are headers (for example plan
/// definitions) and are never treated as references.
pub fn expand_references(lines: &[VoteLine], lookup: &dyn ReferenceLookup) -> Vec<VoteLine> {
    let mut res: Vec<VoteLine> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let has_children = lines
            .get(idx + 1)
            .map_or(false, |next| next.depth > line.depth);
        if has_children {
            res.push(line.clone());
            continue;
        }
        match resolve(line, lookup) {
            Resolution::Resolved(sub) => {
                debug!(
                    "expand_references: {:?} resolved to {} lines",
                    line.content,
                    sub.len()
                );
                res.extend(sub);
            }
            Resolution::Ambiguous(n) => {
                warn!(
                    "expand_references: {:?} matches {} different votes, kept as written",
                    line.content, n
                );
                res.push(line.clone());
            }
            Resolution::Literal => res.push(line.clone()),
        }
    }
    res
}

fn lines_key(lines: &[VoteLine]) -> String {
    let base = lines.iter().map(|l| l.depth).min().unwrap_or(0);
    lines
        .iter()
        .map(|l| l.with_depth(l.depth - base).comparison_key())
        .collect::<Vec<String>>()
        .join("\n")
}

// Places the referenced lines at the position of the reference line.
fn graft(reference: &VoteLine, lines: Vec<VoteLine>) -> Vec<VoteLine> {
    let base = lines.iter().map(|l| l.depth).min().unwrap_or(0);
    lines
        .into_iter()
        .map(|l| {
            let top = l.depth == base;
            let mut moved = l.with_depth(l.depth - base + reference.depth);
            if top && moved.task.is_empty() && !reference.task.is_empty() {
                moved = moved.with_task(&reference.task);
            }
            moved
        })
        .collect()
}
