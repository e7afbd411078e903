use std::fmt::Display;

use crate::config::PartitionMode;
use crate::line::VoteLine;
use crate::normalize::balance_formatting;

/// The comparison key of a vote.
///
/// Two partitions with the same key are the same vote, whatever their formatting.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct VoteKey(String);

impl VoteKey {
    /// The key of a ranked line: task and content only. The rank is carried by the supporter.
    pub fn ranked(line: &VoteLine) -> VoteKey {
        VoteKey(line.content_key())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for VoteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tallyable unit of a post: a single line, a block or the whole vote.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VotePartition {
    lines: Vec<VoteLine>,
}

impl VotePartition {
    /// Builds a partition. The formatting of every line is repaired so that no
    /// tag leaks in or out of the partition.
    pub fn new(lines: Vec<VoteLine>) -> VotePartition {
        VotePartition {
            lines: lines
                .into_iter()
                .map(|l| {
                    let content = balance_formatting(&l.content);
                    l.with_content(&content)
                })
                .collect(),
        }
    }

    pub fn lines(&self) -> &[VoteLine] {
        &self.lines
    }

    /// The task of the first line.
    pub fn task(&self) -> &str {
        self.lines.first().map(|l| l.task.as_str()).unwrap_or_default()
    }

    pub fn key(&self) -> VoteKey {
        VoteKey(
            self.lines
                .iter()
                .map(|l| l.comparison_key())
                .collect::<Vec<String>>()
                .join("\n"),
        )
    }

    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl Display for VotePartition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let texts: Vec<String> = self.lines.iter().map(|l| l.to_string()).collect();
        write!(f, "{}", texts.join("\n"))
    }
}

/// Cuts the vote lines of a post into partitions.
pub fn partition(lines: &[VoteLine], mode: PartitionMode) -> Vec<VotePartition> {
    if lines.is_empty() {
        return vec![];
    }
    match mode {
        PartitionMode::None => vec![VotePartition::new(rebase(lines))],
        PartitionMode::Line => lines
            .iter()
            .map(|l| VotePartition::new(vec![l.with_depth(0)]))
            .collect(),
        PartitionMode::Block => group_blocks(lines)
            .iter()
            .map(|b| VotePartition::new(rebase(b)))
            .collect(),
        PartitionMode::BlockAll => group_blocks(lines)
            .iter()
            .flat_map(|b| explode_plan(b))
            .collect(),
    }
}

/// Groups lines into blocks: a line starts a new block unless it is nested
/// deeper than the first line of the current block.
pub fn group_blocks(lines: &[VoteLine]) -> Vec<Vec<VoteLine>> {
    let mut blocks: Vec<Vec<VoteLine>> = Vec::new();
    for line in lines {
        match blocks.last_mut() {
            Some(block) if block.first().map_or(false, |lead| line.depth > lead.depth) => {
                block.push(line.clone())
            }
            _ => blocks.push(vec![line.clone()]),
        }
    }
    blocks
}

/// The named plans defined in a list of lines: a `Plan <name>` line followed by nested lines.
pub fn plan_definitions(lines: &[VoteLine]) -> Vec<(String, Vec<VoteLine>)> {
    group_blocks(lines)
        .into_iter()
        .filter(|block| block.len() > 1)
        .filter_map(|block| {
            let name = block.first()?.plan_name()?;
            Some((name, rebase(&block)))
        })
        .collect()
}

// Shifts the lines so that the first one is at depth 0.
fn rebase(lines: &[VoteLine]) -> Vec<VoteLine> {
    let base = lines.first().map(|l| l.depth).unwrap_or(0);
    lines
        .iter()
        .map(|l| l.with_depth(l.depth.saturating_sub(base)))
        .collect()
}

// A plan block becomes one partition per child block, with the task of the plan as default.
fn explode_plan(block: &[VoteLine]) -> Vec<VotePartition> {
    let Some((leader, children)) = block.split_first() else {
        return vec![];
    };
    if children.is_empty() || leader.plan_name().is_none() {
        return vec![VotePartition::new(rebase(block))];
    }
    group_blocks(children)
        .iter()
        .map(|sub| {
            let mut sub = rebase(sub);
            if let Some(first) = sub.first_mut() {
                if first.task.is_empty() {
                    *first = first.with_task(&leader.task);
                }
            }
            VotePartition::new(sub)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::parse_vote_lines;
    use pretty_assertions::assert_eq;

    const PLANS: &str = "[X][Action] Plan One
-[X] Ambush
-[X][Decision] Kill
-[X] Run
[X] Plan Two
-[X] Report";

    fn texts(parts: &[VotePartition]) -> Vec<String> {
        parts.iter().map(|p| p.text()).collect()
    }

    #[test]
    fn mode_none() {
        let parts = partition(&parse_vote_lines(PLANS), PartitionMode::None);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].text(), PLANS);
    }

    #[test]
    fn mode_line() {
        let parts = partition(&parse_vote_lines(PLANS), PartitionMode::Line);
        assert_eq!(
            texts(&parts),
            vec![
                "[X][Action] Plan One",
                "[X] Ambush",
                "[X][Decision] Kill",
                "[X] Run",
                "[X] Plan Two",
                "[X] Report"
            ]
        );
    }

    #[test]
    fn mode_block() {
        let parts = partition(&parse_vote_lines(PLANS), PartitionMode::Block);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].lines().len(), 4);
        assert_eq!(parts[1].lines().len(), 2);
        assert_eq!(parts[1].text(), "[X] Plan Two\n-[X] Report");
    }

    #[test]
    fn mode_block_all() {
        let parts = partition(&parse_vote_lines(PLANS), PartitionMode::BlockAll);
        assert_eq!(
            texts(&parts),
            vec![
                "[X][Action] Ambush",
                "[X][Decision] Kill",
                "[X][Action] Run",
                "[X] Report"
            ]
        );
    }

    #[test]
    fn block_all_keeps_ordinary_blocks() {
        let lines = parse_vote_lines("[x] Build a wall\n-[x] Out of stone\n[x] Rest");
        let parts = partition(&lines, PartitionMode::BlockAll);
        assert_eq!(texts(&parts), vec!["[x] Build a wall\n-[x] Out of stone", "[x] Rest"]);
    }

    #[test]
    fn blocks_starting_nested() {
        let lines = parse_vote_lines("-[x] Orphan\n--[x] Child\n-[x] Sibling");
        let blocks = group_blocks(&lines);
        assert_eq!(blocks.len(), 2);
        let parts = partition(&lines, PartitionMode::Block);
        assert_eq!(parts[0].text(), "[x] Orphan\n-[x] Child");
    }

    #[test]
    fn empty_post() {
        assert!(partition(&[], PartitionMode::Block).is_empty());
    }

    #[test]
    fn partitions_are_balanced() {
        let lines = parse_vote_lines("[x] [b]Loud\n-[x] quiet[/i]");
        let parts = partition(&lines, PartitionMode::None);
        assert_eq!(parts[0].text(), "[x] [b]Loud[/b]\n-[x] quiet");
    }

    #[test]
    fn keys_ignore_formatting() {
        let a = partition(&parse_vote_lines("[x] [b]Fight[/b]\n-[x] Hard"), PartitionMode::None);
        let b = partition(&parse_vote_lines("[X] fight.\n-[x] hard"), PartitionMode::None);
        assert_eq!(a[0].key(), b[0].key());
        assert_ne!(a[0].text(), b[0].text());
    }

    #[test]
    fn plan_headers() {
        let plans = plan_definitions(&parse_vote_lines(PLANS));
        let names: Vec<&str> = plans.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["One", "Two"]);
        assert_eq!(plans[0].1.len(), 4);
        // A plan line alone is a reference, not a definition.
        assert!(plan_definitions(&parse_vote_lines("[x] Plan Three")).is_empty());
    }
}
