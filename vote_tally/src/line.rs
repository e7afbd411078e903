/*!
The grammar of a single vote line.

```text
[-...] [marker] [task]? content
```

The marker is `x`, `X` or a check mark glyph for standard votes, or a single
digit from 1 to 9 for ranked votes. Any number of `-` before the marker give
the nesting depth. Formatting tags may wrap the beginning of the line.
*/

use std::fmt::Display;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use snafu::Snafu;

use crate::normalize::{
    balance_formatting, deurl, normalize, strip_formatting, trim_terminal_punctuation,
};

/// The marker that starts the header line of a posted tally.
pub const TALLY_MARKER: &str = "#####";

/// The glyphs accepted inside the brackets of a standard vote.
pub const VOTE_MARKERS: [char; 6] = ['x', 'X', '✓', '✔', '☑', '🗸'];

// Names longer than this are not treated as references.
const MAX_REFERENCE_LEN: usize = 80;

static LEADING_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[/?(?:b|i|u|s|color)(?:=[^\[\]]*)?\]").expect("valid leading tag regex")
});

static MARKUP_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\[/?(?:b|i|u|s|color|url)(?:=[^\[\]]*)?\]").expect("valid markup tag regex")
});

static PLAN_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:base\s+|proposed\s+)?plan\b\s*:?\s*(\S.*)$").expect("valid plan regex")
});

#[derive(Debug, Snafu, Eq, PartialEq, Clone)]
pub enum LineError {
    #[snafu(display("Formatting tags straddle the vote marker in {line:?}"))]
    StraddledFormatting { line: String },
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MarkerKind {
    Vote,
    /// The rank, between 1 and 9.
    Rank(u8),
}

/// A parsed vote line.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct VoteLine {
    /// Number of leading `-`.
    pub depth: usize,
    /// The marker as written, without brackets.
    pub marker: String,
    pub kind: MarkerKind,
    /// The task label with its formatting removed. Empty when absent.
    pub task: String,
    /// The rest of the line, formatting included.
    pub content: String,
}

/// A line that may point at the vote of another voter or at a plan.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Reference {
    /// The referenced name, as written (formatting and links removed).
    pub name: String,
    /// The plan name, when the line reads `Plan <name>`.
    pub plan: Option<String>,
}

impl VoteLine {
    pub fn new(depth: usize, marker: &str, task: &str, content: &str) -> VoteLine {
        let kind = marker_kind(marker.trim()).unwrap_or(MarkerKind::Vote);
        VoteLine {
            depth,
            marker: marker.trim().to_string(),
            kind,
            task: task.trim().to_string(),
            content: content.trim().to_string(),
        }
    }

    /// Parses one line of a post.
    ///
    /// Returns `Ok(None)` when the line is not a vote line, and an error when
    /// formatting tags are opened or closed inside the marker brackets: there
    /// is no safe way to tell what the voter meant in that case.
    pub fn parse(line: &str) -> Result<Option<VoteLine>, LineError> {
        let mut rest = line;
        let mut depth: usize = 0;
        let mut lead_tags: Vec<&str> = Vec::new();
        loop {
            let trimmed = rest.trim_start();
            if let Some(r) = trimmed.strip_prefix('-') {
                depth += 1;
                rest = r;
            } else if let Some(m) = LEADING_TAG.find(trimmed) {
                lead_tags.push(m.as_str());
                rest = &trimmed[m.end()..];
            } else {
                rest = trimmed;
                break;
            }
        }

        let Some(after_open) = rest.strip_prefix('[') else {
            return Ok(None);
        };
        let Some(close) = after_open.find(']') else {
            return Ok(None);
        };
        let inner = &after_open[..close];
        if let Some(pos) = inner.find('[') {
            if LEADING_TAG.is_match(&after_open[pos..]) {
                return StraddledFormattingSnafu { line }.fail();
            }
            return Ok(None);
        }
        let marker = inner.trim();
        let Some(kind) = marker_kind(marker) else {
            return Ok(None);
        };

        let mut remainder = after_open[close + 1..].trim_start();
        let mut task = String::new();
        if remainder.starts_with('[') && !MARKUP_TAG.is_match(remainder) {
            if let Some((task_raw, after_task)) = bracketed_token(remainder) {
                task = strip_formatting(task_raw).trim().to_string();
                remainder = after_task;
            }
        }

        // Tags opened before the marker still apply to the content.
        let carried = open_tags(&lead_tags);
        let content = format!("{}{}", carried, remainder.trim());
        if strip_formatting(&content).trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(VoteLine {
            depth,
            marker: marker.to_string(),
            kind,
            task,
            content,
        }))
    }

    pub fn is_rank(&self) -> bool {
        matches!(self.kind, MarkerKind::Rank(_))
    }

    pub fn rank(&self) -> Option<u8> {
        match self.kind {
            MarkerKind::Rank(r) => Some(r),
            MarkerKind::Vote => None,
        }
    }

    pub fn with_depth(&self, depth: usize) -> VoteLine {
        VoteLine {
            depth,
            ..self.clone()
        }
    }

    pub fn with_task(&self, task: &str) -> VoteLine {
        VoteLine {
            task: task.to_string(),
            ..self.clone()
        }
    }

    pub fn with_content(&self, content: &str) -> VoteLine {
        VoteLine {
            content: content.to_string(),
            ..self.clone()
        }
    }

    /// The key of the line without its marker: task and content, normalized.
    pub fn content_key(&self) -> String {
        format!("[{}] {}", normalize(&self.task), normalize(&self.content))
    }

    /// The key used to compare lines: nesting, marker class, task and content.
    ///
    /// All the standard vote markers compare equal.
    pub fn comparison_key(&self) -> String {
        let marker = match self.kind {
            MarkerKind::Vote => "x".to_string(),
            MarkerKind::Rank(r) => r.to_string(),
        };
        format!("{}[{}]{}", "-".repeat(self.depth), marker, self.content_key())
    }

    /// The referenced name, if the content of this line could be one.
    pub fn reference(&self) -> Option<Reference> {
        let text = trim_terminal_punctuation(strip_formatting(&deurl(&self.content)).trim());
        let name = text.trim().trim_start_matches('@').trim();
        if name.is_empty() || name.len() > MAX_REFERENCE_LEN || name.contains('\n') {
            return None;
        }
        let plan = PLAN_NAME
            .captures(name)
            .map(|caps| caps[1].trim().to_string())
            .filter(|p| !p.is_empty());
        Some(Reference {
            name: name.to_string(),
            plan,
        })
    }

    /// The plan name, if this line reads as a plan header (`Plan <name>`).
    pub fn plan_name(&self) -> Option<String> {
        self.reference().and_then(|r| r.plan)
    }
}

impl Display for VoteLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", "-".repeat(self.depth), self.marker)?;
        if !self.task.is_empty() {
            write!(f, "[{}]", self.task)?;
        }
        write!(f, " {}", balance_formatting(&self.content))
    }
}

fn marker_kind(marker: &str) -> Option<MarkerKind> {
    let mut chars = marker.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if VOTE_MARKERS.contains(&c) => Some(MarkerKind::Vote),
        (Some(c @ '1'..='9'), None) => Some(MarkerKind::Rank(c as u8 - b'0')),
        _ => None,
    }
}

// The text inside the leading bracket pair (nested brackets allowed) and what follows.
fn bracketed_token(text: &str) -> Option<(&str, &str)> {
    let mut depth = 0;
    for (idx, c) in text.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&text[1..idx], &text[idx + 1..]));
                }
            }
            _ => {}
        }
    }
    None
}

// The opening tags left unclosed in a sequence of tags.
fn open_tags(tags: &[&str]) -> String {
    let mut open: Vec<&str> = Vec::new();
    for tag in tags {
        if let Some(closing) = tag.strip_prefix("[/") {
            let name = closing.trim_end_matches(']').to_lowercase();
            if let Some(pos) = open.iter().rposition(|t| tag_name(t) == name) {
                open.remove(pos);
            }
        } else {
            open.push(tag);
        }
    }
    open.concat()
}

fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('[')
        .split(|c| c == '=' || c == ']')
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

/// True if the text contains the header of a posted tally.
pub fn is_tally_post(text: &str) -> bool {
    text.lines()
        .any(|line| strip_formatting(line).trim_start().starts_with(TALLY_MARKER))
}

/// All the vote lines of a post, in order.
///
/// Malformed lines are dropped without affecting the rest of the post.
pub fn parse_vote_lines(text: &str) -> Vec<VoteLine> {
    let mut res: Vec<VoteLine> = Vec::new();
    for line in text.lines() {
        match VoteLine::parse(line) {
            Ok(Some(vl)) => res.push(vl),
            Ok(None) => {}
            Err(e) => {
                warn!("parse_vote_lines: dropping line: {}", e);
            }
        }
    }
    debug!("parse_vote_lines: found {} vote lines", res.len());
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(line: &str) -> Option<VoteLine> {
        VoteLine::parse(line).unwrap()
    }

    #[test]
    fn accepted_markers() {
        for line in [
            "[x] a", "[X] a", "[✓] a", "[✔] a", "[☑] a", "[1] a", "[9] a", "[ x ] a",
        ] {
            assert!(parse(line).is_some(), "{:?} should be a vote", line);
        }
    }

    #[test]
    fn rejected_markers() {
        for line in [
            "[10] a", "[0] a", "[xx] a", "[o] a", "[-] a", "[+] a", "[] a", "[01] a", "x] a",
            "Just talking", "[url=x]link[/url]",
        ] {
            assert_eq!(parse(line), None, "{:?} should not be a vote", line);
        }
    }

    #[test]
    fn rank_marker() {
        let vl = parse("[3] Cake").unwrap();
        assert_eq!(vl.kind, MarkerKind::Rank(3));
        assert!(vl.is_rank());
        assert_eq!(vl.rank(), Some(3));
    }

    #[test]
    fn components() {
        let vl = parse("--[X][Action] Run away.").unwrap();
        assert_eq!(vl.depth, 2);
        assert_eq!(vl.marker, "X");
        assert_eq!(vl.task, "Action");
        assert_eq!(vl.content, "Run away.");
        assert_eq!(vl.to_string(), "--[X][Action] Run away.");
    }

    #[test]
    fn spaced_prefix() {
        let vl = parse(" - - [x] Deep").unwrap();
        assert_eq!(vl.depth, 2);
        assert_eq!(vl.content, "Deep");
    }

    #[test]
    fn task_formatting_is_stripped() {
        let vl = parse("[x][[b]Action[/b]] Fight").unwrap();
        assert_eq!(vl.task, "Action");
        assert_eq!(vl.content, "Fight");
    }

    #[test]
    fn formatting_after_marker_is_not_a_task() {
        let vl = parse("[x] [b]Bold[/b] move").unwrap();
        assert_eq!(vl.task, "");
        assert_eq!(vl.content, "[b]Bold[/b] move");
    }

    #[test]
    fn leading_formatting_is_carried() {
        let vl = parse("[b][x] Bold vote[/b]").unwrap();
        assert_eq!(vl.depth, 0);
        assert_eq!(vl.content, "[b]Bold vote[/b]");
        let vl = parse("[color=red]-[/color][x] Red dash").unwrap();
        assert_eq!(vl.depth, 1);
        assert_eq!(vl.content, "Red dash");
    }

    #[test]
    fn straddled_marker_is_an_error() {
        assert!(VoteLine::parse("[b][x[/b]] Vote").is_err());
        assert!(VoteLine::parse("[[b]x[/b]] Vote").is_err());
    }

    #[test]
    fn empty_content_is_not_a_vote() {
        assert_eq!(parse("[x]"), None);
        assert_eq!(parse("[x][Task]"), None);
        assert_eq!(parse("[x] [b][/b]"), None);
    }

    #[test]
    fn display_balances_content() {
        let vl = parse("[x] [i]Sneak").unwrap();
        assert_eq!(vl.to_string(), "[x] [i]Sneak[/i]");
    }

    #[test]
    fn comparison_key_ignores_marker_glyph_and_case() {
        let a = parse("[x] Fight the [b]ogre[/b].").unwrap();
        let b = parse("[✔] fight the ogre").unwrap();
        assert_eq!(a.comparison_key(), b.comparison_key());
        let c = parse("-[x] fight the ogre").unwrap();
        assert_ne!(a.comparison_key(), c.comparison_key());
    }

    #[test]
    fn references() {
        let r = parse("[x] [url=https://f.example/members/3]@Kinematics[/url]")
            .unwrap()
            .reference()
            .unwrap();
        assert_eq!(r.name, "Kinematics");
        assert_eq!(r.plan, None);

        let r = parse("[x] Plan: Assault.").unwrap().reference().unwrap();
        assert_eq!(r.name, "Plan: Assault");
        assert_eq!(r.plan, Some("Assault".to_string()));

        assert_eq!(parse("[x] Planet destruction").unwrap().plan_name(), None);
        assert_eq!(
            parse("[x] Base Plan Kitten").unwrap().plan_name(),
            Some("Kitten".to_string())
        );
    }

    #[test]
    fn long_content_is_not_a_reference() {
        let long = format!("[x] {}", "word ".repeat(30));
        assert_eq!(parse(&long).unwrap().reference(), None);
    }

    #[test]
    fn tally_posts() {
        assert!(is_tally_post(
            "[b]Vote Tally[/b]\n[color=transparent]##### NetTally 0.1.0[/color]\n[x] Stuff"
        ));
        assert!(!is_tally_post("[x] Vote for ##### nothing"));
    }

    #[test]
    fn malformed_lines_are_dropped() {
        let lines = parse_vote_lines("Some chatter\n[x] One\n[b][x[/b]] Two\n-[x] Three");
        let texts: Vec<String> = lines.iter().map(|l| l.to_string()).collect();
        assert_eq!(texts, vec!["[x] One", "-[x] Three"]);
    }
}
