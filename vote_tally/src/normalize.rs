/*!
Text normalization for vote comparison.

Two vote texts that differ only in emphasis markup, case, accents, spacing or
trailing punctuation must land on the same vote key. The canonical form is
produced by running a fixed, ordered list of pure text transforms
([`CANONICAL_STEPS`]). The order matters: entities must be decoded before
tags are recognised, and URLs must be reduced to their label before the
remaining formatting is stripped.
*/

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// A single step of the normalization pipeline.
pub type TextStep = fn(&str) -> String;

/// The canonical pipeline, in application order.
pub const CANONICAL_STEPS: [(&str, TextStep); 8] = [
    ("decode_entities", decode_entities),
    ("strip_invisible", strip_invisible),
    ("deurl", deurl),
    ("strip_formatting", strip_formatting),
    ("strip_diacritics", strip_diacritics),
    ("fold_case", fold_case),
    ("collapse_whitespace", collapse_whitespace),
    ("trim_terminal_punctuation", trim_terminal_punctuation),
];

// Bold, italic, underline, strike and color tags. Group 1 is the closing slash.
static FORMAT_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[(/?)(b|i|u|s|color)(?:=[^\[\]]*)?\]").expect("valid formatting tag regex")
});

static EMPTY_PAIR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[(b|i|u|s|color)(?:=[^\[\]]*)?\]\s*\[/(b|i|u|s|color)\]")
        .expect("valid empty pair regex")
});

static URL_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\[url(?:=[^\]]*)?\](.*?)\[/url\]").expect("valid url tag regex")
});

/// Runs the given steps in order.
pub fn run_pipeline(text: &str, steps: &[(&str, TextStep)]) -> String {
    steps
        .iter()
        .fold(text.to_string(), |acc, (_, step)| step(acc.as_str()))
}

/// The canonical comparison form of a text.
///
/// ```
/// use vote_tally::normalize::normalize;
///
/// assert_eq!(normalize("[b]Attack the Dragon![/b]"), normalize("attack the dragon"));
/// ```
pub fn normalize(text: &str) -> String {
    run_pipeline(text, &CANONICAL_STEPS)
}

/// Same as [`normalize`], ignoring the `-` nesting markers at the start of each line.
pub fn normalize_flat(text: &str) -> String {
    normalize(&strip_nesting_prefix(text))
}

pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

fn is_invisible(c: char) -> bool {
    match c {
        '\n' | '\t' => false,
        '\u{00AD}'
        | '\u{200B}'..='\u{200F}'
        | '\u{202A}'..='\u{202E}'
        | '\u{2060}'..='\u{2064}'
        | '\u{FEFF}' => true,
        c => c.is_control(),
    }
}

/// Removes zero-width characters, direction marks and control characters.
pub fn strip_invisible(text: &str) -> String {
    text.chars().filter(|c| !is_invisible(*c)).collect()
}

/// Replaces `[url=...]Label[/url]` with `Label`. A leading `@` on the label is dropped.
pub fn deurl(text: &str) -> String {
    URL_TAG
        .replace_all(text, |caps: &Captures| {
            let label = caps[1].trim();
            label.strip_prefix('@').unwrap_or(label).to_string()
        })
        .into_owned()
}

/// Removes all the emphasis and color tags, balanced or not.
pub fn strip_formatting(text: &str) -> String {
    FORMAT_TAG.replace_all(text, "").into_owned()
}

pub fn strip_diacritics(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).nfc().collect()
}

pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Collapses runs of whitespace inside each line and drops empty lines.
pub fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<&str>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<String>>()
        .join("\n")
}

pub fn trim_terminal_punctuation(text: &str) -> String {
    text.lines()
        .map(|line| {
            line.trim_end_matches(|c: char| {
                c.is_whitespace() || matches!(c, '.' | '!' | '?' | ',' | ';' | ':')
            })
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Removes the leading `-` nesting markers (and the spaces around them) of each line.
pub fn strip_nesting_prefix(text: &str) -> String {
    text.lines()
        .map(|line| line.trim_start_matches(|c: char| c == '-' || c.is_whitespace()))
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Repairs the emphasis and color tags of a text.
///
/// Closing tags without a matching opener are dropped, openers left dangling at
/// the end are closed in reverse order, and empty pairs are removed. The text
/// itself is otherwise preserved.
pub fn balance_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open: Vec<String> = Vec::new();
    let mut last = 0;
    for caps in FORMAT_TAG.captures_iter(text) {
        let Some(tag) = caps.get(0) else { continue };
        out.push_str(&text[last..tag.start()]);
        last = tag.end();
        let name = caps[2].to_lowercase();
        if caps[1].is_empty() {
            open.push(name);
            out.push_str(tag.as_str());
        } else if let Some(pos) = open.iter().rposition(|n| *n == name) {
            open.remove(pos);
            out.push_str(tag.as_str());
        }
    }
    out.push_str(&text[last..]);
    for name in open.iter().rev() {
        out.push_str(&format!("[/{}]", name));
    }
    remove_empty_pairs(&out)
}

fn remove_empty_pairs(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let next = EMPTY_PAIR
            .replace_all(&current, |caps: &Captures| {
                if caps[1].eq_ignore_ascii_case(&caps[2]) {
                    String::new()
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities("Fish &amp; chips &quot;now&quot;"), "Fish & chips \"now\"");
    }

    #[test]
    fn invisible_characters_are_removed() {
        assert_eq!(strip_invisible("Ka\u{200B}boom\u{FEFF}"), "Kaboom");
        assert_eq!(strip_invisible("a\nb"), "a\nb");
    }

    #[test]
    fn urls_keep_their_label() {
        assert_eq!(
            deurl("Ask [url=https://forum.example/members/12]@Kinematics[/url] first"),
            "Ask Kinematics first"
        );
        assert_eq!(deurl("[url]plain[/url]"), "plain");
    }

    #[test]
    fn formatting_tags_are_stripped() {
        assert_eq!(
            strip_formatting("[b]Bold[/b] [COLOR=#ff0000]red[/color] [i]it"),
            "Bold red it"
        );
        // Other bracketed text stays.
        assert_eq!(strip_formatting("[x] keep [this]"), "[x] keep [this]");
    }

    #[test]
    fn diacritics_are_folded() {
        assert_eq!(strip_diacritics("Café Naïve"), "Cafe Naive");
    }

    #[test]
    fn whitespace_is_collapsed_per_line() {
        assert_eq!(collapse_whitespace("  a   b \n\n c\t d "), "a b\nc d");
    }

    #[test]
    fn terminal_punctuation_is_trimmed() {
        assert_eq!(trim_terminal_punctuation("Run away!!\nFight."), "Run away\nFight");
        assert_eq!(trim_terminal_punctuation("3.5 apples"), "3.5 apples");
    }

    #[test]
    fn nesting_prefix() {
        assert_eq!(strip_nesting_prefix("-[x] a\n-- [x] b"), "[x] a\n[x] b");
    }

    #[test]
    fn normalize_equivalences() {
        let base = normalize("Attack the dragon");
        for variant in [
            "attack the dragon.",
            "[b]Attack the dragon[/b]",
            "[b][i]Attack[/i][/b] the dragon",
            "[i][b]Attack[/b][/i] the dragon",
            "ATTACK   the   dragon!",
            "[color=red]Attack[/color] the dragon",
            "Attack\u{200B} the dragon",
        ] {
            assert_eq!(normalize(variant), base, "variant {:?}", variant);
        }
        assert_ne!(normalize("Attack the wyvern"), base);
    }

    #[test]
    fn pipeline_order_matters() {
        // Encoded tags only become tags once decoded.
        assert_eq!(normalize("&#91;b&#93;Bold&#91;/b&#93;"), "bold");
    }

    #[test]
    fn normalize_flat_ignores_nesting() {
        assert_eq!(normalize_flat("--[x] Fight"), normalize("[x] Fight"));
    }

    #[test]
    fn balance_drops_unmatched_closers() {
        assert_eq!(balance_formatting("Hide[/b] now"), "Hide now");
    }

    #[test]
    fn balance_closes_dangling_openers() {
        assert_eq!(
            balance_formatting("[b]Bold [i]and italic"),
            "[b]Bold [i]and italic[/i][/b]"
        );
    }

    #[test]
    fn balance_keeps_balanced_text() {
        let text = "[color=blue]Blue[/color] and [b]bold[/b]";
        assert_eq!(balance_formatting(text), text);
    }

    #[test]
    fn balance_removes_empty_pairs() {
        assert_eq!(balance_formatting("Text [b][i] [/i][/b]"), "Text ");
        assert_eq!(balance_formatting("[b]Text"), "[b]Text[/b]");
    }
}
