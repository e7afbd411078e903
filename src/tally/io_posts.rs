// Readers for the posts exported by a forum adapter.

use crate::tally::*;

use serde::Deserialize;
use serde_json::Value as JSValue;

const DUMP_HEADER: &str = "===";

#[derive(Debug, Clone, Deserialize)]
struct JsonPost {
    author: String,
    id: JSValue,
    number: u32,
    text: String,
}

pub fn read_posts(path: &str, provider: &str) -> TallyResult<Vec<Post>> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    let posts = match provider {
        "json" => parse_json_posts(&contents, path)?,
        "dump" => parse_dump_posts(&contents, path)?,
        x => {
            return InvalidOptionSnafu {
                name: "provider",
                value: x,
            }
            .fail()
        }
    };
    info!("read_posts: {} posts read from {}", posts.len(), path);
    Ok(posts)
}

/// The provider to use for a file given on the command line without a type.
pub fn guess_provider(path: &str) -> &'static str {
    if path.to_lowercase().ends_with(".json") {
        "json"
    } else {
        "dump"
    }
}

pub fn parse_json_posts(contents: &str, path: &str) -> TallyResult<Vec<Post>> {
    let raw: Vec<JsonPost> = serde_json::from_str(contents).context(ParsingJsonSnafu { path })?;
    let mut res: Vec<Post> = Vec::new();
    for jp in raw {
        let id = match &jp.id {
            JSValue::String(s) => s.clone(),
            JSValue::Number(n) => n.to_string(),
            x => whatever!("Post {} by {} has an invalid id: {:?}", jp.number, jp.author, x),
        };
        res.push(Post::new(&jp.author, &id, jp.number, &jp.text));
    }
    Ok(res)
}

/// Reads the plain text dump format. Each post starts with a header line:
///
/// ```text
/// === author | id | number
/// ```
pub fn parse_dump_posts(contents: &str, path: &str) -> TallyResult<Vec<Post>> {
    let mut res: Vec<Post> = Vec::new();
    let mut current: Option<(Post, Vec<&str>)> = None;
    for (idx, line) in contents.lines().enumerate() {
        let lineno = idx + 1;
        if let Some(header) = line.strip_prefix(DUMP_HEADER) {
            if let Some((post, lines)) = current.take() {
                res.push(finish_post(post, &lines));
            }
            current = Some((parse_header(header, path, lineno)?, Vec::new()));
            continue;
        }
        match current.as_mut() {
            Some((_, lines)) => lines.push(line),
            None if line.trim().is_empty() => {}
            None => {
                return MalformedDumpSnafu {
                    path,
                    lineno,
                    line,
                }
                .fail()
            }
        }
    }
    if let Some((post, lines)) = current.take() {
        res.push(finish_post(post, &lines));
    }
    debug!("parse_dump_posts: {} posts in {}", res.len(), path);
    Ok(res)
}

fn parse_header(header: &str, path: &str, lineno: usize) -> TallyResult<Post> {
    let fields: Vec<&str> = header.split('|').map(|s| s.trim()).collect();
    match fields.as_slice() {
        [author, id, number] if !author.is_empty() && !id.is_empty() => {
            let number = number.parse::<u32>().ok().context(MalformedDumpSnafu {
                path,
                lineno,
                line: header,
            })?;
            Ok(Post::new(author, id, number, ""))
        }
        _ => MalformedDumpSnafu {
            path,
            lineno,
            line: header,
        }
        .fail(),
    }
}

fn finish_post(post: Post, lines: &[&str]) -> Post {
    Post {
        text: lines.join("\n").trim_end().to_string(),
        ..post
    }
}
