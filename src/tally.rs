use log::{debug, info, warn};

use snafu::{prelude::*, Snafu};
use vote_tally::format::{format_results, FormatOptions};
use vote_tally::*;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;

use text_diff::print_diff;

use crate::args::Args;
use crate::tally::config_reader::*;
use crate::tally::forum::ForumKind;

pub mod config_reader;
pub mod forum;
pub mod io_posts;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TallyError {
    #[snafu(display("Error opening file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid value {value:?} for option {name}"))]
    InvalidOption { name: String, value: String },
    #[snafu(display("{path}:{lineno}: not a post header: {line:?}"))]
    MalformedDump {
        path: String,
        lineno: usize,
        line: String,
    },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("No posts to read: pass --input or add postSources to the configuration"))]
    NoPostSource {},
    #[snafu(display("Error while counting the votes"))]
    Counting { source: VoteCounterError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type TallyResult<T> = Result<T, TallyError>;

// Everything needed for one tally, once the configuration file and the
// command line have been combined.
#[derive(Debug, Clone)]
struct TallySettings {
    sources: Vec<(PathBuf, String)>,
    options: TallyOptions,
    format: FormatOptions,
    forum: ForumKind,
    thread_url: String,
}

fn resolve_path(root: &Path, file: &str) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        root.join(p)
    }
}

fn build_settings(args: &Args, config: &QuestConfig, root: &Path) -> TallyResult<TallySettings> {
    let mut options = validate_rules(&config.rules)?;
    if let Some(mode) = args.partition_mode.as_deref() {
        options.partition_mode = parse_partition_mode(mode)?;
    }
    if let Some(start) = args.start {
        ensure!(
            start > 0,
            InvalidOptionSnafu {
                name: "start",
                value: "0"
            }
        );
        options.start_post = start;
    }
    if let Some(end) = args.end {
        options.end_post = end;
    }

    let sources: Vec<(PathBuf, String)> = match args.input.as_deref() {
        Some(input) => {
            let provider = args
                .input_type
                .clone()
                .unwrap_or_else(|| io_posts::guess_provider(input).to_string());
            vec![(PathBuf::from(input), provider)]
        }
        None => config
            .post_sources
            .iter()
            .map(|ps| (resolve_path(root, &ps.file_path), ps.provider.clone()))
            .collect(),
    };
    ensure!(!sources.is_empty(), NoPostSourceSnafu {});

    let thread_url = args
        .thread_url
        .clone()
        .or_else(|| config.quest.thread_url.clone())
        .unwrap_or_default();
    let forum = match args.forum_type.as_deref().or(config.quest.forum_type.as_deref()) {
        Some(name) => ForumKind::parse(name)?,
        None => ForumKind::detect(&thread_url).unwrap_or_else(|| {
            warn!(
                "build_settings: could not guess the forum from {:?}, using XenForo links",
                thread_url
            );
            ForumKind::XenForo
        }),
    };

    let format = FormatOptions {
        title: config.quest.thread_name.clone().unwrap_or_default(),
        sort_by_support: config.rules.sort_results.unwrap_or(false),
        group_by_task: config.rules.group_by_task.unwrap_or(false),
        ..FormatOptions::DEFAULT_OPTIONS
    };

    Ok(TallySettings {
        sources,
        options,
        format,
        forum,
        thread_url,
    })
}

/// Reads the posts, counts the votes and writes the report.
///
/// Returns the report.
pub fn run_tally(args: &Args) -> TallyResult<String> {
    let (config, root) = match args.config.as_deref() {
        Some(config_path) => {
            let config = read_config(config_path)?;
            let root = Path::new(config_path)
                .parent()
                .context(MissingParentDirSnafu {})?
                .to_path_buf();
            (config, root)
        }
        None => (QuestConfig::default(), PathBuf::from(".")),
    };
    info!("run_tally: config: {:?}", config);

    let settings = build_settings(args, &config, &root)?;
    debug!("run_tally: settings: {:?}", settings);

    let mut posts: Vec<Post> = Vec::new();
    for (path, provider) in settings.sources.iter() {
        let path_s = path.to_string_lossy();
        let mut file_posts = io_posts::read_posts(&path_s, provider)?;
        posts.append(&mut file_posts);
    }

    let mut counter = VoteCounter::new();
    let cancel = AtomicBool::new(false);
    let counted = counter
        .tally_posts_cancellable(&posts, &settings.options, &cancel)
        .context(CountingSnafu {})?;
    info!(
        "run_tally: {} posts with votes out of {}, {} voters",
        counted,
        posts.len(),
        counter.voter_count(VoteType::Vote)
    );

    let permalink = |id: &str| settings.forum.post_url(&settings.thread_url, id);
    let report = format_results(&counter, &permalink, &settings.format);

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", report),
        Some("") => {}
        Some(out_path) => {
            fs::write(out_path, &report).context(WritingFileSnafu { path: out_path })?;
            info!("run_tally: report written to {}", out_path);
        }
    }

    // The reference report, if provided for comparison
    if let Some(reference_p) = args.reference.as_deref() {
        let reference = fs::read_to_string(reference_p).context(OpeningFileSnafu { path: reference_p })?;
        if reference.trim_end() != report.trim_end() {
            warn!("Found differences with the reference report");
            print_diff(reference.trim_end(), report.trim_end(), "\n");
            whatever!(
                "Difference detected between the report and the reference {}",
                reference_p
            )
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn test_dir(name: &str) -> String {
        format!("{}/testdata/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    fn args_for(name: &str) -> Args {
        let dir = test_dir(name);
        Args {
            config: Some(format!("{}/{}_config.json", dir, name)),
            reference: Some(format!("{}/{}_expected.txt", dir, name)),
            out: Some(String::new()),
            ..Args::default()
        }
    }

    #[test]
    fn dragon_quest() {
        let report = run_tally(&args_for("dragon_quest")).unwrap();
        assert!(report.contains("https://forums.example.com/posts/1004/"));
    }

    #[test]
    fn reference_mismatch() {
        let args = Args {
            partition_mode: Some("none".to_string()),
            ..args_for("dragon_quest")
        };
        assert!(run_tally(&args).is_err());
    }

    #[test]
    fn command_line_input() {
        let dir = test_dir("dragon_quest");
        let args = Args {
            input: Some(format!("{}/posts.txt", dir)),
            thread_url: Some("https://community.example.org/topic/7/dragon-quest".to_string()),
            partition_mode: Some("line".to_string()),
            start: Some(3),
            out: Some(String::new()),
            ..Args::default()
        };
        let report = run_tally(&args).unwrap();
        assert!(report.contains("https://community.example.org/post/1004"));
        assert!(!report.contains("/post/1002"));
    }

    #[test]
    fn missing_sources() {
        let args = Args {
            out: Some(String::new()),
            ..Args::default()
        };
        let err = run_tally(&args).unwrap_err();
        assert_eq!(
            err.to_string(),
            "No posts to read: pass --input or add postSources to the configuration"
        );
    }
}
