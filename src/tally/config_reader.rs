use crate::tally::*;

use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuestSettings {
    #[serde(rename = "threadName")]
    pub thread_name: Option<String>,
    #[serde(rename = "threadUrl")]
    pub thread_url: Option<String>,
    #[serde(rename = "forumType")]
    pub forum_type: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct PostSource {
    pub provider: String,
    #[serde(rename = "filePath")]
    pub file_path: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuestRules {
    #[serde(rename = "partitionMode")]
    pub partition_mode: Option<String>,
    #[serde(rename = "startPost")]
    pub start_post: Option<u32>,
    #[serde(rename = "endPost")]
    pub end_post: Option<u32>,
    #[serde(rename = "excludeThreadStarter")]
    pub exclude_thread_starter: Option<bool>,
    #[serde(rename = "threadStarter")]
    pub thread_starter: Option<String>,
    #[serde(rename = "tallyRanks")]
    pub tally_ranks: Option<bool>,
    #[serde(rename = "sortResults")]
    pub sort_results: Option<bool>,
    #[serde(rename = "groupByTask")]
    pub group_by_task: Option<bool>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct QuestConfig {
    #[serde(default)]
    pub quest: QuestSettings,
    #[serde(rename = "postSources", default)]
    pub post_sources: Vec<PostSource>,
    #[serde(default)]
    pub rules: QuestRules,
}

pub fn read_config(path: &str) -> TallyResult<QuestConfig> {
    let contents = fs::read_to_string(path).context(OpeningFileSnafu { path })?;
    parse_config(&contents, path)
}

pub fn parse_config(contents: &str, path: &str) -> TallyResult<QuestConfig> {
    let config: QuestConfig = serde_json::from_str(contents).context(ParsingJsonSnafu { path })?;
    debug!("parse_config: {:?}", config);
    Ok(config)
}

pub fn parse_partition_mode(value: &str) -> TallyResult<PartitionMode> {
    match value.trim().to_lowercase().as_str() {
        "none" | "" => Ok(PartitionMode::None),
        "line" => Ok(PartitionMode::Line),
        "block" => Ok(PartitionMode::Block),
        "blockall" | "block_all" => Ok(PartitionMode::BlockAll),
        _ => InvalidOptionSnafu {
            name: "partitionMode",
            value,
        }
        .fail(),
    }
}

/// Turns the rules of the configuration file into tally options.
pub fn validate_rules(rules: &QuestRules) -> TallyResult<TallyOptions> {
    let defaults = TallyOptions::DEFAULT_OPTIONS;
    let partition_mode = match rules.partition_mode.as_deref() {
        Some(mode) => parse_partition_mode(mode)?,
        None => defaults.partition_mode,
    };
    let start_post = rules.start_post.unwrap_or(defaults.start_post);
    if start_post == 0 {
        return InvalidOptionSnafu {
            name: "startPost",
            value: "0",
        }
        .fail();
    }
    let end_post = rules.end_post.unwrap_or(defaults.end_post);
    if end_post != 0 && end_post < start_post {
        return InvalidOptionSnafu {
            name: "endPost",
            value: end_post.to_string(),
        }
        .fail();
    }
    let thread_starter = match rules.thread_starter.as_deref().map(str::trim) {
        Some(x) if x.is_empty() => None,
        x => x.map(|s| s.to_string()),
    };
    Ok(TallyOptions {
        partition_mode,
        start_post,
        end_post,
        exclude_thread_starter: rules
            .exclude_thread_starter
            .unwrap_or(defaults.exclude_thread_starter),
        thread_starter,
        tally_ranks: rules.tally_ranks.unwrap_or(defaults.tally_ranks),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config() {
        let js = r#"{
            "quest": {
                "threadName": "Dragon Quest",
                "threadUrl": "https://forums.example.com/threads/dragon-quest.123/",
                "forumType": "xenforo"
            },
            "postSources": [{ "provider": "dump", "filePath": "posts.txt" }],
            "rules": {
                "partitionMode": "blockAll",
                "startPost": 10,
                "endPost": 0,
                "excludeThreadStarter": false,
                "threadStarter": "  ",
                "tallyRanks": false,
                "sortResults": true
            }
        }"#;
        let config = parse_config(js, "test.json").unwrap();
        assert_eq!(config.quest.thread_name.as_deref(), Some("Dragon Quest"));
        assert_eq!(config.post_sources.len(), 1);
        let options = validate_rules(&config.rules).unwrap();
        assert_eq!(
            options,
            TallyOptions {
                partition_mode: PartitionMode::BlockAll,
                start_post: 10,
                end_post: 0,
                exclude_thread_starter: false,
                thread_starter: None,
                tally_ranks: false,
            }
        );
    }

    #[test]
    fn empty_config() {
        let config = parse_config("{}", "test.json").unwrap();
        assert_eq!(
            validate_rules(&config.rules).unwrap(),
            TallyOptions::DEFAULT_OPTIONS
        );
    }

    #[test]
    fn invalid_rules() {
        let rules = QuestRules {
            partition_mode: Some("paragraph".to_string()),
            ..QuestRules::default()
        };
        assert!(validate_rules(&rules).is_err());
        let rules = QuestRules {
            start_post: Some(0),
            ..QuestRules::default()
        };
        assert!(validate_rules(&rules).is_err());
        let rules = QuestRules {
            start_post: Some(20),
            end_post: Some(10),
            ..QuestRules::default()
        };
        assert!(validate_rules(&rules).is_err());
        assert!(parse_config("{ \"rules\": [] }", "test.json").is_err());
    }
}
