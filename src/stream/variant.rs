//! Feed-variant tolerant conversion of one decoded JSON element
//!
//! Real-world dumps disagree on field names: some carry `nameWithOwner`,
//! others split `owner`/`name`, REST dumps use `full_name` or only a URL.
//! Counts that are absent or mistyped become zero. An element with no
//! usable key is reported as `MissingKey` so the caller can skip it.

use crate::error::{IngestError, Result};
use crate::types::{RepositoryRecord, TopicRecord};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static GITHUB_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://(?:www\.)?github\.com/([^/\s]+)/([^/\s#?]+?)(?:\.git)?/?$").unwrap()
});

const STAR_FIELDS: &[&str] = &["stars", "stargazerCount", "stargazers_count"];
const FORK_FIELDS: &[&str] = &["forks", "forkCount", "forks_count"];
const ISSUE_FIELDS: &[&str] = &["issues", "openIssues", "open_issues_count"];

/// Convert one array element into a repository record
pub fn record_from_value(value: Value, position: usize) -> Result<RepositoryRecord> {
    let Value::Object(obj) = value else {
        return Err(IngestError::malformed(position, "element is not an object"));
    };

    let name_with_owner = natural_key(&obj).ok_or(IngestError::MissingKey { position })?;

    Ok(RepositoryRecord {
        name_with_owner,
        stars: first_count(&obj, STAR_FIELDS),
        forks: first_count(&obj, FORK_FIELDS),
        open_issues: first_count(&obj, ISSUE_FIELDS),
        topics: topics(obj.get("topics")),
    })
}

fn natural_key(obj: &Map<String, Value>) -> Option<String> {
    if let Some(key) = non_empty_str(obj.get("nameWithOwner")) {
        return Some(key.to_string());
    }

    let owner = match obj.get("owner") {
        Some(Value::Object(owner)) => non_empty_str(owner.get("login")),
        other => non_empty_str(other),
    };
    if let (Some(owner), Some(name)) = (owner, non_empty_str(obj.get("name"))) {
        return Some(format!("{}/{}", owner, name));
    }

    if let Some(key) = non_empty_str(obj.get("full_name")) {
        return Some(key.to_string());
    }

    ["html_url", "url"].iter().find_map(|field| {
        let url = non_empty_str(obj.get(*field))?;
        let caps = GITHUB_URL_REGEX.captures(url)?;
        Some(format!("{}/{}", &caps[1], &caps[2]))
    })
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
        _ => None,
    }
}

/// Lenient non-negative count: integers, integral floats and numeric strings
fn count(value: &Value) -> Option<i64> {
    let n = match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        // GraphQL dumps wrap counts as {"totalCount": n}
        Value::Object(obj) => obj.get("totalCount").and_then(count)?,
        _ => return None,
    };
    Some(n.max(0))
}

fn first_count(obj: &Map<String, Value>, fields: &[&str]) -> i64 {
    fields
        .iter()
        .find_map(|field| obj.get(*field).and_then(count))
        .unwrap_or(0)
}

fn topics(value: Option<&Value>) -> Vec<TopicRecord> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(name) if !name.is_empty() => Some(TopicRecord::new(name.clone(), 0)),
            Value::Object(topic) => {
                let name = non_empty_str(topic.get("name"))?;
                Some(TopicRecord::new(name, first_count(topic, STAR_FIELDS)))
            }
            _ => None,
        })
        .collect()
}
