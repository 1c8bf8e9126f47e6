//! Summary and channel message types

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ParseError, UserId};

/// Unique summary identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SummaryId(pub Uuid);

impl SummaryId {
    /// Create a new random summary ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SummaryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SummaryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A work note written during the reporting window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A git commit in the reporting window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    pub sha: String,
    pub message: String,
    pub author: String,
    pub committed_at: DateTime<Utc>,
}

/// A Todoist task touched in the reporting window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEntry {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Todoist tasks split by what happened to them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoistTasks {
    #[serde(default)]
    pub added_or_updated: Vec<TaskEntry>,
    #[serde(default)]
    pub completed: Vec<TaskEntry>,
}

impl TodoistTasks {
    /// Whether there are no tasks at all
    pub fn is_empty(&self) -> bool {
        self.added_or_updated.is_empty() && self.completed.is_empty()
    }
}

/// Everything a summary is drafted from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryContext {
    pub project_name: String,
    pub audience_name: String,
    #[serde(default)]
    pub audience_description: Option<String>,
    /// Reporting window start
    pub period_start: DateTime<Utc>,
    /// Reporting window end (inclusive)
    pub period_end: DateTime<Utc>,
    #[serde(default)]
    pub notes: Vec<NoteEntry>,
    #[serde(default)]
    pub commits: Vec<CommitEntry>,
    #[serde(default)]
    pub todoist_tasks: TodoistTasks,
    /// Repository name -> branch the commits were read from
    #[serde(default)]
    pub repository_branches: BTreeMap<String, String>,
}

/// A generated summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub id: SummaryId,
    pub user_id: UserId,
    pub context: SummaryContext,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Output channel a summary can be reformatted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Slack,
    LinkedIn,
    X,
}

impl Channel {
    /// Every channel
    pub const ALL: [Channel; 4] = [Channel::Email, Channel::Slack, Channel::LinkedIn, Channel::X];

    /// Stored string form
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Slack => "slack",
            Self::LinkedIn => "linkedin",
            Self::X => "x",
        }
    }

    /// Human-readable channel name
    pub const fn display_name(&self) -> &'static str {
        match self {
            Self::Email => "Email",
            Self::Slack => "Slack",
            Self::LinkedIn => "LinkedIn post",
            Self::X => "X post",
        }
    }

    /// Maximum message length, if the channel has one
    pub const fn character_limit(&self) -> Option<usize> {
        match self {
            Self::Email | Self::Slack => None,
            Self::LinkedIn => Some(3_000),
            Self::X => Some(280),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Channel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "email" => Ok(Self::Email),
            "slack" => Ok(Self::Slack),
            "linkedin" => Ok(Self::LinkedIn),
            "x" | "twitter" => Ok(Self::X),
            _ => Err(ParseError::InvalidChannel(s.to_string())),
        }
    }
}

/// A channel-specific message derived from a summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub summary_id: SummaryId,
    pub channel: Channel,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_parse() {
        assert_eq!("twitter".parse::<Channel>().unwrap(), Channel::X);
        assert_eq!("LinkedIn".parse::<Channel>().unwrap(), Channel::LinkedIn);
        assert!("fax".parse::<Channel>().is_err());
    }

    #[test]
    fn test_context_defaults_missing_evidence() {
        let json = serde_json::json!({
            "project_name": "Recap",
            "audience_name": "Leadership",
            "period_start": "2025-03-01T00:00:00Z",
            "period_end": "2025-03-07T23:59:59Z"
        });
        let ctx: SummaryContext = serde_json::from_value(json).unwrap();
        assert!(ctx.notes.is_empty());
        assert!(ctx.commits.is_empty());
        assert!(ctx.todoist_tasks.is_empty());
        assert!(ctx.audience_description.is_none());
    }
}
