//! Prompt assembly
//!
//! Turns a summary context into a chat prompt, and a stored summary into a
//! channel-specific rewrite prompt.

use std::fmt::Write;

use recap_types::{Channel, SummaryContext};

use crate::client::GenerationRequest;

/// Token budget for a summary
pub const SUMMARY_MAX_TOKENS: u32 = 2000;
/// Token budget for a channel message
pub const MESSAGE_MAX_TOKENS: u32 = 1000;

const SUMMARY_SYSTEM_PROMPT: &str = "You write concise status updates from a person's work notes, \
git commits and tasks. Tailor tone and level of detail to the named audience. \
Group related work, lead with outcomes, and do not invent work that is not in the evidence.";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A system and user message pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// Wrap into a generation request
    pub fn into_request(self, max_tokens: u32) -> GenerationRequest {
        GenerationRequest {
            prompt: self,
            max_tokens,
        }
    }
}

/// Prompt for drafting a summary from its evidence
pub fn summary_prompt(ctx: &SummaryContext) -> Prompt {
    let mut user = String::new();

    let _ = write!(
        user,
        "# Summary Request\n\n**Project**: {}\n**Audience**: {}",
        ctx.project_name, ctx.audience_name
    );
    if let Some(description) = ctx.audience_description.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(user, "\n**Audience Context**: {description}");
    }
    let _ = write!(
        user,
        "\n**Time Period**: {} to {}\n\n## Work Evidence\n\n### Notes ({})\n",
        ctx.period_start.format(DATE_FORMAT),
        ctx.period_end.format(DATE_FORMAT),
        ctx.notes.len()
    );

    if ctx.notes.is_empty() {
        user.push_str("\nNo notes in this period.\n");
    }
    for (i, note) in ctx.notes.iter().enumerate() {
        let _ = write!(
            user,
            "\n**Note {}** ({}):\n{}\n",
            i + 1,
            note.created_at.format(DATE_FORMAT),
            note.content
        );
    }

    let _ = write!(user, "\n### Commits ({})\n", ctx.commits.len());
    if ctx.commits.is_empty() {
        user.push_str("\nNo commits in this period.\n");
    }
    for (i, commit) in ctx.commits.iter().enumerate() {
        let _ = write!(
            user,
            "\n**Commit {}** ({}, {}):\n{}\n",
            i + 1,
            commit.author,
            commit.committed_at.format(DATE_FORMAT),
            commit.message
        );
    }

    if !ctx.repository_branches.is_empty() {
        user.push_str("\n### Repositories\n");
        for (repo, branch) in &ctx.repository_branches {
            let _ = write!(user, "\n- {repo} (branch: {branch})");
        }
        user.push('\n');
    }

    let tasks = &ctx.todoist_tasks;
    if !tasks.is_empty() {
        user.push_str("\n### Todoist Tasks\n");

        if !tasks.added_or_updated.is_empty() {
            let _ = write!(
                user,
                "\n**Tasks Added or Updated ({})**:\nThese tasks were created or modified during the period:",
                tasks.added_or_updated.len()
            );
            for (i, task) in tasks.added_or_updated.iter().enumerate() {
                let due = task
                    .due_date
                    .as_deref()
                    .map(|d| format!(" (due: {d})"))
                    .unwrap_or_default();
                let _ = write!(user, "\n{}. {}{due}", i + 1, task.content);
            }
            user.push('\n');
        }

        if !tasks.completed.is_empty() {
            let _ = write!(
                user,
                "\n**Tasks Completed ({})**:\nThese tasks were completed during the period:",
                tasks.completed.len()
            );
            for (i, task) in tasks.completed.iter().enumerate() {
                let completed = task
                    .completed_at
                    .map(|t| format!(" (completed: {})", t.format(DATE_FORMAT)))
                    .unwrap_or_default();
                let _ = write!(user, "\n{}. {}{completed}", i + 1, task.content);
            }
            user.push('\n');
        }
    }

    let _ = write!(
        user,
        "\n---\n\nBased on the notes, commits, and tasks above, generate a summary appropriate for the \"{}\" audience.",
        ctx.audience_name
    );

    Prompt {
        system: SUMMARY_SYSTEM_PROMPT.to_string(),
        user,
    }
}

/// Prompt for rewriting a summary as a message for `channel`
pub fn message_prompt(ctx: &SummaryContext, summary_text: &str, channel: Channel) -> Prompt {
    let mut user = format!(
        "# Summary to Transform\n\n**Project**: {}\n**Audience**: {}",
        ctx.project_name, ctx.audience_name
    );
    if let Some(description) = ctx.audience_description.as_deref().filter(|d| !d.is_empty()) {
        let _ = write!(user, "\n**Audience Context**: {description}");
    }
    let _ = write!(
        user,
        "\n\n## Original Summary:\n\n{summary_text}\n\n---\n\nGenerate a {} message from this summary.",
        channel.display_name()
    );
    if let Some(limit) = channel.character_limit() {
        let _ = write!(user, " CRITICAL: Must be {limit} characters or less.");
    }

    Prompt {
        system: channel_system_prompt(channel).to_string(),
        user,
    }
}

/// Warning text when `text` is longer than the channel allows
pub fn character_limit_warning(channel: Channel, text: &str) -> Option<String> {
    let limit = channel.character_limit()?;
    let length = text.chars().count();
    (length > limit).then(|| {
        format!("Generated message is {length} characters, exceeds limit of {limit}")
    })
}

fn channel_system_prompt(channel: Channel) -> &'static str {
    match channel {
        Channel::Email => {
            "You turn status summaries into a short email with a subject line, a greeting, \
             and a few clear paragraphs."
        }
        Channel::Slack => {
            "You turn status summaries into a Slack update: brief, skimmable bullet points, \
             light formatting, no greeting."
        }
        Channel::LinkedIn => {
            "You turn status summaries into a professional LinkedIn post written in the \
             first person, focused on outcomes."
        }
        Channel::X => {
            "You turn status summaries into a single post for X. Be punchy and stay within \
             the character limit."
        }
    }
}
