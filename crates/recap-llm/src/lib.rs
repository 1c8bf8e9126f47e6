//! Recap LLM - Text generation for summaries and channel messages
//!
//! A [`TextGenerator`] trait with an OpenAI-compatible chat-completions
//! implementation, and prompt assembly from a [`recap_types::SummaryContext`].

pub mod client;
pub mod config;
pub mod error;
pub mod prompt;

pub use client::{Generation, GenerationRequest, OpenAiClient, TextGenerator, TokenUsage};
pub use config::LlmConfig;
pub use error::LlmError;
pub use prompt::{
    character_limit_warning, message_prompt, summary_prompt, Prompt, MESSAGE_MAX_TOKENS,
    SUMMARY_MAX_TOKENS,
};
