//! LLM integration module.
//!
//! Provides an OpenAI-compatible chat client behind the [`ChatModel`]
//! trait and the prompts used for answering and judging.

mod client;
mod prompts;

pub use client::{ChatModel, LlmClient, LlmResponse, Message, Role, TokenUsage, api_url};
pub use prompts::Prompts;
