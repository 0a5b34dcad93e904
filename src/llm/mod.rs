//! LLM client abstractions
//!
//! - [`client`] - the provider-agnostic [`LLMClient`] trait
//! - [`openai`] - an OpenAI-compatible chat completions client

pub mod client;
pub mod openai;

pub use client::LLMClient;
pub use openai::OpenAIClient;
