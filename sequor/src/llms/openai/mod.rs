//! OpenAI-compatible chat completions client.
//!
//! Works against any endpoint that speaks the Chat Completions wire format
//! (OpenAI, Azure OpenAI, vLLM, Ollama's `/v1`, OpenRouter).

mod chat;
mod client;
mod config;
mod types;

pub use client::OpenAI;
pub use config::OpenAIConfig;
