//! LLM backend implementations.
//!
//! Each backend is organized into its own submodule.
//!
//! # Available Backends
//!
//! - [`openai`] - OpenAI Chat Completions API and compatible servers
//! - [`mock`] - Scripted provider for tests and offline runs

pub mod mock;

#[cfg(feature = "openai")]
pub mod openai;

pub use mock::ScriptedProvider;

#[cfg(feature = "openai")]
pub use openai::{OpenAI, OpenAIConfig};
