//! Language-model collaborator: transport, prompts, and output parsing.
//!
//! The pipeline talks to the model through [`ChatClient`], whose single
//! method returns `None` on any transport or provider failure — callers
//! treat `None` as "stage not ready, retry next tick", never as a permanent
//! record failure. [`prompts`] holds the four conversation builders and
//! [`extract`] the bracket parsing their outputs are contractually bound to.

mod client;
pub mod extract;
pub mod prompts;

pub use client::{ChatClient, ClientOptions, Message, OpenRouterClient, Role};
