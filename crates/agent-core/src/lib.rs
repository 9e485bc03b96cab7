//! LLM-driven agent for turn-based strategy game environments.
//!
//! The runner binary wires these pieces to a live environment bridge and a chat-completion
//! endpoint; everything here is transport-agnostic apart from [`llm`].

pub mod agent;
pub mod config;
pub mod llm;
