//! Shared domain types, error taxonomy, and async utilities for the
//! tunesmith generation service.
//!
//! - [`generation`]: requests, remote task handles, artifacts.
//! - [`error`]: [`CoreError`](error::CoreError) and the generation
//!   failure taxonomy [`GenerationError`](error::GenerationError).
//! - [`polling`]: the poll-until-terminal-or-deadline loop.
//! - [`retry`]: bounded linear-backoff retry.

pub mod error;
pub mod generation;
pub mod polling;
pub mod retry;
pub mod types;
