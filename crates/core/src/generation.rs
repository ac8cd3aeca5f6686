//! Generation domain types and constants.
//!
//! Provides the caller-facing [`GenerationRequest`], the vendor-neutral
//! view of an in-flight job ([`TaskHandle`], [`RemoteTask`],
//! [`TaskPhase`]), and the transient downloaded [`Artifact`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default delay between two vendor status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default number of status checks before a job times out (3 minutes).
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 36;

/// Duration recorded when the vendor does not report one.
pub const DEFAULT_DURATION_SECS: i32 = 60;

/// Content type of generated audio.
pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Upper bound on prompt length accepted from callers.
pub const MAX_PROMPT_CHARS: usize = 3000;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A caller's request to generate one piece of media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Optional style hint forwarded to the vendor (e.g. `"lo-fi, jazzy"`).
    #[serde(default)]
    pub style: Option<String>,
    /// Instrumental-only output. The vendor default is `true`.
    #[serde(default)]
    pub instrumental: Option<bool>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Check the request and return it with the prompt trimmed.
    pub fn validated(mut self) -> Result<Self, GenerationError> {
        let trimmed = self.prompt.trim();
        if trimmed.is_empty() {
            return Err(GenerationError::InvalidRequest("Prompt is required".into()));
        }
        if trimmed.chars().count() > MAX_PROMPT_CHARS {
            return Err(GenerationError::InvalidRequest(format!(
                "Prompt must be at most {MAX_PROMPT_CHARS} characters"
            )));
        }
        self.prompt = trimmed.to_string();
        self.style = self
            .style
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Remote task
// ---------------------------------------------------------------------------

/// Opaque vendor identifier for a started job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(pub String);

impl TaskHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical vendor job phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskPhase {
    Pending,
    Processing,
    Success,
    Failed,
}

impl TaskPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// Snapshot of one vendor job as observed by a status check.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTask {
    pub task_id: String,
    pub phase: TaskPhase,
    /// Download location of the finished artifact. Only set on success.
    pub result_url: Option<String>,
    /// Length of the generated media, when the vendor reports it.
    pub duration_secs: Option<f64>,
    /// Vendor-supplied explanation for a failure.
    pub failure_reason: Option<String>,
}

impl RemoteTask {
    /// A task the vendor has not reported on (yet).
    pub fn pending(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            phase: TaskPhase::Pending,
            result_url: None,
            duration_secs: None,
            failure_reason: None,
        }
    }

    pub fn processing(task_id: impl Into<String>) -> Self {
        Self {
            phase: TaskPhase::Processing,
            ..Self::pending(task_id)
        }
    }

    pub fn succeeded(
        task_id: impl Into<String>,
        result_url: impl Into<String>,
        duration_secs: Option<f64>,
    ) -> Self {
        Self {
            phase: TaskPhase::Success,
            result_url: Some(result_url.into()),
            duration_secs,
            ..Self::pending(task_id)
        }
    }

    pub fn failed(task_id: impl Into<String>, reason: Option<String>) -> Self {
        Self {
            phase: TaskPhase::Failed,
            failure_reason: reason,
            ..Self::pending(task_id)
        }
    }
}

/// Whole seconds to record for a finished artifact.
///
/// Rounds the vendor-reported duration; falls back to
/// [`DEFAULT_DURATION_SECS`] when absent or not a positive finite number.
pub fn record_duration_secs(reported: Option<f64>) -> i32 {
    match reported {
        Some(secs) if secs.is_finite() && secs > 0.0 => secs.round().min(i32::MAX as f64) as i32,
        _ => DEFAULT_DURATION_SECS,
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// Downloaded media bytes, alive only between fetch and store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl Artifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_prompt_is_rejected() {
        let err = GenerationRequest::new("   ").validated().unwrap_err();
        assert_matches!(err, GenerationError::InvalidRequest(_));
    }

    #[test]
    fn prompt_and_style_are_trimmed() {
        let req = GenerationRequest {
            prompt: "  lo-fi beats ".into(),
            style: Some("  ".into()),
            instrumental: None,
        }
        .validated()
        .unwrap();
        assert_eq!(req.prompt, "lo-fi beats");
        assert_eq!(req.style, None);
    }

    #[test]
    fn overlong_prompt_is_rejected() {
        let long = "a".repeat(MAX_PROMPT_CHARS + 1);
        assert_matches!(
            GenerationRequest::new(long).validated(),
            Err(GenerationError::InvalidRequest(_))
        );
    }

    #[test]
    fn duration_rounds_reported_value() {
        assert_eq!(record_duration_secs(Some(42.0)), 42);
        assert_eq!(record_duration_secs(Some(181.6)), 182);
    }

    #[test]
    fn duration_falls_back_when_missing_or_bogus() {
        assert_eq!(record_duration_secs(None), DEFAULT_DURATION_SECS);
        assert_eq!(record_duration_secs(Some(0.0)), DEFAULT_DURATION_SECS);
        assert_eq!(record_duration_secs(Some(f64::NAN)), DEFAULT_DURATION_SECS);
    }

    #[test]
    fn only_success_and_failed_are_terminal() {
        assert!(TaskPhase::Success.is_terminal());
        assert!(TaskPhase::Failed.is_terminal());
        assert!(!TaskPhase::Pending.is_terminal());
        assert!(!TaskPhase::Processing.is_terminal());
    }
}
