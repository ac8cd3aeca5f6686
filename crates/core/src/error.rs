/// Domain errors shared by the HTTP layer and the adapters.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Canonical failure taxonomy for one generation run.
///
/// Every adapter error is translated into one of these variants before it
/// reaches the orchestrator, and every terminal `Failed` phase carries one.
/// The [`code`](Self::code) is stable and safe to expose to callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenerationError {
    /// Bad caller input, or the vendor rejected the prompt.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The vendor start call failed (unreachable or non-success envelope).
    #[error("Generation service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// The polling ceiling was reached before the vendor finished.
    #[error("Generation timed out after {attempts} status checks")]
    Timeout { attempts: u32 },

    /// The vendor explicitly reported the task as failed.
    #[error("Generation failed: {0}")]
    VendorReportedFailure(String),

    /// The finished artifact could not be downloaded.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// The artifact could not be written to blob storage.
    #[error("Storage upload failed: {0}")]
    PersistFailed(String),

    /// The metadata row could not be written.
    #[error("Saving the record failed: {0}")]
    RecordFailed(String),

    /// A job is already running on this orchestrator.
    #[error("A generation is already in progress")]
    Busy,

    /// The caller cancelled the run.
    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerationError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::UpstreamUnavailable(_) => "UPSTREAM_UNAVAILABLE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::VendorReportedFailure(_) => "VENDOR_FAILED",
            Self::DownloadFailed(_) => "DOWNLOAD_FAILED",
            Self::PersistFailed(_) => "PERSIST_FAILED",
            Self::RecordFailed(_) => "RECORD_FAILED",
            Self::Busy => "BUSY",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether submitting the same prompt again right away is likely to work.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable(_) | Self::Timeout { .. } | Self::DownloadFailed(_)
        )
    }

    /// Whether the vendor already produced the artifact before the failure.
    ///
    /// Callers use this to avoid re-submitting a prompt whose generation
    /// succeeded but whose persistence did not.
    pub fn generated_remotely(&self) -> bool {
        matches!(self, Self::PersistFailed(_) | Self::RecordFailed(_))
    }
}
