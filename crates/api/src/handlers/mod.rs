pub mod generate;
pub mod library;
pub mod media;
pub mod prompt;

use tunesmith_core::types::DbId;
use tunesmith_events::{event_types, PlatformEvent};
use tunesmith_storage::ArtifactStore;

use crate::state::AppState;

/// Delete a stored file. A failure is logged and published as an orphan
/// for out-of-band cleanup.
pub(crate) async fn discard_or_report(
    state: &AppState,
    store: &ArtifactStore,
    file_path: &str,
    record_id: Option<DbId>,
) {
    let Err(e) = store.discard(file_path).await else {
        return;
    };
    tracing::warn!(file_path = %file_path, error = %e, "Stored file not removed");
    let mut event = PlatformEvent::new(event_types::ARTIFACT_ORPHANED).with_payload(
        serde_json::json!({
            "file_path": file_path,
            "error": e.to_string(),
        }),
    );
    if let Some(id) = record_id {
        event = event.with_record(id);
    }
    state.event_bus.publish(event);
}
