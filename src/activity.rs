//! Best-effort user activity logging.

use bson::oid::ObjectId;
use tracing::warn;

use crate::{state::AppState, store::Activity};

/// Records one audit entry. Failures are logged and never surfaced to the
/// request that triggered them.
pub async fn track(
    state: &AppState,
    user_id: ObjectId,
    action: &str,
    params: Option<serde_json::Value>,
) {
    let activity = Activity::new(user_id, action, params);
    if let Err(e) = state.store.record_activity(activity).await {
        warn!(user_id = %user_id, action = %action, error = %e, "failed to record user activity");
    }
}
