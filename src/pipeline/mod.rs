// ABOUTME: Deployment pipeline: stage lifecycle, per-deployment locking, and error taxonomy.
// ABOUTME: Exports the state machine plus the status enums shared with the store.

mod error;
mod lock;
mod machine;
mod status;

pub use error::{PipelineError, PipelineErrorKind};
pub use lock::{LockInfo, PipelineLock};
pub use machine::Pipeline;
pub use status::{DeploymentStatus, StageKind, StageStatus};

use std::time::Duration;

/// Human-readable duration recorded on the deployment after a successful
/// cycle.
pub fn format_duration(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let minutes = total / 60;
    let seconds = total % 60;

    if total < 60 {
        format!("{seconds}s")
    } else if seconds == 0 {
        format!("{minutes}m")
    } else {
        format!("{minutes}m {seconds}s")
    }
}
