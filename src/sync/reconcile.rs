//! Best-effort auto-start reconciliation.
//!
//! Runs against every freshly applied snapshot: enabled services whose last
//! known status is stopped get a start command. One failure never
//! suppresses the remaining services, and there is no in-pass retry; a
//! service that failed to start still reads stopped on the next sync and is
//! retried naturally then.

use tracing::{debug, warn};

use crate::directory::{Directory, ServiceStatus};
use crate::gateway::Gateway;

/// Issue start commands for enabled-but-stopped services, in directory
/// order. Returns how many commands were issued.
pub async fn auto_start(gateway: &dyn Gateway, directory: &Directory) -> usize {
    let mut issued = 0;
    for service in directory.iter() {
        if !service.enabled || service.status != ServiceStatus::Stopped {
            continue;
        }
        issued += 1;
        debug!("auto-start: starting {}", service.id);
        if let Err(err) = gateway.start_container(&service.id).await {
            warn!("auto-start for {} failed: {err}", service.id);
        }
    }
    if issued > 0 {
        debug!("auto-start reconciliation issued {issued} start command(s)");
    }
    issued
}
