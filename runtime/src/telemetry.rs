//! Tracing setup and metric names.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Counter: engine results committed to the repository.
pub const MUTATIONS_COMMITTED: &str = "helpdesk.mutations.committed";
/// Counter: commands the engine rejected.
pub const MUTATIONS_REJECTED: &str = "helpdesk.mutations.rejected";
/// Counter: commits that hit a version conflict.
pub const COMMIT_CONFLICTS: &str = "helpdesk.commit.conflicts";
/// Counter: notifications handed to the mailer successfully.
pub const NOTIFICATIONS_DELIVERED: &str = "helpdesk.notifications.delivered";
/// Counter: notifications the mailer failed to deliver.
pub const NOTIFICATIONS_FAILED: &str = "helpdesk.notifications.failed";

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used. Calling this
/// twice is harmless: the second install is ignored.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

/// Describe the helpdesk counters to whatever recorder is installed.
pub fn describe_metrics() {
    metrics::describe_counter!(MUTATIONS_COMMITTED, "Engine results committed to the repository");
    metrics::describe_counter!(MUTATIONS_REJECTED, "Commands rejected by the engine");
    metrics::describe_counter!(COMMIT_CONFLICTS, "Commits that hit a version conflict");
    metrics::describe_counter!(NOTIFICATIONS_DELIVERED, "Notifications delivered");
    metrics::describe_counter!(NOTIFICATIONS_FAILED, "Notifications that failed to deliver");
}
