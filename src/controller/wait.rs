//! Bounded polling for pod removal.
//!
//! The wait is a plain poll loop with an interval and a ceiling. Dropping the
//! future (for example when the pass deadline fires) aborts it between polls.

use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::client::WorkloadClient;
use crate::controller::error::{Error, Result};

/// Poll until the named pod no longer exists, or fail with `Error::Timeout`.
pub async fn wait_for_pod_removal(
    client: &dyn WorkloadClient,
    namespace: &str,
    name: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if client.get_pod(namespace, name).await?.is_none() {
            debug!(pod = %name, "Pod removal confirmed");
            return Ok(());
        }
        if Instant::now() + interval > deadline {
            return Err(Error::Timeout(format!(
                "pod {namespace}/{name} still present after {timeout:?}"
            )));
        }
        sleep(interval).await;
    }
}
