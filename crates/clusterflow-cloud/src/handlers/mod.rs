//! Built-in resource handlers

pub mod dns;
pub mod gateway;
pub mod instance;
pub mod load_balancer;
pub mod network;
pub mod volume;

pub use dns::DnsRecordHandler;
pub use gateway::GatewayHandler;
pub use instance::InstanceHandler;
pub use load_balancer::LoadBalancerHandler;
pub use network::PrivateNetworkHandler;
pub use volume::VolumeHandler;

use crate::error::Result;
use crate::wait::{WaitConfig, gone, observe, wait_until};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Keep only exact name matches; API name filters match substrings.
pub(crate) fn exact_name<T>(items: Vec<T>, name: &str, name_of: impl Fn(&T) -> &str) -> Vec<T> {
    items.into_iter().filter(|i| name_of(i) == name).collect()
}

/// Poll `describe` until it reports `NotFound`.
pub(crate) async fn wait_until_gone<T, F, Fut>(
    what: &str,
    wait: &WaitConfig,
    cancel: Option<&CancellationToken>,
    describe: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut describe = describe;
    wait_until(
        &format!("{} to be deleted", what),
        wait,
        cancel,
        || {
            let fut = describe();
            async move { observe(fut.await) }
        },
        gone,
    )
    .await?;
    debug!(what, "deleted");
    Ok(())
}
