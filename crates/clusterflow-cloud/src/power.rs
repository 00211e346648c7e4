//! Server power-state transitions

use crate::api::InstanceApi;
use crate::error::{CloudError, Result};
use crate::model::{Server, ServerAction, ServerState, Volume, VolumeState};
use crate::wait::{Observed, WaitConfig, observe, wait_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Actions leading from one settled state to another
pub fn transition_actions(from: ServerState, to: ServerState) -> Option<&'static [ServerAction]> {
    use ServerAction::*;
    use ServerState::*;

    let actions: &'static [ServerAction] = match (from, to) {
        (Stopped, Running) => &[Poweron],
        (Stopped, StoppedInPlace) => &[Poweron, StopInPlace],
        (Running, Stopped) => &[Poweroff],
        (Running, StoppedInPlace) => &[StopInPlace],
        (StoppedInPlace, Running) => &[Poweron],
        (StoppedInPlace, Stopped) => &[Poweron, Poweroff],
        _ => return None,
    };
    Some(actions)
}

/// Wait for a server to leave starting/stopping
pub async fn wait_for_settled(
    api: &dyn InstanceApi,
    id: &str,
    wait: &WaitConfig,
    cancel: Option<&CancellationToken>,
) -> Result<Server> {
    let what = format!("server {} to settle", id);
    let observed = wait_until(
        &what,
        wait,
        cancel,
        || async move { observe(api.get_server(id).await) },
        |o: &Observed<Server>| match o {
            Observed::Present(server) => !server.state.is_transient(),
            Observed::Gone => true,
        },
    )
    .await?;

    observed
        .into_present()
        .ok_or_else(|| CloudError::not_found(crate::resource::ResourceType::Instance, id))
}

/// Wait until every volume attached to the server is available
pub async fn wait_for_volumes(
    api: &dyn InstanceApi,
    server: &Server,
    wait: &WaitConfig,
    cancel: Option<&CancellationToken>,
) -> Result<()> {
    for volume in server.volumes.values() {
        let what = format!("volume {} to be available", volume.id);
        wait_until(
            &what,
            wait,
            cancel,
            || async move { observe(api.get_volume(&volume.id).await) },
            |o: &Observed<Volume>| match o {
                Observed::Present(v) => v.state == VolumeState::Available,
                Observed::Gone => true,
            },
        )
        .await?;
    }
    Ok(())
}

/// Drive a server to `target`, issuing the table's actions in order.
///
/// Returns `NotFound` if the server disappears along the way.
pub async fn reach_state(
    api: &dyn InstanceApi,
    id: &str,
    target: ServerState,
    wait: &WaitConfig,
    cancel: Option<&CancellationToken>,
) -> Result<Server> {
    let server = wait_for_settled(api, id, wait, cancel).await?;
    if server.state == target {
        debug!(server = %id, state = %target, "already in target state");
        return Ok(server);
    }

    let actions =
        transition_actions(server.state, target).ok_or_else(|| CloudError::NoKnownTransition {
            server: id.to_string(),
            from: server.state,
            to: target,
        })?;

    wait_for_volumes(api, &server, wait, cancel).await?;

    let mut current = server;
    for action in actions {
        info!(server = %id, %action, from = %current.state, "issuing server action");
        api.server_action(id, *action).await?;
        current = wait_for_settled(api, id, wait, cancel).await?;
    }

    if current.state != target {
        return Err(CloudError::ApiError(format!(
            "server {} ended in state {} instead of {}",
            id, current.state, target
        )));
    }
    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCloud;
    use ServerState::*;
    use std::time::Duration;

    fn quick() -> WaitConfig {
        WaitConfig::new(Duration::from_secs(1), Duration::from_secs(30))
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(
            transition_actions(Stopped, Running),
            Some(&[ServerAction::Poweron][..])
        );
        assert_eq!(
            transition_actions(Stopped, StoppedInPlace),
            Some(&[ServerAction::Poweron, ServerAction::StopInPlace][..])
        );
        assert_eq!(
            transition_actions(Running, Stopped),
            Some(&[ServerAction::Poweroff][..])
        );
        assert_eq!(
            transition_actions(Running, StoppedInPlace),
            Some(&[ServerAction::StopInPlace][..])
        );
        assert_eq!(
            transition_actions(StoppedInPlace, Running),
            Some(&[ServerAction::Poweron][..])
        );
        assert_eq!(
            transition_actions(StoppedInPlace, Stopped),
            Some(&[ServerAction::Poweron, ServerAction::Poweroff][..])
        );
    }

    #[test]
    fn test_unknown_pairs_have_no_transition() {
        assert_eq!(transition_actions(Locked, Running), None);
        assert_eq!(transition_actions(Running, Starting), None);
        assert_eq!(transition_actions(Stopped, Locked), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reach_state_runs_both_actions() {
        let cloud = FakeCloud::new();
        let id = cloud.add_server("web-1", &[], StoppedInPlace);

        let server = reach_state(&cloud, &id, Stopped, &quick(), None)
            .await
            .unwrap();

        assert_eq!(server.state, Stopped);
        assert_eq!(
            cloud.actions_for(&id),
            vec![ServerAction::Poweron, ServerAction::Poweroff]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reach_state_noop_when_already_there() {
        let cloud = FakeCloud::new();
        let id = cloud.add_server("web-1", &[], Running);

        reach_state(&cloud, &id, Running, &quick(), None)
            .await
            .unwrap();

        assert!(cloud.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reach_state_from_locked_fails() {
        let cloud = FakeCloud::new();
        let id = cloud.add_server("web-1", &[], Locked);

        let err = reach_state(&cloud, &id, Stopped, &quick(), None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CloudError::NoKnownTransition {
                from: Locked,
                to: Stopped,
                ..
            }
        ));
        assert!(cloud.mutations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reach_state_waits_for_busy_volumes() {
        let cloud = FakeCloud::new();
        let id = cloud.add_server("web-1", &[], Running);
        let volume = cloud.root_volume_of(&id);
        cloud.set_volume_busy(&volume, 3);

        reach_state(&cloud, &id, Stopped, &quick(), None)
            .await
            .unwrap();

        assert_eq!(cloud.volume_polls(&volume), 4);
        assert_eq!(cloud.actions_for(&id), vec![ServerAction::Poweroff]);
    }
}
