//! Sync Loop
//!
//! Polls the room on an interval, replaces the mirror wholesale, and on the
//! host device hands the fresh view to the `HostDriver`. A failed poll is
//! "no update this cycle"; a failed host step is reported on its own and
//! retried by the driver. The loop only stops when the room is gone or on
//! shutdown.

use tokio::sync::broadcast;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use werewolf::game::engine::GameEngine;
use werewolf::network::protocol::ErrorCode;
use werewolf::network::room::{RoomEvent, RoomStateView};

use crate::client::RoomClient;
use crate::config::ClientConfig;
use crate::host::{HostDriver, HostStep};
use crate::mirror::{Mirror, MirrorUpdate};
use crate::now_ms;
use crate::subscribe::RoomSubscription;
use crate::transport::TransportError;

/// What one poll did.
#[derive(Debug)]
pub struct SyncOutcome {
    /// Effect on the mirror.
    pub mirror: MirrorUpdate,
    /// Host step, when this device is host. A failure here does not undo
    /// the poll.
    pub host: Option<Result<HostStep, TransportError>>,
}

/// Polling loop for one device.
pub struct SyncLoop {
    client: RoomClient,
    config: ClientConfig,
    mirror: Mirror,
    host: Option<HostDriver>,
    view: Option<RoomStateView>,
}

impl SyncLoop {
    /// Loop for a seated client.
    pub fn new(client: RoomClient, config: ClientConfig) -> Self {
        Self { client, config, mirror: Mirror::new(), host: None, view: None }
    }

    /// Attach the host's engine driver.
    pub fn with_host(mut self, host: HostDriver) -> Self {
        self.host = Some(host);
        self
    }

    /// The mirror.
    pub fn mirror(&self) -> &Mirror {
        &self.mirror
    }

    /// Host driver, if this device is host.
    pub fn host(&self) -> Option<&HostDriver> {
        self.host.as_ref()
    }

    /// Mutable host driver, for host UI actions.
    pub fn host_mut(&mut self) -> Option<&mut HostDriver> {
        self.host.as_mut()
    }

    /// Last room view.
    pub fn view(&self) -> Option<&RoomStateView> {
        self.view.as_ref()
    }

    /// Poll once.
    pub async fn poll_once(&mut self, now_ms: u64) -> Result<SyncOutcome, TransportError> {
        let view = self.client.get_state().await?;
        let mirror = self.mirror.apply(view.game_state.clone(), view.state_hash.clone());
        if mirror == MirrorUpdate::Applied {
            debug!("Mirror now at v{:?}", self.mirror.version());
        }

        let is_host = &view.host_id == self.client.player_id();
        match (is_host, self.host.is_some()) {
            (true, false) => {
                info!("Promoted to host of room {}", self.client.room_code());
                let engine = match self.mirror.state() {
                    Some(state) => GameEngine::from_snapshot(state.clone()),
                    None => GameEngine::new(),
                };
                self.host = Some(HostDriver::new(self.client.clone(), engine));
            }
            (false, true) => {
                warn!("No longer host of room {}", self.client.room_code());
                self.host = None;
            }
            _ => {}
        }

        self.view = Some(view);
        let host = match (self.host.as_mut(), self.view.as_ref()) {
            (Some(driver), Some(view)) => Some(driver.tick(view, now_ms).await),
            _ => None,
        };
        Ok(SyncOutcome { mirror, host })
    }

    /// Poll until shutdown or until the room disappears. With a
    /// subscription, a snapshot event triggers an immediate poll.
    pub async fn run(
        mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
        mut subscription: Option<RoomSubscription>,
    ) -> Result<Self, TransportError> {
        loop {
            let wait = self.config.poll_interval(self.mirror.in_lobby());

            tokio::select! {
                _ = sleep(wait) => {}
                event = next_event(&mut subscription) => {
                    match event {
                        Some(RoomEvent::Closed) => {
                            info!("Room {} closed", self.client.room_code());
                            return Ok(self);
                        }
                        Some(event) => debug!("Push: {:?}", event),
                        None => {
                            debug!("Push channel gone, polling only");
                            subscription = None;
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    return Ok(self);
                }
            }

            match self.poll_once(now_ms()).await {
                Ok(SyncOutcome { host: Some(Err(e)), .. }) => {
                    warn!("Host step failed, retrying next poll: {}", e);
                }
                Ok(_) => {}
                Err(e) if e.code() == Some(ErrorCode::NotFound) => {
                    warn!("Room {} is gone", self.client.room_code());
                    return Err(e);
                }
                Err(e) if e.is_transient() => {
                    debug!("Poll failed, keeping previous state: {}", e);
                }
                Err(e) => {
                    warn!("Poll rejected: {}", e);
                }
            }
        }
    }
}

/// Next pushed event; pending forever without a subscription.
async fn next_event(subscription: &mut Option<RoomSubscription>) -> Option<RoomEvent> {
    match subscription {
        Some(sub) => sub.next_event().await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use werewolf::game::settings::GameSettings;
    use werewolf::game::state::{GameState, Phase};
    use werewolf::network::registry::RoomRegistry;
    use werewolf::network::room::NightActionKind;
    use crate::transport::{FlakyTransport, LocalTransport, RoomTransport};

    struct Room {
        registry: Arc<RoomRegistry>,
        loops: Vec<SyncLoop>,
        net: Arc<FlakyTransport>,
    }

    /// Five devices; device 0 hosts.
    async fn room() -> Room {
        let registry = Arc::new(RoomRegistry::default());
        let net = Arc::new(FlakyTransport::new(LocalTransport::new(registry.clone())));
        let transport: Arc<dyn RoomTransport> = net.clone();
        let config = ClientConfig::default();

        let (host, _) = RoomClient::create(transport.clone(), "d0", "Alice", None).await.unwrap();
        let mut loops = Vec::new();
        for (i, name) in ["Bob", "Carol", "Dave", "Erin"].iter().enumerate() {
            let (client, _) = RoomClient::join(
                transport.clone(),
                format!("d{}", i + 1),
                host.room_code(),
                name,
                None,
            )
            .await
            .unwrap();
            loops.push(SyncLoop::new(client, config.clone()));
        }

        let mut engine = GameEngine::with_seed("g1", 7);
        let mut settings = GameSettings::default();
        settings.timers.night_auto_advance = true;
        settings.timers.display_delay_ms = 0;
        engine.update_settings(settings);
        let host_loop = SyncLoop::new(host.clone(), config).with_host(HostDriver::new(host, engine));
        loops.insert(0, host_loop);

        Room { registry, loops, net }
    }

    async fn poll_all(room: &mut Room, now: u64) {
        for device in room.loops.iter_mut() {
            device.poll_once(now).await.unwrap();
        }
    }

    fn phase_of(device: &SyncLoop) -> Option<&'static str> {
        device.mirror().state().map(|s| s.phase.name())
    }

    #[tokio::test]
    async fn test_devices_mirror_host_game() {
        let mut room = room().await;
        poll_all(&mut room, 0).await;
        assert!(room.loops[1].host().is_none());
        assert!(room.loops[1].mirror().state().is_none());

        let roster = room.loops[0].view().unwrap().players.clone();
        assert!(room.loops[0].host_mut().unwrap().start(&roster, 0).await.unwrap());
        poll_all(&mut room, 1).await;
        for device in &room.loops {
            assert_eq!(phase_of(device), Some("RoleAssignment"));
        }

        // Everyone acknowledges their role; the host's next poll opens the night
        for device in &room.loops {
            device.client.mark_role_revealed().await.unwrap();
        }
        let outcome = room.loops[0].poll_once(2).await.unwrap();
        assert_eq!(
            outcome.host.unwrap().unwrap(),
            HostStep::Advanced { from: "RoleAssignment", to: "NightStart" }
        );
        poll_all(&mut room, 3).await;
        assert!(room.loops.iter().all(|d| phase_of(d) == Some("NightStart")));

        // Wolves pick a villager-side target, everyone finishes the night
        let state = room.loops[1].mirror().state().unwrap().clone();
        let wolf = state.players.iter().position(|p| p.is_alive_wolf()).unwrap();
        let victim = state.players.iter().find(|p| !p.is_alive_wolf()).unwrap().id.clone();
        room.loops[wolf].client
            .submit_night_action(None, NightActionKind::Kill, Some(victim.clone()))
            .await
            .unwrap();
        for device in &room.loops {
            device.client.mark_night_action_complete().await.unwrap();
        }
        poll_all(&mut room, 4).await;
        poll_all(&mut room, 5).await;

        for device in &room.loops[1..] {
            let mirrored = device.mirror().state().unwrap();
            assert!(!mirrored.player(&victim).unwrap().alive);
            assert!(matches!(mirrored.phase, Phase::DayStart { .. } | Phase::Discussion { .. }));
        }
        // Every mirror holds exactly what the host pushed
        let host_version = room.loops[0].host().unwrap().engine().state().version;
        poll_all(&mut room, 5).await;
        assert!(room.loops.iter().all(|d| d.mirror().version() == Some(host_version)));
    }

    #[tokio::test]
    async fn test_host_transfer_promotes_next_player() {
        let mut room = room().await;
        poll_all(&mut room, 0).await;
        let roster = room.loops[0].view().unwrap().players.clone();
        room.loops[0].host_mut().unwrap().start(&roster, 0).await.unwrap();
        poll_all(&mut room, 1).await;

        let host = room.loops.remove(0);
        host.client.leave().await.unwrap();

        let outcome = room.loops[0].poll_once(2).await.unwrap();
        assert!(outcome.host.is_some());
        let promoted = room.loops[0].host().unwrap();
        assert_eq!(promoted.engine().phase().name(), "RoleAssignment");
        assert!(room.loops[1].host().is_none());
    }

    #[tokio::test]
    async fn test_run_stops_when_room_is_gone() {
        let mut room = room().await;
        let device = room.loops.remove(1);
        let code = device.client.room_code().clone();
        for other in &room.loops {
            other.client.leave().await.unwrap();
        }
        device.client.leave().await.unwrap();
        assert!(room.registry.get_state(&code).await.is_err());

        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let mut device = device;
        device.config.poll_lobby = Duration::from_millis(5);
        let err = match device.run(shutdown_rx, None).await {
            Ok(_) => panic!("loop outlived its room"),
            Err(err) => err,
        };
        assert_eq!(err.code(), Some(ErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut room = room().await;
        let mut device = room.loops.remove(1);
        device.config.poll_lobby = Duration::from_millis(5);

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(device.run(shutdown_rx, None));
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown_tx.send(()).unwrap();

        let device = handle.await.unwrap().unwrap();
        assert!(device.view().is_some());
        assert!(device.mirror().state().is_none());
    }

    #[tokio::test]
    async fn test_stale_snapshot_not_applied() {
        let mut room = room().await;
        let host = room.loops[0].client.clone();

        let mut state = GameState::new("g9", 1);
        state.version = 10;
        host.update_game_state(state.clone()).await.unwrap();
        room.loops[1].poll_once(0).await.unwrap();
        assert_eq!(room.loops[1].mirror().version(), Some(10));

        state.version = 9;
        assert!(host.update_game_state(state).await.is_err());
        room.loops[1].poll_once(1).await.unwrap();
        assert_eq!(room.loops[1].mirror().version(), Some(10));
    }

    #[tokio::test]
    async fn test_host_step_failure_keeps_poll() {
        let mut room = room().await;
        poll_all(&mut room, 0).await;
        let roster = room.loops[0].view().unwrap().players.clone();
        room.loops[0].host_mut().unwrap().start(&roster, 0).await.unwrap();
        poll_all(&mut room, 1).await;
        for device in &room.loops {
            device.client.mark_role_revealed().await.unwrap();
        }

        room.net.fail_once("update_game_state");
        let outcome = room.loops[0].poll_once(2).await.unwrap();
        assert_eq!(outcome.mirror, MirrorUpdate::Unchanged);
        assert!(matches!(outcome.host, Some(Err(TransportError::Closed))));
        assert!(room.loops[0].view().unwrap().all_roles_revealed);
        assert_eq!(room.loops[0].host().unwrap().engine().phase().name(), "NightStart");

        // The next poll settles the owed push, the one after mirrors it
        let outcome = room.loops[0].poll_once(3).await.unwrap();
        assert_eq!(outcome.host.unwrap().unwrap(), HostStep::Idle);
        poll_all(&mut room, 4).await;
        assert!(room.loops.iter().all(|d| phase_of(d) == Some("NightStart")));
    }
}
