use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::{
    Action, ActionEnvelope, BASE_TICK_INTERVAL_MS, CHECKPOINT_INTERVAL_MS, GameState,
};

use crate::codec::CodecError;
use crate::room::{RoomError, RoomManager, normalize_room_code};
use crate::store::RowStore;

/// How many envelopes the display log retains.
const RECENT_LOG_CAP: usize = 64;

/// Connection lifecycle of one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Disconnected,
    Joining,
    Synced,
    Reconciling,
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// An unrecognized action type on the wire. Protocol drift between
    /// client versions must surface, not vanish: production callers log and
    /// continue, tests assert on it.
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Room(#[from] RoomError),
    #[error("not connected to a room")]
    NotConnected,
}

/// One client's view of a co-edited world.
///
/// Owns the local [`GameState`] outright: every mutation (local dispatch,
/// remote apply, simulation tick) goes through `&mut self`, so a tick can
/// never observe a half-applied action.
///
/// Local actions apply optimistically before they are broadcast; remote
/// actions apply in arrival order. Cross-client ordering is therefore
/// best-effort, not linearizable: on a true collision the last arrival wins.
/// That trade-off is deliberate (small trusted group, authoritative snapshot
/// as the backstop), and anything needing stronger merging would replace
/// this type without touching the pathfinder, validator, or codec.
pub struct SyncClient {
    rooms: RoomManager,
    player_id: String,
    phase: SyncPhase,
    room_code: Option<String>,
    is_host: bool,
    state: GameState,
    rx: Option<broadcast::Receiver<String>>,
    /// Local input issued while a join is still loading the snapshot.
    queued: VecDeque<Action>,
    last_issued_ts: i64,
    recent: Vec<ActionEnvelope>,
    /// Every player id observed on the wire, ourselves included.
    peers: BTreeSet<String>,
    sim_anchor_ms: Option<i64>,
    sim_accum_ms: i64,
    last_checkpoint_ms: i64,
}

impl SyncClient {
    /// A disconnected client playing on purely local state.
    pub fn new(store: Arc<dyn RowStore>, state: GameState) -> Self {
        let player_id = Uuid::new_v4().to_string();
        SyncClient {
            rooms: RoomManager::new(store),
            peers: BTreeSet::from([player_id.clone()]),
            player_id,
            phase: SyncPhase::Disconnected,
            room_code: None,
            is_host: false,
            state,
            rx: None,
            queued: VecDeque::new(),
            last_issued_ts: 0,
            recent: Vec::new(),
            sim_anchor_ms: None,
            sim_accum_ms: 0,
            last_checkpoint_ms: 0,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn player_id(&self) -> &str {
        &self.player_id
    }

    pub fn is_host(&self) -> bool {
        self.is_host
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    /// Recent envelopes ordered by the `(timestamp, playerId)` key. Display
    /// only; application order is never revised to match it.
    pub fn recent_actions(&self) -> &[ActionEnvelope] {
        &self.recent
    }

    /// Player ids observed in this room so far, ourselves included.
    pub fn roster(&self) -> &BTreeSet<String> {
        &self.peers
    }

    /// Create a room seeded with the local state and become its host.
    pub async fn host_room(&mut self, display_name: &str) -> Result<String, SyncError> {
        let code = self.rooms.create_room(display_name, &self.state).await?;
        let rx = self
            .rooms
            .store()
            .subscribe(&code)
            .await
            .map_err(|e| RoomError::Store(e.into()))?;
        self.rx = Some(rx);
        self.room_code = Some(code.clone());
        self.is_host = true;
        self.phase = SyncPhase::Synced;
        info!("hosting room {}", code);
        Ok(code)
    }

    /// Join an existing room, replacing local state with its authoritative
    /// snapshot.
    ///
    /// Until the snapshot is loaded the client is `Joining` and local input
    /// queues instead of applying. The in-flight load is discardable: no
    /// committed local state is touched until the snapshot has fully
    /// decoded, so dropping this future mid-way (user navigated off) leaves
    /// the client consistent.
    pub async fn join_room(&mut self, room_code: &str) -> Result<(), SyncError> {
        let code = normalize_room_code(room_code);
        self.phase = SyncPhase::Joining;

        // Subscribe before loading: actions broadcast during the load sit in
        // the channel and are applied on the first pump.
        let rx = self
            .rooms
            .store()
            .subscribe(&code)
            .await
            .map_err(|e| RoomError::Store(e.into()))?;
        let snapshot = match self.rooms.load_room(&code).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Degrade to local-only play.
                self.phase = SyncPhase::Disconnected;
                self.queued.clear();
                return Err(e.into());
            }
        };

        self.state = snapshot;
        self.rx = Some(rx);
        self.room_code = Some(code.clone());
        self.is_host = false;
        self.phase = SyncPhase::Synced;
        info!("joined room {} as {}", code, self.player_id);

        // Input issued during the load now applies in issue order.
        while let Some(action) = self.queued.pop_front() {
            self.dispatch(action).await?;
        }
        Ok(())
    }

    pub async fn leave(&mut self) {
        if let Some(code) = self.room_code.take() {
            info!("leaving room {}", code);
        }
        self.rx = None;
        self.is_host = false;
        self.queued.clear();
        self.peers = BTreeSet::from([self.player_id.clone()]);
        self.phase = SyncPhase::Disconnected;
    }

    /// Apply a local action optimistically and broadcast it.
    ///
    /// The local copy mutates immediately, with zero network round-trip for
    /// the issuing player. Broadcast failure degrades to local-only play and is
    /// logged, not surfaced.
    pub async fn dispatch(&mut self, action: Action) -> Result<(), SyncError> {
        match self.phase {
            SyncPhase::Joining => {
                self.queued.push_back(action);
                return Ok(());
            }
            SyncPhase::Disconnected => {
                self.state.apply(&action);
                return Ok(());
            }
            SyncPhase::Synced | SyncPhase::Reconciling => {}
        }

        self.state.apply(&action);
        let envelope = ActionEnvelope {
            action,
            timestamp_ms: self.next_timestamp(),
            player_id: self.player_id.clone(),
        };
        self.remember(envelope.clone());

        let code = self.room_code.clone().ok_or(SyncError::NotConnected)?;
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| SyncError::Protocol(e.to_string()))?;
        if let Err(e) = self.rooms.store().publish_action(&code, payload).await {
            warn!("broadcast failed, continuing locally: {}", e);
        }
        Ok(())
    }

    /// Monotonic local timestamp: wall clock, bumped when the clock has not
    /// advanced since the last issue.
    fn next_timestamp(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        self.last_issued_ts = now.max(self.last_issued_ts + 1);
        self.last_issued_ts
    }

    /// Drain the realtime channel, applying remote envelopes in arrival
    /// order. Returns how many were applied.
    ///
    /// A payload with an unrecognized action type stops the drain with
    /// `SyncError::Protocol`; the offending message is consumed, so calling
    /// `pump` again continues with the rest.
    pub fn pump(&mut self) -> Result<usize, SyncError> {
        let mut applied = 0;
        loop {
            let received = match self.rx.as_mut() {
                Some(rx) => rx.try_recv(),
                None => return Ok(applied),
            };
            match received {
                Ok(payload) => {
                    if self.handle_wire(&payload)? {
                        applied += 1;
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => break,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("realtime channel lagged, {} envelopes dropped", n);
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    warn!("realtime channel closed");
                    self.rx = None;
                    break;
                }
            }
        }
        Ok(applied)
    }

    fn handle_wire(&mut self, payload: &str) -> Result<bool, SyncError> {
        let envelope: ActionEnvelope = serde_json::from_str(payload).map_err(|_| {
            // Name the offending tag when there is one.
            let tag = serde_json::from_str::<serde_json::Value>(payload)
                .ok()
                .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(String::from));
            match tag {
                Some(tag) => SyncError::Protocol(format!("unrecognized action type '{tag}'")),
                None => SyncError::Protocol("malformed wire payload".to_string()),
            }
        })?;

        self.peers.insert(envelope.player_id.clone());

        // Our own broadcast coming back: already applied optimistically.
        if envelope.player_id == self.player_id {
            return Ok(false);
        }

        if let Action::FullState { .. } = envelope.action {
            // Swap states under a momentary Reconciling phase.
            self.phase = SyncPhase::Reconciling;
            self.state.apply(&envelope.action);
            self.phase = SyncPhase::Synced;
            debug!("reconciled to full state from {}", envelope.player_id);
        } else {
            self.state.apply(&envelope.action);
        }
        self.remember(envelope);
        Ok(true)
    }

    fn remember(&mut self, envelope: ActionEnvelope) {
        // Full-state payloads are resync plumbing, not player history.
        if matches!(envelope.action, Action::FullState { .. }) {
            return;
        }
        self.recent.push(envelope);
        self.recent.sort();
        if self.recent.len() > RECENT_LOG_CAP {
            let excess = self.recent.len() - RECENT_LOG_CAP;
            self.recent.drain(..excess);
        }
    }

    /// Publish the entire local state as a `fullState` envelope: periodic
    /// host-authoritative resync for already-connected peers.
    pub async fn broadcast_full_state(&mut self) -> Result<(), SyncError> {
        let code = self.room_code.clone().ok_or(SyncError::NotConnected)?;
        let envelope = ActionEnvelope {
            action: Action::FullState { state: Box::new(self.state.clone()) },
            timestamp_ms: self.next_timestamp(),
            player_id: self.player_id.clone(),
        };
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| SyncError::Protocol(e.to_string()))?;
        self.rooms
            .store()
            .publish_action(&code, payload)
            .await
            .map_err(|e| RoomError::Store(e.into()))?;
        Ok(())
    }

    /// Advance the simulated clock to `now_ms`. The effective rate is the
    /// base tick rate times the speed multiplier; speed 0 halts simulated
    /// time entirely, it does not merely stop rendering.
    pub fn run_until(&mut self, now_ms: i64) {
        let Some(anchor) = self.sim_anchor_ms else {
            self.sim_anchor_ms = Some(now_ms);
            return;
        };
        let elapsed = (now_ms - anchor).max(0);
        self.sim_anchor_ms = Some(now_ms);

        self.sim_accum_ms += elapsed * self.state.speed as i64;
        let hours = drain_whole_hours(&mut self.sim_accum_ms);
        if hours > 0 {
            self.state.advance_hours(hours);
        }
    }

    /// Whether the host should write its periodic checkpoint.
    pub fn checkpoint_due(&self, now_ms: i64) -> bool {
        self.is_host
            && self.phase == SyncPhase::Synced
            && now_ms - self.last_checkpoint_ms >= CHECKPOINT_INTERVAL_MS
    }

    /// Serialize the full state through the codec and overwrite the room's
    /// authoritative snapshot. Out-of-band from the action stream: this is a
    /// checkpoint for late joiners and crash recovery, not how live clients
    /// stay in sync.
    pub async fn write_checkpoint(&mut self, now_ms: i64) -> Result<(), SyncError> {
        let code = self.room_code.clone().ok_or(SyncError::NotConnected)?;
        self.rooms.save_room(&code, &self.state).await?;
        self.last_checkpoint_ms = now_ms;
        debug!("checkpoint written for room {}", code);
        Ok(())
    }

    /// Best-effort presence update for the room row.
    pub async fn report_player_count(&self, count: i32) {
        if let Some(code) = &self.room_code {
            self.rooms.set_player_count(code, count).await;
        }
    }
}

/// Whole simulated hours banked in the accumulator, capped at what a single
/// `advance_hours` call can take. Hours past the cap stay banked for the next
/// tick rather than being lost to truncation.
fn drain_whole_hours(accum_ms: &mut i64) -> u32 {
    let hours = (*accum_ms / BASE_TICK_INTERVAL_MS).min(u32::MAX as i64);
    *accum_ms -= hours * BASE_TICK_INTERVAL_MS;
    hours as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn local_client(speed: u8) -> SyncClient {
        let mut state = GameState::new(5);
        state.speed = speed;
        state.settings.guests_enabled = false;
        SyncClient::new(Arc::new(MemoryStore::new()), state)
    }

    #[test]
    fn paused_speed_freezes_simulated_time() {
        let mut client = local_client(0);
        let start = client.state().clock;
        client.run_until(0);
        client.run_until(10 * BASE_TICK_INTERVAL_MS);
        assert_eq!(client.state().clock, start);
    }

    #[test]
    fn speed_multiplies_tick_rate() {
        let mut client = local_client(3);
        let start_hour = client.state().clock.hour;
        client.run_until(0);
        client.run_until(2 * BASE_TICK_INTERVAL_MS);
        // Two base intervals at 3x yields six simulated hours.
        assert_eq!(client.state().clock.hour, start_hour + 6);
    }

    #[test]
    fn clock_jump_past_hour_cap_banks_the_excess() {
        let mut accum = (u32::MAX as i64 + 10) * BASE_TICK_INTERVAL_MS + 3;
        assert_eq!(drain_whole_hours(&mut accum), u32::MAX);
        assert_eq!(accum, 10 * BASE_TICK_INTERVAL_MS + 3);
        assert_eq!(drain_whole_hours(&mut accum), 10);
        assert_eq!(accum, 3);
    }

    #[test]
    fn fractional_ticks_accumulate() {
        let mut client = local_client(1);
        client.run_until(0);
        client.run_until(BASE_TICK_INTERVAL_MS / 2);
        let mid = client.state().clock;
        client.run_until(BASE_TICK_INTERVAL_MS);
        assert_eq!(client.state().clock.hour, mid.hour + 1);
    }
}
