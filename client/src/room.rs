use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use thiserror::Error;
use tracing::{debug, warn};

use common::{GameState, ROOM_CODE_LEN};

use crate::codec::{self, CodecError};
use crate::store::{RoomRow, RowStore};

/// Room-code alphabet, with confusable characters excluded.
const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

const MAX_CODE_ATTEMPTS: usize = 10;

#[derive(Debug, Error)]
pub enum RoomError {
    /// Size-limit and encode failures pass through untouched so callers can
    /// tell an oversized save from a missing room.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Missing row or one whose payload no longer decodes. Callers fall back
    /// to fresh local state rather than crashing.
    #[error("room {0} is unavailable")]
    Unavailable(String),
    #[error("room store error: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

fn store_err(e: anyhow::Error) -> RoomError {
    RoomError::Store(e.into())
}

/// Uppercase, trimmed canonical form of a room code.
pub fn normalize_room_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

/// Room lifecycle over a [`RowStore`]: code generation, create/load/save,
/// and best-effort presence bookkeeping.
pub struct RoomManager {
    store: Arc<dyn RowStore>,
}

impl RoomManager {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        RoomManager { store }
    }

    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    fn random_code() -> String {
        let mut rng = rand::thread_rng();
        (0..ROOM_CODE_LEN)
            .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
            .collect()
    }

    /// Generate a code not currently in use, retrying on collision.
    async fn generate_unique_code(&self) -> Result<String, RoomError> {
        for attempt in 0..MAX_CODE_ATTEMPTS {
            let code = Self::random_code();
            if !self.store.room_exists(&code).await.map_err(store_err)? {
                debug!("generated room code '{}' on attempt {}", code, attempt + 1);
                return Ok(code);
            }
            warn!("room code collision on attempt {}: {}", attempt + 1, code);
        }
        Err(RoomError::Store(
            format!("no unique room code after {MAX_CODE_ATTEMPTS} attempts").into(),
        ))
    }

    /// Encode and size-check the state, then write the new room row. The
    /// size gate runs before any write: an oversized snapshot aborts with
    /// `CodecError::SizeLimit` and leaves the store untouched.
    pub async fn create_room(
        &self,
        display_name: &str,
        state: &GameState,
    ) -> Result<String, RoomError> {
        let compressed = codec::encode_async(state.clone()).await?;
        codec::check_size(&compressed)?;

        let room_code = self.generate_unique_code().await?;
        let now = Utc::now();
        self.store
            .create_room(RoomRow {
                room_code: room_code.clone(),
                display_name: display_name.to_string(),
                compressed_state: compressed,
                created_at: now,
                updated_at: now,
                player_count: 1,
            })
            .await
            .map_err(store_err)?;
        Ok(room_code)
    }

    /// Load and decode a room's snapshot. A missing row and a corrupt
    /// payload are both `Unavailable`: the caller cannot tell them apart and
    /// should not need to.
    pub async fn load_room(&self, room_code: &str) -> Result<GameState, RoomError> {
        let code = normalize_room_code(room_code);
        let row = self
            .store
            .load_room(&code)
            .await
            .map_err(store_err)?
            .ok_or_else(|| RoomError::Unavailable(code.clone()))?;
        codec::decode_async(row.compressed_state).await.map_err(|e| {
            warn!("room {} payload failed to decode: {}", code, e);
            RoomError::Unavailable(code.clone())
        })
    }

    /// Host checkpoint: overwrite the room's authoritative snapshot. Same
    /// size gate as `create_room`.
    pub async fn save_room(&self, room_code: &str, state: &GameState) -> Result<(), RoomError> {
        let code = normalize_room_code(room_code);
        let compressed = codec::encode_async(state.clone()).await?;
        codec::check_size(&compressed)?;
        self.store.update_state(&code, compressed).await.map_err(store_err)
    }

    pub async fn room_exists(&self, room_code: &str) -> Result<bool, RoomError> {
        self.store
            .room_exists(&normalize_room_code(room_code))
            .await
            .map_err(store_err)
    }

    /// Best-effort presence update. Failures only affect a presence
    /// indicator, so they are logged and swallowed.
    pub async fn set_player_count(&self, room_code: &str, count: i32) {
        let code = normalize_room_code(room_code);
        if let Err(e) = self.store.set_player_count(&code, count).await {
            warn!("player count update for {} failed: {}", code, e);
        }
    }
}
