use std::collections::HashMap;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::sync::broadcast;

/// Capacity of a room's realtime channel before slow receivers lag.
const CHANNEL_CAPACITY: usize = 256;

/// The durable row backing one multiplayer session. `room_code` is the
/// primary key and is stored uppercased; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomRow {
    pub room_code: String,
    pub display_name: String,
    pub compressed_state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub player_count: i32,
}

/// The hosted backend, seen from a client: an opaque key-value row store
/// with realtime publish/subscribe per room. Implementations tolerate
/// concurrent writers with last-write-wins at the row level; there is no
/// transactional locking.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn create_room(&self, row: RoomRow) -> Result<()>;
    async fn load_room(&self, room_code: &str) -> Result<Option<RoomRow>>;
    async fn update_state(&self, room_code: &str, compressed_state: String) -> Result<()>;
    async fn set_player_count(&self, room_code: &str, count: i32) -> Result<()>;
    async fn room_exists(&self, room_code: &str) -> Result<bool>;

    /// Broadcast a wire payload to every subscriber of the room.
    async fn publish_action(&self, room_code: &str, payload: String) -> Result<()>;

    /// Subscribe to the room's realtime channel. Payloads published while a
    /// receiver is not being drained are buffered up to channel capacity.
    async fn subscribe(&self, room_code: &str) -> Result<broadcast::Receiver<String>>;
}

/// In-memory reference implementation of [`RowStore`], also the test double.
#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, RoomRow>>,
    channels: RwLock<HashMap<String, broadcast::Sender<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    fn key(room_code: &str) -> String {
        room_code.trim().to_ascii_uppercase()
    }

    async fn sender(&self, room_code: &str) -> broadcast::Sender<String> {
        let key = Self::key(room_code);
        let mut channels = self.channels.write().await;
        channels
            .entry(key)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn create_room(&self, mut row: RoomRow) -> Result<()> {
        let key = Self::key(&row.room_code);
        row.room_code = key.clone();
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&key) {
            bail!("room {key} already exists");
        }
        rooms.insert(key, row);
        Ok(())
    }

    async fn load_room(&self, room_code: &str) -> Result<Option<RoomRow>> {
        Ok(self.rooms.read().await.get(&Self::key(room_code)).cloned())
    }

    async fn update_state(&self, room_code: &str, compressed_state: String) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(&Self::key(room_code)) {
            Some(row) => {
                // Last write wins, matching the real backend's row semantics.
                row.compressed_state = compressed_state;
                row.updated_at = Utc::now();
                Ok(())
            }
            None => bail!("room {room_code} not found"),
        }
    }

    async fn set_player_count(&self, room_code: &str, count: i32) -> Result<()> {
        let mut rooms = self.rooms.write().await;
        match rooms.get_mut(&Self::key(room_code)) {
            Some(row) => {
                row.player_count = count;
                row.updated_at = Utc::now();
                Ok(())
            }
            None => bail!("room {room_code} not found"),
        }
    }

    async fn room_exists(&self, room_code: &str) -> Result<bool> {
        Ok(self.rooms.read().await.contains_key(&Self::key(room_code)))
    }

    async fn publish_action(&self, room_code: &str, payload: String) -> Result<()> {
        // A send error only means no subscriber is listening right now.
        let _ = self.sender(room_code).await.send(payload);
        Ok(())
    }

    async fn subscribe(&self, room_code: &str) -> Result<broadcast::Receiver<String>> {
        Ok(self.sender(room_code).await.subscribe())
    }
}
