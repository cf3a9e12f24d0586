use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use client::{RoomError, RoomManager, RoomRow, RowStore, MemoryStore, normalize_room_code};
use common::{Action, GameState, GridPos, PlaceItem, ROOM_CODE_LEN};

#[tokio::test]
async fn create_then_load_round_trips_the_state() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();

    let store = Arc::new(MemoryStore::new());
    let rooms = RoomManager::new(store.clone());

    let mut state = GameState::new(10);
    state.apply(&Action::Place { pos: GridPos::new(1, 1), item: PlaceItem::Path });
    state.resources.cash = 1234;

    let code = rooms.create_room("Sunny Acres", &state).await?;
    assert_eq!(code.len(), ROOM_CODE_LEN);
    assert_eq!(code, code.to_ascii_uppercase());

    let loaded = rooms.load_room(&code).await?;
    assert_eq!(loaded, state);

    let row = store.load_room(&code).await?.expect("row should exist");
    assert_eq!(row.display_name, "Sunny Acres");
    assert_eq!(row.player_count, 1);
    Ok(())
}

#[tokio::test]
async fn lookups_are_case_insensitive() -> Result<()> {
    let rooms = RoomManager::new(Arc::new(MemoryStore::new()));
    let state = GameState::new(5);
    let code = rooms.create_room("Park", &state).await?;

    assert!(rooms.room_exists(&code.to_ascii_lowercase()).await?);
    let loaded = rooms.load_room(&format!("  {}  ", code.to_ascii_lowercase())).await?;
    assert_eq!(loaded, state);
    assert_eq!(normalize_room_code(" abc123 "), "ABC123");
    Ok(())
}

#[tokio::test]
async fn missing_room_is_unavailable() {
    let rooms = RoomManager::new(Arc::new(MemoryStore::new()));
    match rooms.load_room("ZZZZZZ").await {
        Err(RoomError::Unavailable(code)) => assert_eq!(code, "ZZZZZZ"),
        other => panic!("expected Unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn corrupt_payload_is_unavailable_not_a_crash() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let now = Utc::now();
    store
        .create_room(RoomRow {
            room_code: "BADROW".into(),
            display_name: "Corrupt".into(),
            compressed_state: "definitely not gzip".into(),
            created_at: now,
            updated_at: now,
            player_count: 0,
        })
        .await?;

    let rooms = RoomManager::new(store);
    assert!(matches!(
        rooms.load_room("badrow").await,
        Err(RoomError::Unavailable(_))
    ));
    Ok(())
}

#[tokio::test]
async fn save_room_overwrites_the_snapshot() -> Result<()> {
    let rooms = RoomManager::new(Arc::new(MemoryStore::new()));
    let mut state = GameState::new(8);
    let code = rooms.create_room("Park", &state).await?;

    state.apply(&Action::SetSpeed { speed: 2 });
    rooms.save_room(&code, &state).await?;
    assert_eq!(rooms.load_room(&code).await?.speed, 2);
    Ok(())
}

#[tokio::test]
async fn player_count_updates_never_surface_failures() {
    let rooms = RoomManager::new(Arc::new(MemoryStore::new()));
    // No such room: logged, swallowed, gameplay uninterrupted.
    rooms.set_player_count("NOROOM", 3).await;
}
