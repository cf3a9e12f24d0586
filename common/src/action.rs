use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::grid::{BuildingKind, GridPos};
use crate::state::{GameState, ParkSettingsPatch};
use crate::track::TrackPiece;

/// What a `place` action puts on a tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaceItem {
    Path,
    Building(BuildingKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub pos: GridPos,
    pub item: PlaceItem,
}

/// The closed action vocabulary exchanged between clients.
///
/// Internally tagged with `type` on the wire, so an unrecognized tag fails
/// deserialization outright instead of being silently ignored; protocol
/// drift between client versions must be detectable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Place { pos: GridPos, item: PlaceItem },
    PlaceBatch { tiles: Vec<Placement> },
    Bulldoze { pos: GridPos },
    SetSpeed { speed: u8 },
    SetParkSettings { patch: ParkSettingsPatch },
    PlaceTrackLine { pieces: Vec<TrackPiece> },
    FullState { state: Box<GameState> },
}

/// An action plus its origin, as it travels on the wire:
/// `{ type, ...fields, timestamp, playerId }`.
///
/// Immutable once created. The `(timestamp, playerId)` key orders envelopes
/// deterministically for display; it is not used for replay or rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    #[serde(flatten)]
    pub action: Action,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    #[serde(rename = "playerId")]
    pub player_id: String,
}

impl Ord for ActionEnvelope {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp_ms
            .cmp(&other.timestamp_ms)
            .then_with(|| self.player_id.cmp(&other.player_id))
    }
}

impl PartialOrd for ActionEnvelope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_flat_and_tagged() {
        let envelope = ActionEnvelope {
            action: Action::SetSpeed { speed: 2 },
            timestamp_ms: 1700000000000,
            player_id: "p1".into(),
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["type"], "setSpeed");
        assert_eq!(json["speed"], 2);
        assert_eq!(json["timestamp"], 1700000000000i64);
        assert_eq!(json["playerId"], "p1");

        let back: ActionEnvelope = serde_json::from_value(json).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn unknown_action_type_fails_to_parse() {
        let raw = r#"{"type":"teleport","pos":{"x":0,"y":0},"timestamp":1,"playerId":"p1"}"#;
        assert!(serde_json::from_str::<ActionEnvelope>(raw).is_err());
    }

    #[test]
    fn ordering_key_breaks_ties_by_player_id() {
        let a = ActionEnvelope {
            action: Action::SetSpeed { speed: 1 },
            timestamp_ms: 10,
            player_id: "alice".into(),
        };
        let b = ActionEnvelope {
            action: Action::SetSpeed { speed: 2 },
            timestamp_ms: 10,
            player_id: "bob".into(),
        };
        let c = ActionEnvelope {
            action: Action::SetSpeed { speed: 3 },
            timestamp_ms: 9,
            player_id: "zed".into(),
        };
        let mut envelopes = vec![b.clone(), a.clone(), c.clone()];
        envelopes.sort();
        assert_eq!(envelopes, vec![c, a, b]);
    }
}
