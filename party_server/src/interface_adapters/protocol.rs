// Wire protocol DTOs and conversions for bus payloads.
// Field names are camelCase on the wire; party states travel as integers.

use crate::domain::{
    CircuitConfig, Competitor, PartyState, Player, PlayerInput, PlayerPosition, StateChange,
    SyncSnapshot, Vec2,
};
use crate::use_cases::PartySnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointDto {
    pub x: f64,
    pub y: f64,
}

impl From<Vec2> for PointDto {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitConfigDto {
    #[serde(default)]
    pub seed: i64,
    pub min_point: usize,
    pub max_point: usize,
    pub x_size: f64,
    pub y_size: f64,
}

impl From<&CircuitConfig> for CircuitConfigDto {
    fn from(config: &CircuitConfig) -> Self {
        Self {
            seed: config.seed,
            min_point: config.min_point,
            max_point: config.max_point,
            x_size: config.x_size,
            y_size: config.y_size,
        }
    }
}

impl From<CircuitConfigDto> for CircuitConfig {
    fn from(dto: CircuitConfigDto) -> Self {
        Self {
            seed: dto.seed,
            min_point: dto.min_point,
            max_point: dto.max_point,
            x_size: dto.x_size,
            y_size: dto.y_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerPositionDto {
    pub speed: f64,
    pub angle: f64,
    pub position: PointDto,
}

impl From<&PlayerPosition> for PlayerPositionDto {
    fn from(p: &PlayerPosition) -> Self {
        Self {
            speed: p.speed,
            angle: p.angle,
            position: p.position.into(),
        }
    }
}

/// Control sample sent by a client on `party.{p}.input`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInputDto {
    #[serde(default)]
    pub acceleration: f64,
    #[serde(default)]
    pub turning: f64,
    #[serde(default)]
    pub message_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub player_uuid: Uuid,
}

impl PlayerInputDto {
    fn from_player(player: &Player) -> Self {
        Self {
            acceleration: player.input.acceleration,
            turning: player.input.turning,
            message_number: player.input.message_number,
            timestamp: player.input.timestamp.clone(),
            player_uuid: player.uuid,
        }
    }
}

impl From<PlayerInputDto> for PlayerInput {
    fn from(dto: PlayerInputDto) -> Self {
        Self {
            acceleration: dto.acceleration,
            turning: dto.turning,
            message_number: dto.message_number,
            timestamp: dto.timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDto {
    pub uuid: Uuid,
    pub name: String,
    pub position: PlayerPositionDto,
    pub input: PlayerInputDto,
}

impl From<&Player> for PlayerDto {
    fn from(player: &Player) -> Self {
        Self {
            uuid: player.uuid,
            name: player.name.clone(),
            position: (&player.position).into(),
            input: PlayerInputDto::from_player(player),
        }
    }
}

/// Full party sent to a joining player and to the owner at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyDto {
    pub uuid: Uuid,
    pub name: String,
    pub party_state: i32,
    pub track: Vec<PointDto>,
    pub circuit_config: CircuitConfigDto,
    pub players: Vec<PlayerDto>,
}

impl From<&PartySnapshot> for PartyDto {
    fn from(party: &PartySnapshot) -> Self {
        Self {
            uuid: party.uuid,
            name: party.name.clone(),
            party_state: party.state.code(),
            track: party.track.points().iter().map(|p| PointDto::from(*p)).collect(),
            circuit_config: (&party.circuit).into(),
            players: party.players.iter().map(PlayerDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorDto {
    pub name: String,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainActorDto {
    pub actor: ActorDto,
    pub player: PlayerDto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorDto {
    pub actor: ActorDto,
    pub uuid: Uuid,
    pub position: PlayerPositionDto,
}

impl From<&Competitor> for CompetitorDto {
    fn from(c: &Competitor) -> Self {
        Self {
            actor: ActorDto {
                name: c.name.clone(),
                rank: c.rank,
            },
            uuid: c.uuid,
            position: (&c.position).into(),
        }
    }
}

/// Per-player state pushed every tick on `party.{p}.sync.{u}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPayloadDto {
    pub party_state: i32,
    pub main_actor: MainActorDto,
    pub competitors: Vec<CompetitorDto>,
}

impl From<&SyncSnapshot> for SyncPayloadDto {
    fn from(snapshot: &SyncSnapshot) -> Self {
        Self {
            party_state: snapshot.state.code(),
            main_actor: MainActorDto {
                actor: ActorDto {
                    name: snapshot.main.name.clone(),
                    rank: snapshot.rank,
                },
                player: (&snapshot.main).into(),
            },
            competitors: snapshot.competitors.iter().map(CompetitorDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateChangeAckDto {
    pub party_id: Uuid,
    pub desired_state: i32,
    pub new_state: i32,
    pub message: String,
}

impl StateChangeAckDto {
    pub fn new(party_id: Uuid, change: StateChange) -> Self {
        Self {
            party_id,
            desired_state: change.desired.code(),
            new_state: change.current.code(),
            message: "OK".to_string(),
        }
    }
}

/// Identifies the requesting player for add-player and sync requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerTokenDto {
    pub client_id: Uuid,
    pub party_id: Uuid,
    /// Explicit reply address; overrides the per-player suffix convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStateTokenDto {
    pub player_token: PlayerTokenDto,
    pub desired_state: i32,
}

/// Generic failure reply published on the un-suffixed canonical topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub error_message: String,
}

/// The four request topics a party listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    AddPlayer,
    ChangeState,
    Sync,
    Input,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestKind::AddPlayer => "addPlayer",
            RequestKind::ChangeState => "state",
            RequestKind::Sync => "sync",
            RequestKind::Input => "input",
        };
        f.write_str(name)
    }
}

/// A request decoded according to the topic it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    AddPlayer(PlayerTokenDto),
    ChangeState {
        token: PlayerTokenDto,
        desired: PartyState,
    },
    Sync(PlayerTokenDto),
    Input {
        player_id: Uuid,
        input: PlayerInput,
    },
    /// An error reply seen on a shared topic; never answered.
    Error(ErrorEnvelope),
}

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    UnknownState(i32),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Json(e) => write!(f, "malformed payload: {e}"),
            DecodeError::UnknownState(code) => write!(f, "unknown party state {code}"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e)
    }
}

impl InboundMessage {
    pub fn decode(kind: RequestKind, payload: &str) -> Result<Self, DecodeError> {
        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(payload) {
            return Ok(InboundMessage::Error(envelope));
        }

        let message = match kind {
            RequestKind::AddPlayer => InboundMessage::AddPlayer(serde_json::from_str(payload)?),
            RequestKind::ChangeState => {
                let token: ChangeStateTokenDto = serde_json::from_str(payload)?;
                let desired = PartyState::from_code(token.desired_state)
                    .ok_or(DecodeError::UnknownState(token.desired_state))?;
                InboundMessage::ChangeState {
                    token: token.player_token,
                    desired,
                }
            }
            RequestKind::Sync => InboundMessage::Sync(serde_json::from_str(payload)?),
            RequestKind::Input => {
                let dto: PlayerInputDto = serde_json::from_str(payload)?;
                InboundMessage::Input {
                    player_id: dto.player_uuid,
                    input: dto.into(),
                }
            }
        };
        Ok(message)
    }
}
