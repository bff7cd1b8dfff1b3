use actix::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::clock::ClockInfo;
use crate::models::types::{ChatMessage, LobbyGame, LobbyPlayer, Seek, SeekColor, TimeControl};

/// Actions a connection may take while in the lobby.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind")]
pub enum LobbyAction {
    MakeSeek {
        color: SeekColor,
        time_white: TimeControl,
        time_black: TimeControl,
        #[serde(default)]
        opponent: String,
    },
    DeleteSeek {
        id: u32,
    },
    AcceptSeek {
        id: u32,
    },
    ChatAction {
        message: String,
    },
    WatchGame {
        id: u32,
    },
    WatchPlayer {
        name: String,
    },
}

/// Actions a connection may take while in a game room.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind")]
pub enum GameAction {
    MakeMove {
        #[serde(rename = "move")]
        mv: String,
    },
    ChatAction { message: String },
    Resign,
    OfferDraw,
    AcceptDraw,
    DeclineDraw,
    ClaimDraw,
    ExitGame,
    Rematch,
}

/// One inbound JSON frame. The `scope` tag routes the frame; the flattened
/// action carries its own `kind` tag, so a game move reads
/// `{"scope":"game","kind":"MakeMove","move":"e2e4"}`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "scope", rename_all = "lowercase")]
pub enum ClientFrame {
    Join {
        name: String,
    },
    Lobby {
        #[serde(flatten)]
        action: LobbyAction,
    },
    Game {
        #[serde(flatten)]
        action: GameAction,
    },
}

/// Deltas broadcast to lobby subscribers, one per lobby mutation.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind")]
pub enum LobbyEvent {
    AddSeek { seek: Seek },
    RemoveSeek { id: u32 },
    UpdateGame { game: LobbyGame },
    UpdatePlayer { player: LobbyPlayer },
    ChatEvent { message: ChatMessage },
}

/// Deltas broadcast within a game room.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind")]
pub enum GameEvent {
    PerformMove {
        #[serde(rename = "move")]
        mv: String,
        color: String,
        timestamp: u64,
    },
    ChatEvent {
        message: ChatMessage,
    },
    DrawOffered {
        player: String,
    },
    GameEnd,
}

/// Full lobby snapshot sent on entering the lobby, with seeks already
/// filtered to what the receiving connection may see.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LobbyState {
    pub seeks: Vec<Seek>,
    pub games: Vec<LobbyGame>,
    pub players: Vec<LobbyPlayer>,
    pub chat: Vec<ChatMessage>,
}

/// Wire form of a session clock.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClockState {
    pub white: TimeControl,
    pub black: TimeControl,
    pub timeleft: Vec<u64>,
}

impl From<&ClockInfo> for ClockState {
    fn from(clock: &ClockInfo) -> Self {
        ClockState {
            white: clock.white,
            black: clock.black,
            timeleft: clock.timeleft.clone(),
        }
    }
}

/// Full session snapshot sent on entering a game room. `chat` is the player
/// stream for participants and the spectator stream for everyone else.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GameSnapshot {
    pub id: u32,
    pub white: String,
    pub black: String,
    pub moves: Vec<String>,
    pub chat: Vec<ChatMessage>,
    pub draw_offer: String,
    pub ended: bool,
    pub clock: ClockState,
}

/// One outbound JSON frame.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "kind")]
pub enum ServerFrame {
    JoinLobby { state: LobbyState },
    JoinGame { state: GameSnapshot },
    LobbyEvent { event: LobbyEvent },
    GameEvent { event: GameEvent },
}

/// Serialized frame pushed to a connection actor.
#[derive(Message)]
#[rtype(result = "()")]
pub struct WsFrame(pub String);

/// A connection identified itself. Answered `false` when the name is already
/// bound to a live connection, in which case the new socket must close.
#[derive(Message)]
#[rtype(result = "bool")]
pub struct Connect {
    pub name: String,
    pub conn_id: Uuid,
    pub addr: Recipient<WsFrame>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub name: String,
    pub conn_id: Uuid,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct LobbyMsg {
    pub name: String,
    pub conn_id: Uuid,
    pub action: LobbyAction,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct GameMsg {
    pub name: String,
    pub conn_id: Uuid,
    pub action: GameAction,
}
