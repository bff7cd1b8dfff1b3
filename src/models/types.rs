use serde::{Deserialize, Serialize};

/// Color preference attached to a seek. `Random` is resolved by a coin flip
/// when the seek is accepted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekColor {
    White,
    Black,
    Random,
}

/// Base time and per-move increment, both in milliseconds. A zero base means
/// that side plays without a clock.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeControl {
    pub base: u64,
    pub increment: u64,
}

/// An open offer to start a game. `opponent` is empty for a public seek;
/// a non-empty value makes the seek visible only to the owner and the named
/// player.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Seek {
    pub id: u32,
    pub player: String,
    #[serde(default)]
    pub opponent: String,
    pub color: SeekColor,
    pub time_white: TimeControl,
    pub time_black: TimeControl,
}

impl Seek {
    pub fn is_private(&self) -> bool {
        !self.opponent.is_empty()
    }

    pub fn visible_to(&self, name: &str) -> bool {
        !self.is_private() || self.player == name || self.opponent == name
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    #[serde(rename = "playing")]
    Playing,
    #[serde(rename = "draw")]
    Draw,
    #[serde(rename = "white won")]
    WhiteWon,
    #[serde(rename = "black won")]
    BlackWon,
}

/// Lobby-visible record of a session. Entries are kept after the game ends
/// as the lobby's history.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LobbyGame {
    pub id: u32,
    pub white: String,
    pub black: String,
    pub status: GameStatus,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Online,
    Offline,
    Playing,
    Spectating,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LobbyPlayer {
    pub name: String,
    pub status: PlayerStatus,
}

/// A single chat line. An empty `sender` marks a server notice.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub text: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        ChatMessage {
            sender: sender.into(),
            text: text.into(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        ChatMessage::new("", text)
    }
}
