use actix::prelude::*;
use log::{debug, info, warn};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{
    Connect, Disconnect, GameEvent, GameMsg, LobbyEvent, LobbyMsg, LobbyPlayer, PlayerStatus,
    ServerFrame, WsFrame,
};

pub mod lobby;
pub mod session;

pub use lobby::Lobby;
pub use session::GameSession;

/// Where a connection currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Room {
    Lobby,
    Game(u32),
}

/// Registry entry binding a display name to its connection. Entries survive
/// disconnects with `live = false` so a reconnecting player inherits their
/// last room.
struct ConnEntry {
    conn_id: Uuid,
    addr: Recipient<WsFrame>,
    room: Room,
    live: bool,
}

/// The match orchestration engine: connection registry, lobby and all game
/// sessions live here. Running it as a single actor serializes every lobby
/// and session mutation, including clock-timer callbacks, through one
/// mailbox.
pub struct GameServer {
    connections: HashMap<String, ConnEntry>,
    lobby: Lobby,
    sessions: HashMap<u32, GameSession>,
    next_seek_id: u32,
    next_game_id: u32,
}

impl GameServer {
    pub fn new() -> Self {
        GameServer {
            connections: HashMap::new(),
            lobby: Lobby::new(),
            sessions: HashMap::new(),
            next_seek_id: 0,
            next_game_id: 0,
        }
    }

    fn encode(frame: &ServerFrame) -> Option<String> {
        match serde_json::to_string(frame) {
            Ok(text) => Some(text),
            Err(err) => {
                warn!("Failed to serialize frame: {}", err);
                None
            }
        }
    }

    /// The message sender must still be the registered connection for that
    /// name; actions from superseded or dead connections are dropped.
    fn verify(&self, name: &str, conn_id: Uuid) -> bool {
        self.connections
            .get(name)
            .map_or(false, |entry| entry.live && entry.conn_id == conn_id)
    }

    pub(crate) fn send_frame(&self, name: &str, frame: &ServerFrame) {
        let Some(text) = Self::encode(frame) else {
            return;
        };
        if let Some(entry) = self.connections.get(name) {
            if entry.live {
                entry.addr.do_send(WsFrame(text));
            }
        }
    }

    pub(crate) fn broadcast_lobby(&self, event: LobbyEvent) {
        let Some(text) = Self::encode(&ServerFrame::LobbyEvent { event }) else {
            return;
        };
        for entry in self.connections.values() {
            if entry.live && entry.room == Room::Lobby {
                entry.addr.do_send(WsFrame(text.clone()));
            }
        }
    }

    /// Delta for a private seek: only its owner and target may see it.
    pub(crate) fn broadcast_lobby_pair(&self, first: &str, second: &str, event: LobbyEvent) {
        let Some(text) = Self::encode(&ServerFrame::LobbyEvent { event }) else {
            return;
        };
        for name in [first, second] {
            if let Some(entry) = self.connections.get(name) {
                if entry.live && entry.room == Room::Lobby {
                    entry.addr.do_send(WsFrame(text.clone()));
                }
            }
        }
    }

    pub(crate) fn broadcast_room(&self, game_id: u32, event: GameEvent) {
        let Some(text) = Self::encode(&ServerFrame::GameEvent { event }) else {
            return;
        };
        for entry in self.connections.values() {
            if entry.live && entry.room == Room::Game(game_id) {
                entry.addr.do_send(WsFrame(text.clone()));
            }
        }
    }

    /// Room broadcast that skips the two players; carries spectator chat.
    pub(crate) fn broadcast_spectators(&self, game_id: u32, white: &str, black: &str, event: GameEvent) {
        let Some(text) = Self::encode(&ServerFrame::GameEvent { event }) else {
            return;
        };
        for (name, entry) in &self.connections {
            if entry.live
                && entry.room == Room::Game(game_id)
                && name.as_str() != white
                && name.as_str() != black
            {
                entry.addr.do_send(WsFrame(text.clone()));
            }
        }
    }

    /// Emit the state snapshot for the room the connection is in, plus the
    /// matching lobby status update. Called on every room entry.
    fn send_room_state(&mut self, name: &str) {
        let Some(entry) = self.connections.get(name) else {
            return;
        };
        if !entry.live {
            return;
        }
        match entry.room {
            Room::Lobby => {
                let state = self.lobby_snapshot(name);
                self.send_frame(name, &ServerFrame::JoinLobby { state });
                self.update_player(LobbyPlayer {
                    name: name.to_string(),
                    status: PlayerStatus::Online,
                });
            }
            Room::Game(game_id) => {
                let Some(session) = self.sessions.get(&game_id) else {
                    return;
                };
                let participant = session.color_of(name).is_some();
                let state = session.snapshot(participant);
                let status = if participant {
                    PlayerStatus::Playing
                } else {
                    PlayerStatus::Spectating
                };
                self.send_frame(name, &ServerFrame::JoinGame { state });
                self.update_player(LobbyPlayer {
                    name: name.to_string(),
                    status,
                });
            }
        }
    }

    /// Move a connection to another room. No-op when it is already there.
    pub(crate) fn change_room(&mut self, name: &str, room: Room) {
        let Some(entry) = self.connections.get_mut(name) else {
            return;
        };
        if entry.room == room {
            return;
        }
        entry.room = room;
        self.send_room_state(name);
    }
}

impl Default for GameServer {
    fn default() -> Self {
        GameServer::new()
    }
}

impl Actor for GameServer {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        info!("Game server started");
    }
}

impl Handler<Connect> for GameServer {
    type Result = bool;

    fn handle(&mut self, msg: Connect, _: &mut Self::Context) -> Self::Result {
        if let Some(existing) = self.connections.get(&msg.name) {
            if existing.live {
                // A second tab must not hijack an active session.
                info!("Rejecting duplicate connection for {}", msg.name);
                return false;
            }
        }

        let room = match self.connections.remove(&msg.name) {
            Some(stale) => match stale.room {
                Room::Game(id) if !self.sessions.contains_key(&id) => Room::Lobby,
                room => room,
            },
            None => Room::Lobby,
        };

        info!("Connection {} bound to name {}", msg.conn_id, msg.name);
        self.connections.insert(
            msg.name.clone(),
            ConnEntry {
                conn_id: msg.conn_id,
                addr: msg.addr,
                room,
                live: true,
            },
        );
        self.send_room_state(&msg.name);
        true
    }
}

impl Handler<Disconnect> for GameServer {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Self::Context) {
        let Some(entry) = self.connections.get_mut(&msg.name) else {
            return;
        };
        if entry.conn_id != msg.conn_id {
            debug!("Ignoring disconnect of superseded connection {}", msg.conn_id);
            return;
        }
        entry.live = false;
        let in_lobby = entry.room == Room::Lobby;
        info!("Connection for {} closed", msg.name);

        self.update_player(LobbyPlayer {
            name: msg.name.clone(),
            status: PlayerStatus::Offline,
        });
        if in_lobby {
            self.remove_player_seeks(&msg.name);
        }
    }
}

impl Handler<LobbyMsg> for GameServer {
    type Result = ();

    fn handle(&mut self, msg: LobbyMsg, ctx: &mut Self::Context) {
        if !self.verify(&msg.name, msg.conn_id) {
            warn!("Dropping lobby action from unregistered connection {}", msg.conn_id);
            return;
        }
        self.handle_lobby_action(msg.name, msg.action, ctx);
    }
}

impl Handler<GameMsg> for GameServer {
    type Result = ();

    fn handle(&mut self, msg: GameMsg, ctx: &mut Self::Context) {
        if !self.verify(&msg.name, msg.conn_id) {
            warn!("Dropping game action from unregistered connection {}", msg.conn_id);
            return;
        }
        self.handle_game_action(msg.name, msg.action, ctx);
    }
}
