use actix::{AsyncContext, Context, SpawnHandle};
use chess::Color;
use log::{debug, info};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::engine::{color_to_string, opposite, MoveEngine, Outcome};
use crate::models::{
    ChatMessage, ClockInfo, ClockState, GameAction, GameEvent, GameSnapshot, GameStatus, LobbyGame,
};
use crate::server::{GameServer, Room};

/// One ongoing or just-concluded match. Kept in the session map for the
/// process lifetime so finished games stay watchable and rematch state
/// survives until both players leave.
pub struct GameSession {
    pub id: u32,
    pub white: String,
    pub black: String,
    pub engine: MoveEngine,
    pub player_chat: Vec<ChatMessage>,
    pub spectator_chat: Vec<ChatMessage>,
    pub draw_offer: String,
    pub rematch: String,
    pub ended: bool,
    pub clock: ClockInfo,
    pub pending_flag: Option<SpawnHandle>,
}

impl GameSession {
    pub fn new(id: u32, white: String, black: String, clock: ClockInfo) -> Self {
        let opening = ChatMessage::system(format!(
            "New game started between {} and {}",
            white, black
        ));
        GameSession {
            id,
            white,
            black,
            engine: MoveEngine::new(),
            player_chat: vec![opening.clone()],
            spectator_chat: vec![opening],
            draw_offer: String::new(),
            rematch: String::new(),
            ended: false,
            clock,
            pending_flag: None,
        }
    }

    pub fn color_of(&self, name: &str) -> Option<Color> {
        if name == self.white {
            Some(Color::White)
        } else if name == self.black {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn player_of(&self, color: Color) -> &str {
        match color {
            Color::White => &self.white,
            Color::Black => &self.black,
        }
    }

    /// Snapshot for a joining connection. Participants get the player chat
    /// stream, everyone else the spectator stream.
    pub fn snapshot(&self, participant: bool) -> GameSnapshot {
        GameSnapshot {
            id: self.id,
            white: self.white.clone(),
            black: self.black.clone(),
            moves: self.engine.moves().to_vec(),
            chat: if participant {
                self.player_chat.clone()
            } else {
                self.spectator_chat.clone()
            },
            draw_offer: self.draw_offer.clone(),
            ended: self.ended,
            clock: ClockState::from(&self.clock),
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

impl GameServer {
    /// Start a session between two identified players, in resolved color
    /// order, and move both into its room.
    pub(crate) fn new_game(
        &mut self,
        white: String,
        black: String,
        clock: ClockInfo,
        ctx: &mut Context<Self>,
    ) {
        let id = self.next_game_id;
        self.next_game_id += 1;

        info!("Creating game {} between {} and {}", id, white, black);
        self.sessions
            .insert(id, GameSession::new(id, white.clone(), black.clone(), clock));

        self.change_room(&white, Room::Game(id));
        self.change_room(&black, Room::Game(id));

        self.remove_player_seeks(&white);
        self.remove_player_seeks(&black);

        self.update_game(LobbyGame {
            id,
            white: white.clone(),
            black: black.clone(),
            status: GameStatus::Playing,
        });
        self.append_lobby_chat(ChatMessage::system(format!(
            "{} and {} are playing",
            white, black
        )));

        self.arm_flag_timer(id, ctx);
    }

    pub(crate) fn handle_game_action(
        &mut self,
        name: String,
        action: GameAction,
        ctx: &mut Context<Self>,
    ) {
        let Some(entry) = self.connections.get(&name) else {
            return;
        };
        let Room::Game(game_id) = entry.room else {
            debug!("Dropping game action from {} outside a game room", name);
            return;
        };
        let Some(session) = self.sessions.get(&game_id) else {
            return;
        };

        info!("Game action {:?} from {} in game {}", action, name, game_id);

        match session.color_of(&name) {
            Some(color) => self.player_action(game_id, &name, color, action, ctx),
            None => self.spectator_action(game_id, &name, action),
        }
    }

    fn player_action(
        &mut self,
        game_id: u32,
        name: &str,
        color: Color,
        action: GameAction,
        ctx: &mut Context<Self>,
    ) {
        match action {
            GameAction::MakeMove { mv } => self.make_move(game_id, name, color, &mv, ctx),
            GameAction::ChatAction { message } => {
                let msg = ChatMessage::new(name, message);
                if let Some(session) = self.sessions.get_mut(&game_id) {
                    session.player_chat.push(msg.clone());
                    session.spectator_chat.push(msg.clone());
                }
                self.broadcast_room(game_id, GameEvent::ChatEvent { message: msg });
            }
            GameAction::Resign => {
                let Some(session) = self.sessions.get(&game_id) else {
                    return;
                };
                if session.ended {
                    return;
                }
                info!("{} resigned in game {}", name, game_id);
                self.room_notice(game_id, format!("{} resigned", name));
                self.end_game(game_id, Outcome::win_for(opposite(color)), ctx);
            }
            GameAction::OfferDraw => {
                let Some(session) = self.sessions.get_mut(&game_id) else {
                    return;
                };
                if session.ended {
                    return;
                }
                if !session.draw_offer.is_empty() {
                    if session.draw_offer == name {
                        return;
                    }
                    // Countering an offer with an offer is acceptance.
                    self.room_notice(game_id, "Players agreed to a draw");
                    self.end_game(game_id, Outcome::Draw, ctx);
                    return;
                }
                session.draw_offer = name.to_string();
                self.room_notice(game_id, format!("{} offered a draw", name));
                self.broadcast_room(
                    game_id,
                    GameEvent::DrawOffered {
                        player: name.to_string(),
                    },
                );
            }
            GameAction::AcceptDraw => {
                let Some(session) = self.sessions.get(&game_id) else {
                    return;
                };
                if session.ended || session.draw_offer.is_empty() || session.draw_offer == name {
                    return;
                }
                self.room_notice(game_id, format!("{} accepted a draw", name));
                self.end_game(game_id, Outcome::Draw, ctx);
            }
            GameAction::DeclineDraw => {
                let Some(session) = self.sessions.get_mut(&game_id) else {
                    return;
                };
                if session.ended || session.draw_offer.is_empty() || session.draw_offer == name {
                    return;
                }
                session.draw_offer.clear();
                self.room_notice(game_id, format!("{} declined a draw", name));
            }
            GameAction::ClaimDraw => {
                let Some(session) = self.sessions.get(&game_id) else {
                    return;
                };
                if session.ended || !session.engine.can_claim_draw() {
                    debug!("{} cannot claim a draw in game {}", name, game_id);
                    return;
                }
                self.room_notice(game_id, format!("{} claimed a draw", name));
                self.end_game(game_id, Outcome::Draw, ctx);
            }
            GameAction::ExitGame => {
                let Some(session) = self.sessions.get_mut(&game_id) else {
                    return;
                };
                if !session.ended {
                    debug!("{} tried to leave unfinished game {}", name, game_id);
                    return;
                }
                session.rematch = "never".to_string();
                info!("{} exited game {}", name, game_id);
                self.room_notice(game_id, format!("{} left the game", name));
                self.change_room(name, Room::Lobby);
            }
            GameAction::Rematch => {
                let Some(session) = self.sessions.get_mut(&game_id) else {
                    return;
                };
                if !session.ended {
                    return;
                }
                if session.rematch.is_empty() {
                    session.rematch = name.to_string();
                    info!("{} requested a rematch in game {}", name, game_id);
                    self.room_notice(game_id, format!("{} wants a rematch", name));
                    return;
                }
                if session.rematch == name || session.rematch == "never" {
                    return;
                }
                session.rematch.clear();
                // Colors swap; each player keeps their own time control.
                let white = session.black.clone();
                let black = session.white.clone();
                let clock = ClockInfo::new(session.clock.black, session.clock.white);
                self.room_notice(game_id, "Players agreed to a rematch");
                self.new_game(white, black, clock, ctx);
            }
        }
    }

    /// Spectators may only chat among themselves or go back to the lobby.
    fn spectator_action(&mut self, game_id: u32, name: &str, action: GameAction) {
        match action {
            GameAction::ChatAction { message } => {
                let msg = ChatMessage::new(name, message);
                let (white, black) = {
                    let Some(session) = self.sessions.get_mut(&game_id) else {
                        return;
                    };
                    session.spectator_chat.push(msg.clone());
                    (session.white.clone(), session.black.clone())
                };
                self.broadcast_spectators(
                    game_id,
                    &white,
                    &black,
                    GameEvent::ChatEvent { message: msg },
                );
            }
            GameAction::ExitGame => {
                info!("Spectator {} left game {}", name, game_id);
                self.change_room(name, Room::Lobby);
            }
            other => {
                debug!(
                    "Ignoring spectator action {:?} from {} in game {}",
                    other, name, game_id
                );
            }
        }
    }

    fn make_move(
        &mut self,
        game_id: u32,
        name: &str,
        color: Color,
        mv: &str,
        ctx: &mut Context<Self>,
    ) {
        let applied = {
            let Some(session) = self.sessions.get_mut(&game_id) else {
                return;
            };
            if session.ended {
                return;
            }
            if session.engine.side_to_move() != color {
                debug!("{} moved out of turn in game {}", name, game_id);
                return;
            }
            let Some(text) = session.engine.make_move(mv) else {
                info!("Illegal move {:?} by {} in game {}", mv, name, game_id);
                return;
            };
            session.clock.record_move(color, Instant::now());
            text
        };

        self.arm_flag_timer(game_id, ctx);
        self.broadcast_room(
            game_id,
            GameEvent::PerformMove {
                mv: applied,
                color: color_to_string(color),
                timestamp: now_millis(),
            },
        );

        if let Some(outcome) = self.sessions.get(&game_id).and_then(|s| s.engine.result()) {
            info!("Game {} ended over the board", game_id);
            self.end_game(game_id, outcome, ctx);
            return;
        }

        // A move implicitly declines the opponent's outstanding draw offer,
        // never the mover's own.
        if let Some(session) = self.sessions.get_mut(&game_id) {
            if session.draw_offer == session.player_of(opposite(color)) {
                session.draw_offer.clear();
            }
        }
    }

    /// Arm the flag-fall timer for the side now on move, replacing any
    /// pending one. Untimed sides get no timer.
    pub(crate) fn arm_flag_timer(&mut self, game_id: u32, ctx: &mut Context<Self>) {
        let Some(session) = self.sessions.get_mut(&game_id) else {
            return;
        };
        if let Some(handle) = session.pending_flag.take() {
            ctx.cancel_future(handle);
        }
        if session.ended {
            return;
        }
        let side = session.engine.side_to_move();
        if !session.clock.timed(side) {
            return;
        }
        let wait = Duration::from_millis(session.clock.remaining(side));
        let handle = ctx.run_later(wait, move |server, ctx| server.flag_fall(game_id, ctx));
        session.pending_flag = Some(handle);
    }

    /// Nobody moved in time. Guarded by `ended` against racing a move or
    /// another termination path that landed first.
    fn flag_fall(&mut self, game_id: u32, ctx: &mut Context<Self>) {
        let (loser_name, outcome) = {
            let Some(session) = self.sessions.get(&game_id) else {
                return;
            };
            if session.ended {
                return;
            }
            let loser = session.engine.side_to_move();
            (
                session.player_of(loser).to_string(),
                Outcome::win_for(opposite(loser)),
            )
        };
        info!("{} ran out of time in game {}", loser_name, game_id);
        self.room_notice(game_id, format!("{} ran out of time", loser_name));
        self.end_game(game_id, outcome, ctx);
    }

    /// Server notice into both chat streams of a room.
    pub(crate) fn room_notice(&mut self, game_id: u32, text: impl Into<String>) {
        let msg = ChatMessage::system(text);
        let Some(session) = self.sessions.get_mut(&game_id) else {
            return;
        };
        session.player_chat.push(msg.clone());
        session.spectator_chat.push(msg.clone());
        self.broadcast_room(game_id, GameEvent::ChatEvent { message: msg });
    }

    /// Terminate a session exactly once: cancel the pending flag timer,
    /// post the summary, notify the room and update the lobby record.
    pub(crate) fn end_game(&mut self, game_id: u32, outcome: Outcome, ctx: &mut Context<Self>) {
        let (white, black) = {
            let Some(session) = self.sessions.get_mut(&game_id) else {
                return;
            };
            if session.ended {
                return;
            }
            session.ended = true;
            if let Some(handle) = session.pending_flag.take() {
                ctx.cancel_future(handle);
            }
            (session.white.clone(), session.black.clone())
        };

        info!("Game {} ended: {:?}", game_id, outcome);

        let summary = match outcome {
            Outcome::Draw => "Game ended in a draw".to_string(),
            Outcome::White => "Game ended in a win for white".to_string(),
            Outcome::Black => "Game ended in a win for black".to_string(),
        };
        self.room_notice(game_id, summary);
        self.broadcast_room(game_id, GameEvent::GameEnd);

        let status = match outcome {
            Outcome::Draw => GameStatus::Draw,
            Outcome::White => GameStatus::WhiteWon,
            Outcome::Black => GameStatus::BlackWon,
        };
        self.update_game(LobbyGame {
            id: game_id,
            white: white.clone(),
            black: black.clone(),
            status,
        });
        self.append_lobby_chat(ChatMessage::system(match outcome {
            Outcome::Draw => format!("{} and {} drew", white, black),
            Outcome::White => format!("{} won against {}", white, black),
            Outcome::Black => format!("{} won against {}", black, white),
        }));
    }
}
