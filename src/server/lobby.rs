use actix::Context;
use log::{debug, info};
use std::collections::{BTreeMap, HashMap};

use crate::models::{
    ChatMessage, ClockInfo, LobbyAction, LobbyEvent, LobbyGame, LobbyPlayer, LobbyState, Seek,
    SeekColor,
};
use crate::server::{GameServer, Room};

/// Authoritative lobby registry: open seeks, the game history, every player
/// ever seen and the lobby chat. Mutations go through the `GameServer`
/// methods below, each of which is also the sole broadcast point for its
/// delta.
pub struct Lobby {
    pub seeks: BTreeMap<u32, Seek>,
    pub games: BTreeMap<u32, LobbyGame>,
    pub players: HashMap<String, LobbyPlayer>,
    pub chat: Vec<ChatMessage>,
}

impl Lobby {
    pub fn new() -> Self {
        Lobby {
            seeks: BTreeMap::new(),
            games: BTreeMap::new(),
            players: HashMap::new(),
            chat: Vec::new(),
        }
    }
}

impl Default for Lobby {
    fn default() -> Self {
        Lobby::new()
    }
}

/// Color resolution for an accepted seek: the seek color is the owner's
/// preference, so a `Black` seek hands white to the accepter.
fn accepter_plays_white(color: SeekColor) -> bool {
    match color {
        SeekColor::Black => true,
        SeekColor::White => false,
        SeekColor::Random => rand::random(),
    }
}

impl GameServer {
    pub(crate) fn handle_lobby_action(
        &mut self,
        name: String,
        action: LobbyAction,
        ctx: &mut Context<Self>,
    ) {
        match self.connections.get(&name) {
            Some(entry) if entry.room == Room::Lobby => {}
            _ => {
                debug!("Dropping lobby action from {} outside the lobby", name);
                return;
            }
        }

        info!("Lobby action {:?} from {}", action, name);

        match action {
            LobbyAction::MakeSeek {
                color,
                time_white,
                time_black,
                opponent,
            } => {
                let id = self.next_seek_id;
                self.next_seek_id += 1;
                self.insert_seek(Seek {
                    id,
                    player: name,
                    opponent,
                    color,
                    time_white,
                    time_black,
                });
            }
            LobbyAction::DeleteSeek { id } => {
                let owned = self
                    .lobby
                    .seeks
                    .get(&id)
                    .map_or(false, |seek| seek.player == name);
                if owned {
                    self.remove_seek(id);
                } else {
                    debug!("{} cannot delete seek {}", name, id);
                }
            }
            LobbyAction::AcceptSeek { id } => self.accept_seek(id, &name, ctx),
            LobbyAction::ChatAction { message } => {
                self.append_lobby_chat(ChatMessage::new(name, message));
            }
            LobbyAction::WatchGame { id } => self.watch_game(&name, id),
            LobbyAction::WatchPlayer { name: target } => self.watch_player(&name, &target),
        }
    }

    pub(crate) fn insert_seek(&mut self, seek: Seek) {
        info!("New seek: {:?}", seek);
        self.lobby.seeks.insert(seek.id, seek.clone());
        let event = LobbyEvent::AddSeek { seek: seek.clone() };
        if seek.is_private() {
            self.broadcast_lobby_pair(&seek.player, &seek.opponent, event);
        } else {
            self.broadcast_lobby(event);
        }
    }

    /// No-op if the seek is already gone.
    pub(crate) fn remove_seek(&mut self, id: u32) {
        let Some(seek) = self.lobby.seeks.remove(&id) else {
            return;
        };
        let event = LobbyEvent::RemoveSeek { id };
        if seek.is_private() {
            self.broadcast_lobby_pair(&seek.player, &seek.opponent, event);
        } else {
            self.broadcast_lobby(event);
        }
    }

    /// A player entering a game abandons all their other open offers.
    pub(crate) fn remove_player_seeks(&mut self, name: &str) {
        let ids: Vec<u32> = self
            .lobby
            .seeks
            .values()
            .filter(|seek| seek.player == name)
            .map(|seek| seek.id)
            .collect();
        for id in ids {
            self.remove_seek(id);
        }
    }

    /// Accept a seek and start the session. A missing id means the seek was
    /// taken or cancelled first; that race resolves to a silent no-op.
    pub(crate) fn accept_seek(&mut self, id: u32, accepter: &str, ctx: &mut Context<Self>) {
        let Some(seek) = self.lobby.seeks.get(&id) else {
            debug!("Seek {} already gone when {} accepted it", id, accepter);
            return;
        };
        if seek.player == accepter {
            debug!("{} tried to accept their own seek", accepter);
            return;
        }
        if seek.is_private() && seek.opponent != accepter {
            debug!("{} is not the target of private seek {}", accepter, id);
            return;
        }
        let seek = seek.clone();

        let owner_live = self
            .connections
            .get(&seek.player)
            .map_or(false, |entry| entry.live);
        if !owner_live {
            info!("Owner of seek {} is gone; dropping it", id);
            self.remove_seek(id);
            return;
        }

        info!("{} accepted seek {:?}", accepter, seek);

        let (white, black) = if accepter_plays_white(seek.color) {
            (accepter.to_string(), seek.player.clone())
        } else {
            (seek.player.clone(), accepter.to_string())
        };
        let clock = ClockInfo::new(seek.time_white, seek.time_black);
        self.new_game(white, black, clock, ctx);
    }

    pub(crate) fn update_game(&mut self, game: LobbyGame) {
        self.lobby.games.insert(game.id, game.clone());
        self.broadcast_lobby(LobbyEvent::UpdateGame { game });
    }

    pub(crate) fn update_player(&mut self, player: LobbyPlayer) {
        self.lobby.players.insert(player.name.clone(), player.clone());
        self.broadcast_lobby(LobbyEvent::UpdatePlayer { player });
    }

    pub(crate) fn append_lobby_chat(&mut self, message: ChatMessage) {
        self.lobby.chat.push(message.clone());
        self.broadcast_lobby(LobbyEvent::ChatEvent { message });
    }

    /// Lobby snapshot for one viewer: public seeks, the viewer's own seeks
    /// and seeks targeted at them; never someone else's private seek.
    pub(crate) fn lobby_snapshot(&self, viewer: &str) -> LobbyState {
        let mut players: Vec<LobbyPlayer> = self.lobby.players.values().cloned().collect();
        players.sort_by(|a, b| a.name.cmp(&b.name));
        LobbyState {
            seeks: self
                .lobby
                .seeks
                .values()
                .filter(|seek| seek.visible_to(viewer))
                .cloned()
                .collect(),
            games: self.lobby.games.values().cloned().collect(),
            players,
            chat: self.lobby.chat.clone(),
        }
    }

    pub(crate) fn watch_game(&mut self, name: &str, id: u32) {
        if self.sessions.contains_key(&id) {
            info!("{} watching game {}", name, id);
            self.change_room(name, Room::Game(id));
        } else {
            debug!("Game {} not found for watcher {}", id, name);
        }
    }

    /// Watch the newest unfinished game the target is playing in.
    pub(crate) fn watch_player(&mut self, name: &str, target: &str) {
        let found = self
            .sessions
            .values()
            .filter(|session| !session.ended && (session.white == target || session.black == target))
            .map(|session| session.id)
            .max();
        match found {
            Some(id) => self.watch_game(name, id),
            None => debug!("{} is not playing; nothing for {} to watch", target, name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeControl;

    fn seek(id: u32, player: &str, opponent: &str) -> Seek {
        Seek {
            id,
            player: player.to_string(),
            opponent: opponent.to_string(),
            color: SeekColor::Random,
            time_white: TimeControl {
                base: 300_000,
                increment: 0,
            },
            time_black: TimeControl {
                base: 300_000,
                increment: 0,
            },
        }
    }

    #[test]
    fn seek_set_replays_inserts_minus_removes() {
        let mut server = GameServer::new();
        for id in 0..6 {
            server.insert_seek(seek(id, "alice", ""));
        }
        server.remove_seek(1);
        server.remove_seek(4);
        server.remove_seek(4); // second removal is a no-op
        server.remove_seek(99); // unknown id is a no-op

        let ids: Vec<u32> = server.lobby.seeks.keys().copied().collect();
        assert_eq!(ids, vec![0, 2, 3, 5]);
    }

    #[test]
    fn removing_a_players_seeks_leaves_others_alone() {
        let mut server = GameServer::new();
        server.insert_seek(seek(0, "alice", ""));
        server.insert_seek(seek(1, "bob", ""));
        server.insert_seek(seek(2, "alice", "carol"));

        server.remove_player_seeks("alice");

        let ids: Vec<u32> = server.lobby.seeks.keys().copied().collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn snapshot_hides_other_peoples_private_seeks() {
        let mut server = GameServer::new();
        server.insert_seek(seek(0, "alice", ""));
        server.insert_seek(seek(1, "alice", "bob"));
        server.insert_seek(seek(2, "carol", "dave"));

        let for_bob = server.lobby_snapshot("bob");
        let ids: Vec<u32> = for_bob.seeks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 1]);

        let for_carol = server.lobby_snapshot("carol");
        let ids: Vec<u32> = for_carol.seeks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 2]);

        let for_eve = server.lobby_snapshot("eve");
        let ids: Vec<u32> = for_eve.seeks.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![0]);
    }

    #[test]
    fn seek_color_policy_gives_accepter_the_other_color() {
        assert!(accepter_plays_white(SeekColor::Black));
        assert!(!accepter_plays_white(SeekColor::White));
    }

    #[test]
    fn random_seeks_hand_out_both_colors() {
        let mut white = 0;
        let mut black = 0;
        for _ in 0..200 {
            if accepter_plays_white(SeekColor::Random) {
                white += 1;
            } else {
                black += 1;
            }
        }
        assert!(white > 0, "accepter never drew white in 200 flips");
        assert!(black > 0, "accepter never drew black in 200 flips");
    }
}
