use chess::{Board, ChessMove, Color, Game, GameResult};
use std::str::FromStr;

/// Terminal verdict reported by the move engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    White,
    Black,
    Draw,
}

impl Outcome {
    pub fn win_for(color: Color) -> Outcome {
        match color {
            Color::White => Outcome::White,
            Color::Black => Outcome::Black,
        }
    }
}

/// Facade over the `chess` crate. The orchestration layer only sees this
/// contract: legality checks, move application, the game verdict, claimable
/// draws and position/move text export.
pub struct MoveEngine {
    game: Game,
    moves: Vec<String>,
}

impl MoveEngine {
    pub fn new() -> Self {
        MoveEngine {
            game: Game::new(),
            moves: Vec::new(),
        }
    }

    /// Import a position. The move log starts empty.
    pub fn from_fen(fen: &str) -> Option<Self> {
        let board = Board::from_str(fen).ok()?;
        Some(MoveEngine {
            game: Game::new_with_board(board),
            moves: Vec::new(),
        })
    }

    /// Rebuild a game from a recorded move log. Returns `None` if any move
    /// fails to apply, so a replayed log either reproduces the original
    /// position exactly or is rejected.
    pub fn replay(moves: &[String]) -> Option<Self> {
        let mut engine = MoveEngine::new();
        for mv in moves {
            engine.make_move(mv)?;
        }
        Some(engine)
    }

    pub fn is_legal(&self, mv: &str) -> bool {
        match ChessMove::from_str(mv) {
            Ok(parsed) => self.game.current_position().legal(parsed),
            Err(_) => false,
        }
    }

    /// Apply a move if it parses and is legal, returning the engine's
    /// canonical text for it.
    pub fn make_move(&mut self, mv: &str) -> Option<String> {
        let parsed = ChessMove::from_str(mv).ok()?;
        if !self.game.make_move(parsed) {
            return None;
        }
        let text = parsed.to_string();
        self.moves.push(text.clone());
        Some(text)
    }

    pub fn side_to_move(&self) -> Color {
        self.game.side_to_move()
    }

    /// Verdict reached by play alone (checkmate or stalemate); resignation,
    /// agreement and flag fall are the session's business, not the engine's.
    pub fn result(&self) -> Option<Outcome> {
        self.game.result().map(|result| match result {
            GameResult::WhiteCheckmates | GameResult::BlackResigns => Outcome::White,
            GameResult::BlackCheckmates | GameResult::WhiteResigns => Outcome::Black,
            GameResult::Stalemate | GameResult::DrawAccepted | GameResult::DrawDeclared => {
                Outcome::Draw
            }
        })
    }

    /// Threefold repetition or the 50-move rule.
    pub fn can_claim_draw(&self) -> bool {
        self.game.can_declare_draw()
    }

    pub fn fen(&self) -> String {
        self.game.current_position().to_string()
    }

    pub fn moves(&self) -> &[String] {
        &self.moves
    }
}

impl Default for MoveEngine {
    fn default() -> Self {
        MoveEngine::new()
    }
}

pub fn opposite(color: Color) -> Color {
    !color
}

pub fn color_to_string(color: Color) -> String {
    match color {
        Color::White => "white".to_string(),
        Color::Black => "black".to_string(),
    }
}
