use std::collections::VecDeque;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::board::{Board, Move};

/// How many undo checkpoints are retained. Older checkpoints fall off the
/// front so memory stays bounded for arbitrarily long games.
pub const HISTORY_LIMIT: usize = 32;

/// Difficulty preset. Difficulty never changes board mechanics; it only
/// selects the hint policy (see [`crate::hint::HintPolicy::for_difficulty`]).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        };
        f.write_str(name)
    }
}

/// Game status. `Won` is the modal-pending state entered on first reaching
/// the win tile; `continue_game` moves it to `WonContinuing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Playing,
    Won,
    WonContinuing,
    Lost,
}

impl Status {
    /// Whether moves (and undo) are accepted in this status.
    pub fn accepts_moves(self) -> bool {
        matches!(self, Status::Playing | Status::WonContinuing)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Playing => "playing",
            Status::Won => "won",
            Status::WonContinuing => "won-continuing",
            Status::Lost => "lost",
        };
        f.write_str(name)
    }
}

/// A call the engine declined. The game state is untouched when one of
/// these is returned; the calling layer can always invoke the engine
/// defensively and stay responsive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejected {
    /// The slide would not change the board.
    #[error("move does not change the board")]
    NoopMove,
    /// The game is not accepting moves (won modal pending, or lost).
    #[error("game is not accepting moves")]
    NotPlaying,
    /// Undo with no checkpoint to restore.
    #[error("nothing to undo")]
    EmptyHistory,
    /// `continue_game` outside the `Won` state.
    #[error("continue is only valid from the won state")]
    NotWon,
}

/// Copy of the public game state handed to the UI layer after every
/// accepted call. The win and game-over modals derive from `status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub board: Board,
    pub score: u64,
    pub high_score: u64,
    pub move_count: u32,
    pub difficulty: Difficulty,
    pub status: Status,
}

impl Snapshot {
    /// True exactly when the win modal should be shown.
    pub fn win_pending(&self) -> bool {
        self.status == Status::Won
    }

    /// True exactly when the game-over modal should be shown.
    pub fn game_over(&self) -> bool {
        self.status == Status::Lost
    }
}

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    board: Board,
    score: u64,
}

/// The authoritative game state machine.
///
/// Owns the live board, score, difficulty, status, and the bounded undo
/// history. All mutations are synchronous and atomic with respect to each
/// other; callers keep single-writer discipline (the hint search only ever
/// reads board *values*, never this struct).
///
/// The random source is injected so tests can drive spawns deterministically:
///
/// ```
/// use game_2048::{Difficulty, Game};
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let game = Game::new(Difficulty::Normal, StdRng::seed_from_u64(42));
/// let s = game.snapshot();
/// assert_eq!(s.score, 0);
/// assert_eq!(16 - s.board.count_empty(), 2);
/// ```
pub struct Game<R: Rng> {
    board: Board,
    score: u64,
    high_score: u64,
    move_count: u32,
    difficulty: Difficulty,
    status: Status,
    history: VecDeque<Checkpoint>,
    rng: R,
}

impl<R: Rng> Game<R> {
    /// Start a fresh game: two spawned tiles, score 0, empty history.
    pub fn new(difficulty: Difficulty, mut rng: R) -> Self {
        let board = Board::EMPTY
            .with_random_tile(&mut rng)
            .with_random_tile(&mut rng);
        Game {
            board,
            score: 0,
            high_score: 0,
            move_count: 0,
            difficulty,
            status: Status::Playing,
            history: VecDeque::new(),
            rng,
        }
    }

    /// Seed the persisted high score read back by the host (persistence
    /// itself lives outside the engine).
    pub fn with_high_score(mut self, high_score: u64) -> Self {
        self.high_score = high_score;
        self
    }

    /// Apply a move: slide, score, checkpoint, spawn, reclassify.
    ///
    /// A slide that changes nothing is rejected without touching history,
    /// so undo can never restore a state identical to the current one.
    pub fn apply_move(&mut self, dir: Move) -> Result<Snapshot, Rejected> {
        if !self.status.accepts_moves() {
            return Err(Rejected::NotPlaying);
        }
        let slide = self.board.slide(dir);
        if !slide.moved {
            return Err(Rejected::NoopMove);
        }
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(Checkpoint {
            board: self.board,
            score: self.score,
        });
        self.score += u64::from(slide.points);
        self.high_score = self.high_score.max(self.score);
        self.board = slide.board.with_random_tile(&mut self.rng);
        self.move_count += 1;

        if self.status == Status::Playing && self.board.has_win_tile() {
            log::debug!("win tile reached at move {}", self.move_count);
            self.status = Status::Won;
        } else if self.board.is_stuck() {
            log::debug!("no legal moves left at move {}", self.move_count);
            self.status = Status::Lost;
        }
        Ok(self.snapshot())
    }

    /// Restore the most recent checkpoint. Disabled once the game is over
    /// (the host forces a restart instead of rewinding a finished game).
    pub fn undo(&mut self) -> Result<Snapshot, Rejected> {
        if !self.status.accepts_moves() {
            return Err(Rejected::NotPlaying);
        }
        let checkpoint = self.history.pop_back().ok_or(Rejected::EmptyHistory)?;
        self.board = checkpoint.board;
        self.score = checkpoint.score;
        self.move_count -= 1;
        // Undoing past the winning move drops back to plain play; the
        // restored snapshot decides, not the pre-undo status.
        if self.status == Status::WonContinuing && !self.board.has_win_tile() {
            self.status = Status::Playing;
        }
        Ok(self.snapshot())
    }

    /// Acknowledge the win modal and keep playing past the win tile.
    pub fn continue_game(&mut self) -> Result<Snapshot, Rejected> {
        if self.status != Status::Won {
            return Err(Rejected::NotWon);
        }
        self.status = Status::WonContinuing;
        Ok(self.snapshot())
    }

    /// Start over. The finished game's score is folded into the high score
    /// before it is discarded; a supplied difficulty replaces the current
    /// one for the new game.
    pub fn restart(&mut self, difficulty: Option<Difficulty>) -> Snapshot {
        self.high_score = self.high_score.max(self.score);
        if let Some(d) = difficulty {
            self.difficulty = d;
        }
        log::debug!(
            "restart: difficulty {}, high score {}",
            self.difficulty,
            self.high_score
        );
        self.board = Board::EMPTY
            .with_random_tile(&mut self.rng)
            .with_random_tile(&mut self.rng);
        self.score = 0;
        self.move_count = 0;
        self.history.clear();
        self.status = Status::Playing;
        self.snapshot()
    }

    /// Change the difficulty in place; takes effect on the next hint request.
    pub fn set_difficulty(&mut self, difficulty: Difficulty) {
        self.difficulty = difficulty;
    }

    /// Current public state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            board: self.board,
            score: self.score,
            high_score: self.high_score,
            move_count: self.move_count,
            difficulty: self.difficulty,
            status: self.status,
        }
    }

    /// The live board value (cheap copy; safe to hand to a hint search).
    pub fn board(&self) -> Board {
        self.board
    }

    /// Current difficulty.
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Number of undo checkpoints currently held.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
