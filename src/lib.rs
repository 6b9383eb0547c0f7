//! game-2048: the 2048 game core behind a thin UI shell.
//!
//! This crate provides:
//! - A compact [`Board`] value type (packed `u64`, table-driven slides,
//!   injectable random tile spawns, terminal detection)
//! - A [`Game`] state machine owning score, high score, difficulty, status,
//!   and a bounded undo history
//! - A [`Hinter`] that recommends a next move through bounded expectimax
//!   search, runnable off-thread and cancellable
//!
//! Quick start:
//! ```
//! use game_2048::{Difficulty, Game, Hinter};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic game via a seeded RNG
//! let mut game = Game::new(Difficulty::Normal, StdRng::seed_from_u64(42));
//! let hinter = Hinter::new();
//!
//! // Drive a few moves from hints (kept short to stay doctest-fast)
//! for _ in 0..4 {
//!     let snapshot = game.snapshot();
//!     if !snapshot.status.accepts_moves() {
//!         break;
//!     }
//!     let hint = hinter.recommend(game.board(), snapshot.difficulty);
//!     match hint.direction {
//!         Some(dir) => {
//!             let s = game.apply_move(dir).expect("hinted moves are legal");
//!             assert!(s.score >= snapshot.score);
//!         }
//!         None => break,
//!     }
//! }
//! assert!(game.snapshot().move_count > 0);
//! ```
//!
//! The engine never panics on an illegal call; rejected transitions come
//! back as [`Rejected`] values so a UI can invoke it defensively:
//! ```
//! use game_2048::{Difficulty, Game, Rejected};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut game = Game::new(Difficulty::Normal, StdRng::seed_from_u64(7));
//! assert_eq!(game.undo(), Err(Rejected::EmptyHistory));
//! assert_eq!(game.continue_game(), Err(Rejected::NotWon));
//! ```

pub mod board;
pub mod game;
pub mod hint;

pub use board::{Board, Ending, Move, Slide, WIN_TILE};
pub use game::{Difficulty, Game, Rejected, Snapshot, Status, HISTORY_LIMIT};
pub use hint::{heuristic_value, Hint, HintPolicy, HintTask, Hinter};
