//! Move recommendation ("hint") engine.
//!
//! [`Hinter::recommend`] runs a bounded expectimax search over the four
//! candidate directions and returns the best one together with diagnostic
//! info. The search effort comes from a per-difficulty [`HintPolicy`]; the
//! stock table disables hints entirely on hard, mirroring the host UI, but
//! callers can install their own policies.
//!
//! Hints are deterministic: the same board and policy always produce the
//! same [`Hint`]. They are also safe to compute off the game thread —
//! [`Hinter::spawn`] returns a [`HintTask`] that can be cancelled and is
//! keyed by the input board so stale results are detectable:
//!
//! ```
//! use game_2048::{Board, Hinter, Difficulty};
//!
//! let board = Board::from_grid([
//!     [2, 4, 8, 0],
//!     [0, 2, 0, 0],
//!     [0, 0, 0, 0],
//!     [0, 0, 0, 0],
//! ]);
//! let hinter = Hinter::new();
//! let task = hinter.spawn(board, Difficulty::Normal);
//! let hint = task.wait();
//! assert!(hint.is_for(board));
//! let dir = hint.direction.expect("open board must yield a hint");
//! assert!(board.slide(dir).moved);
//! ```

mod heuristic;
mod search;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use serde::Serialize;

use crate::board::{Board, Move};
use crate::game::Difficulty;

use search::{Cancelled, Search};

/// Search effort knobs for one difficulty level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HintPolicy {
    /// When false, `recommend` resolves immediately to no recommendation.
    pub enabled: bool,
    /// Hard cap on look-ahead depth; `None` leaves the dynamic depth alone.
    pub depth_cap: Option<u64>,
    /// Chance branches below this cumulative probability are evaluated by
    /// the heuristic instead of being expanded.
    pub prob_cutoff: f64,
}

impl HintPolicy {
    /// Stock policy table. Harder play means shallower (or no) assistance;
    /// the host UI's "hints only on normal" rule lives here as data, not in
    /// the engine's control flow.
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => HintPolicy {
                enabled: true,
                depth_cap: None,
                prob_cutoff: 1e-4,
            },
            Difficulty::Normal => HintPolicy {
                enabled: true,
                depth_cap: Some(3),
                prob_cutoff: 1e-4,
            },
            Difficulty::Hard => HintPolicy {
                enabled: false,
                depth_cap: Some(1),
                prob_cutoff: 1e-4,
            },
        }
    }
}

/// A move recommendation for one specific board.
///
/// `board` is the input the recommendation applies to; consumers compare it
/// against their live board and drop the hint when they differ. `direction`
/// is absent when the board has no legal move, when the policy disables
/// hinting, or when the search was cancelled (`cancelled` distinguishes the
/// last case).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Hint {
    pub board: Board,
    pub direction: Option<Move>,
    pub depth: u64,
    pub expected_value: f64,
    pub nodes: u64,
    pub cancelled: bool,
}

impl Hint {
    fn empty(board: Board) -> Self {
        Hint {
            board,
            direction: None,
            depth: 0,
            expected_value: 0.0,
            nodes: 0,
            cancelled: false,
        }
    }

    fn cancelled(board: Board) -> Self {
        Hint {
            cancelled: true,
            ..Hint::empty(board)
        }
    }

    /// True if this hint was computed for `board`.
    pub fn is_for(&self, board: Board) -> bool {
        self.board == board
    }
}

/// Front-end over the expectimax search; holds one policy per difficulty.
#[derive(Debug, Clone)]
pub struct Hinter {
    policies: [HintPolicy; 3],
}

impl Default for Hinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Hinter {
    /// Hinter with the stock per-difficulty policy table.
    pub fn new() -> Self {
        Hinter {
            policies: [
                HintPolicy::for_difficulty(Difficulty::Easy),
                HintPolicy::for_difficulty(Difficulty::Normal),
                HintPolicy::for_difficulty(Difficulty::Hard),
            ],
        }
    }

    /// Replace the policy used for one difficulty.
    pub fn with_policy(mut self, difficulty: Difficulty, policy: HintPolicy) -> Self {
        self.policies[Self::slot(difficulty)] = policy;
        self
    }

    /// The policy currently installed for `difficulty`.
    pub fn policy(&self, difficulty: Difficulty) -> HintPolicy {
        self.policies[Self::slot(difficulty)]
    }

    fn slot(difficulty: Difficulty) -> usize {
        match difficulty {
            Difficulty::Easy => 0,
            Difficulty::Normal => 1,
            Difficulty::Hard => 2,
        }
    }

    /// Compute a recommendation synchronously on the calling thread.
    pub fn recommend(&self, board: Board, difficulty: Difficulty) -> Hint {
        let policy = self.policy(difficulty);
        let hint = run_search(board, &policy, None);
        log::debug!(
            "hint for {board:?} at {difficulty}: {:?} (depth {}, {} nodes)",
            hint.direction,
            hint.depth,
            hint.nodes
        );
        hint
    }

    /// Start a recommendation on a worker thread and return a handle to it.
    ///
    /// The caller is free to keep applying moves while the search runs; the
    /// returned task is keyed by `board`, so a result that arrives after the
    /// game has moved on is recognizably stale. Dropping the task cancels
    /// the search.
    pub fn spawn(&self, board: Board, difficulty: Difficulty) -> HintTask {
        let policy = self.policy(difficulty);
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);
        let flag = Arc::clone(&cancel);
        thread::spawn(move || {
            let hint = run_search(board, &policy, Some(&flag));
            // The receiver may be gone already; a discarded hint is fine.
            let _ = tx.send(hint);
        });
        HintTask { board, cancel, rx }
    }
}

fn run_search(board: Board, policy: &HintPolicy, cancel: Option<&AtomicBool>) -> Hint {
    if !policy.enabled {
        return Hint::empty(board);
    }
    match Search::new(policy, cancel).evaluate(board) {
        Ok(eval) => Hint {
            board,
            direction: eval.direction,
            depth: eval.depth,
            expected_value: eval.value,
            nodes: eval.nodes,
            cancelled: false,
        },
        Err(Cancelled) => Hint::cancelled(board),
    }
}

/// Heuristic value of a board, as used by the search leaves. Exposed for
/// diagnostics and benchmarks.
pub fn heuristic_value(board: Board) -> f64 {
    heuristic::warm();
    heuristic::evaluate(board)
}

/// Handle to an in-flight hint computation.
#[derive(Debug)]
pub struct HintTask {
    board: Board,
    cancel: Arc<AtomicBool>,
    rx: Receiver<Hint>,
}

impl HintTask {
    /// The board this task is computing a hint for.
    pub fn board(&self) -> Board {
        self.board
    }

    /// True if this task's result will apply to `board`.
    pub fn is_for(&self, board: Board) -> bool {
        self.board == board
    }

    /// Ask the search to stop at its next checkpoint. The task then
    /// resolves to a no-recommendation hint with `cancelled` set; partial
    /// results are never surfaced.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Non-blocking poll: the finished hint, or `None` while still running.
    pub fn try_hint(&self) -> Option<Hint> {
        self.rx.try_recv().ok()
    }

    /// Block until the search finishes (or acknowledges cancellation).
    pub fn wait(&self) -> Hint {
        self.rx
            .recv()
            .unwrap_or_else(|_| Hint::cancelled(self.board))
    }
}

impl Drop for HintTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn seeded_boards(count: usize) -> Vec<Board> {
        let mut rng = StdRng::seed_from_u64(1337);
        let mut boards = Vec::new();
        let mut b = Board::EMPTY
            .with_random_tile(&mut rng)
            .with_random_tile(&mut rng);
        boards.push(b);
        while boards.len() < count {
            if Move::ALL.iter().all(|&d| !b.slide(d).moved) {
                b = Board::EMPTY
                    .with_random_tile(&mut rng)
                    .with_random_tile(&mut rng);
                continue;
            }
            let dir = Move::ALL[rng.gen_range(0..4)];
            let slide = b.slide(dir);
            if slide.moved {
                b = slide.board.with_random_tile(&mut rng);
                boards.push(b);
            }
        }
        boards
    }

    #[test]
    fn recommendations_are_always_legal() {
        let hinter = Hinter::new();
        for board in seeded_boards(24) {
            let hint = hinter.recommend(board, Difficulty::Normal);
            assert!(hint.is_for(board));
            match hint.direction {
                Some(dir) => assert!(board.slide(dir).moved),
                None => assert!(Move::ALL.iter().all(|&d| !board.slide(d).moved)),
            }
        }
    }

    #[test]
    fn recommendations_are_reproducible() {
        let hinter = Hinter::new();
        let board = seeded_boards(10)[9];
        let a = hinter.recommend(board, Difficulty::Normal);
        let b = hinter.recommend(board, Difficulty::Normal);
        assert_eq!(a, b);
    }

    #[test]
    fn hard_difficulty_disables_hints() {
        let hinter = Hinter::new();
        let board = seeded_boards(1)[0];
        let hint = hinter.recommend(board, Difficulty::Hard);
        assert_eq!(hint.direction, None);
        assert_eq!(hint.nodes, 0);
        assert!(!hint.cancelled);
    }

    #[test]
    fn policy_overrides_replace_the_stock_table() {
        let hinter = Hinter::new().with_policy(
            Difficulty::Hard,
            HintPolicy {
                enabled: true,
                depth_cap: Some(1),
                prob_cutoff: 1e-4,
            },
        );
        let board = seeded_boards(1)[0];
        let hint = hinter.recommend(board, Difficulty::Hard);
        assert!(hint.direction.is_some());
    }

    #[test]
    fn spawned_task_matches_synchronous_result() {
        let hinter = Hinter::new();
        let board = seeded_boards(6)[5];
        let task = hinter.spawn(board, Difficulty::Normal);
        assert!(task.is_for(board));
        let from_task = task.wait();
        let direct = hinter.recommend(board, Difficulty::Normal);
        assert_eq!(from_task, direct);
    }

    #[test]
    fn cancelled_task_resolves_to_no_recommendation() {
        // A rich uncapped position makes the search long enough that the
        // cancel flag is seen at a checkpoint well before completion.
        let board = Board::from_grid([
            [2, 4, 8, 16],
            [32, 64, 128, 256],
            [512, 1024, 2, 4],
            [0, 0, 0, 0],
        ]);
        let hinter = Hinter::new().with_policy(
            Difficulty::Easy,
            HintPolicy {
                enabled: true,
                depth_cap: None,
                prob_cutoff: 0.0,
            },
        );
        let task = hinter.spawn(board, Difficulty::Easy);
        task.cancel();
        let hint = task.wait();
        assert!(hint.cancelled);
        assert_eq!(hint.direction, None);
        assert!(hint.is_for(board));
    }

    #[test]
    fn stale_hints_are_detectable() {
        let hinter = Hinter::new();
        let boards = seeded_boards(2);
        let hint = hinter.recommend(boards[0], Difficulty::Normal);
        assert!(hint.is_for(boards[0]));
        assert!(!hint.is_for(boards[1]));
    }
}
