//! Bounded expectimax over player moves (max nodes) and tile spawns
//! (chance nodes).
//!
//! The root fans the four candidate directions out across the rayon pool;
//! below the root each branch runs sequentially with its own transposition
//! table, so a given board and policy always back up the same value. Chance
//! nodes enumerate every empty cell with the 9:1 two/four weighting; nothing
//! is sampled, which is what keeps results reproducible.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::RandomState;
use rayon::prelude::*;

use crate::board::{Board, Move};

use super::heuristic::{self, distinct_tiles};
use super::HintPolicy;

/// Probability that a spawned tile is a 2 rather than a 4.
const TWO_SPAWN_PROB: f64 = 0.9;

/// How many node expansions pass between looks at the cancel flag.
const CANCEL_CHECK_INTERVAL: u64 = 1024;

/// Search bailed out because the caller cancelled it.
pub(crate) struct Cancelled;

/// Backed-up result of one root evaluation.
pub(crate) struct Evaluation {
    pub direction: Option<Move>,
    pub value: f64,
    pub depth: u64,
    pub nodes: u64,
}

#[derive(Clone, Copy)]
struct TableEntry {
    value: f64,
    depth: u64,
}

pub(crate) struct Search<'a> {
    policy: &'a HintPolicy,
    cancel: Option<&'a AtomicBool>,
}

struct Branch {
    dir: Move,
    value: f64,
    nodes: u64,
}

impl<'a> Search<'a> {
    pub fn new(policy: &'a HintPolicy, cancel: Option<&'a AtomicBool>) -> Self {
        Search { policy, cancel }
    }

    /// Evaluate all four directions from `board` and pick the best legal one.
    ///
    /// Scan order is `Move::ALL` and only a strictly better value displaces
    /// the incumbent, so ties break deterministically toward earlier
    /// directions.
    pub fn evaluate(&self, board: Board) -> Result<Evaluation, Cancelled> {
        crate::board::warm();
        heuristic::warm();
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        let depth = self.search_depth(board);
        let branches: Vec<Result<Option<Branch>, Cancelled>> = Move::ALL
            .par_iter()
            .map(|&dir| {
                let slide = board.slide(dir);
                if !slide.moved {
                    return Ok(None);
                }
                // Branch-local table: sharing one across branches would make
                // the backed-up values depend on scheduling.
                let mut table =
                    HashMap::with_hasher(RandomState::with_seeds(0x2048, 0x4096, 0x8192, 0x1024));
                let mut nodes = 0u64;
                let value =
                    self.chance_value(slide.board, depth, 1.0, &mut table, &mut nodes)?;
                Ok(Some(Branch { dir, value, nodes }))
            })
            .collect();

        let mut direction = None;
        let mut best = f64::NEG_INFINITY;
        let mut nodes = 0u64;
        for branch in branches {
            let Some(branch) = branch? else { continue };
            nodes += branch.nodes;
            if direction.is_none() || branch.value > best {
                direction = Some(branch.dir);
                best = branch.value;
            }
        }
        Ok(Evaluation {
            direction,
            value: if direction.is_some() { best } else { 0.0 },
            depth,
            nodes,
        })
    }

    /// Dynamic depth grows with board complexity, clamped by the policy.
    fn search_depth(&self, board: Board) -> u64 {
        let dynamic = u64::from(distinct_tiles(board).saturating_sub(2)).max(3);
        match self.policy.depth_cap {
            Some(cap) => dynamic.min(cap),
            None => dynamic,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .map_or(false, |flag| flag.load(Ordering::Relaxed))
    }

    /// Max ply: best chance-value over the legal slides, 0.0 if none remain
    /// (any live leaf outranks that, so dead ends are avoided).
    fn max_value(
        &self,
        board: Board,
        depth: u64,
        cum_prob: f64,
        table: &mut HashMap<Board, TableEntry, RandomState>,
        nodes: &mut u64,
    ) -> Result<f64, Cancelled> {
        let mut best = 0.0f64;
        for dir in Move::ALL {
            let slide = board.slide(dir);
            if slide.moved {
                best = best.max(self.chance_value(slide.board, depth, cum_prob, table, nodes)?);
            }
        }
        Ok(best)
    }

    /// Chance ply: expectation over every empty cell receiving a 2 or a 4.
    fn chance_value(
        &self,
        board: Board,
        depth: u64,
        cum_prob: f64,
        table: &mut HashMap<Board, TableEntry, RandomState>,
        nodes: &mut u64,
    ) -> Result<f64, Cancelled> {
        *nodes += 1;
        if *nodes % CANCEL_CHECK_INTERVAL == 0 && self.is_cancelled() {
            return Err(Cancelled);
        }
        if depth == 0 || cum_prob < self.policy.prob_cutoff {
            return Ok(heuristic::evaluate(board));
        }
        if let Some(entry) = table.get(&board) {
            if entry.depth >= depth {
                return Ok(entry.value);
            }
        }
        let empty = u64::from(board.count_empty());
        if empty == 0 {
            return Ok(heuristic::evaluate(board));
        }
        let spawn_prob = cum_prob / empty as f64;
        let mut sum = 0.0;
        // Walk the empty nibbles, dropping in a 2 and a 4 at each.
        let mut remaining = empty;
        let mut occupancy = board.raw();
        let mut tile = 1u64;
        while remaining > 0 {
            if (occupancy & 0xf) == 0 {
                let with_two = Board::from_raw(board.raw() | tile);
                sum += TWO_SPAWN_PROB
                    * self.max_value(
                        with_two,
                        depth - 1,
                        spawn_prob * TWO_SPAWN_PROB,
                        table,
                        nodes,
                    )?;
                let with_four = Board::from_raw(board.raw() | (tile << 1));
                sum += (1.0 - TWO_SPAWN_PROB)
                    * self.max_value(
                        with_four,
                        depth - 1,
                        spawn_prob * (1.0 - TWO_SPAWN_PROB),
                        table,
                        nodes,
                    )?;
                remaining -= 1;
            }
            occupancy >>= 4;
            tile <<= 4;
        }
        let value = sum / empty as f64;
        table.insert(board, TableEntry { value, depth });
        Ok(value)
    }
}
