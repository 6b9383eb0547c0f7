use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use game_2048::{Difficulty, Game, HintPolicy, Hinter, Status};

/// Hint-driven self-play for the 2048 game core.
#[derive(Parser, Debug)]
#[command(name = "game-2048", version, about)]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 1)]
    games: u32,

    /// Base RNG seed; game i plays with seed + i
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Difficulty preset selecting the hint policy
    #[arg(long, value_enum, default_value_t = Difficulty::Normal)]
    difficulty: Difficulty,

    /// Override the policy's search depth cap
    #[arg(long)]
    depth_cap: Option<u64>,

    /// Stop a game after this many moves
    #[arg(long)]
    steps: Option<u32>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// No progress bar, summary only
    #[arg(long)]
    quiet: bool,
}

#[derive(Serialize)]
struct GameReport {
    seed: u64,
    moves: u32,
    score: u64,
    highest_tile: u32,
    status: Status,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    // Self-play needs hints even where the stock table disables them, so
    // force-enable while keeping the difficulty's search effort.
    let mut policy = HintPolicy::for_difficulty(args.difficulty);
    if !policy.enabled {
        log::info!("hints are disabled at {}; enabling for self-play", args.difficulty);
        policy.enabled = true;
    }
    if args.depth_cap.is_some() {
        policy.depth_cap = args.depth_cap;
    }
    let hinter = Hinter::new().with_policy(args.difficulty, policy);

    let bar = if args.quiet {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(u64::from(args.games));
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos}/{len} games | {msg}")
                .expect("progress template is static"),
        );
        bar
    };

    let mut reports = Vec::with_capacity(args.games as usize);
    for i in 0..args.games {
        let seed = args.seed + u64::from(i);
        let report = play_one(seed, args.difficulty, &hinter, args.steps);
        bar.set_message(format!("last score {}", report.score));
        bar.inc(1);
        reports.push(report);
    }
    bar.finish_and_clear();

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).expect("reports serialize")
        );
    } else {
        for r in &reports {
            println!(
                "seed {:>6} | {:>5} moves | score {:>7} | best tile {:>5} | {}",
                r.seed, r.moves, r.score, r.highest_tile, r.status
            );
        }
        let best = reports.iter().map(|r| r.score).max().unwrap_or(0);
        let total_moves: u64 = reports.iter().map(|r| u64::from(r.moves)).sum();
        println!("{} games, {} moves, best score {}", reports.len(), total_moves, best);
    }
}

fn play_one(seed: u64, difficulty: Difficulty, hinter: &Hinter, steps: Option<u32>) -> GameReport {
    let mut game = Game::new(difficulty, StdRng::seed_from_u64(seed));
    loop {
        let snapshot = game.snapshot();
        if snapshot.status == Status::Won {
            // Keep playing past the win tile, as the host's "Keep Playing"
            // button would.
            game.continue_game().expect("status is Won");
            continue;
        }
        if !snapshot.status.accepts_moves() {
            break;
        }
        if steps.is_some_and(|limit| snapshot.move_count >= limit) {
            break;
        }
        let hint = hinter.recommend(game.board(), difficulty);
        let Some(dir) = hint.direction else { break };
        if game.apply_move(dir).is_err() {
            // A hinted move always changes the board; bail rather than spin
            // if that ever stops holding.
            log::warn!("hinted move {dir} was rejected");
            break;
        }
    }
    let end = game.snapshot();
    GameReport {
        seed,
        moves: end.move_count,
        score: end.score,
        highest_tile: end.board.max_tile(),
        status: end.status,
    }
}
