use criterion::{criterion_group, criterion_main, Criterion};
use game_2048::{Board, Difficulty, HintPolicy, Hinter, Move};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;

fn corpus() -> Vec<Board> {
    let mut rng = StdRng::seed_from_u64(4242);
    let mut boards = Vec::new();
    let mut b = Board::EMPTY
        .with_random_tile(&mut rng)
        .with_random_tile(&mut rng);
    boards.push(b);
    let seq = [Move::Left, Move::Up, Move::Right, Move::Down];
    for i in 0..64 {
        let slide = b.slide(seq[i % seq.len()]);
        if slide.moved {
            b = slide.board.with_random_tile(&mut rng);
        }
        boards.push(b);
    }
    boards
}

fn bench_recommend(c: &mut Criterion) {
    let boards = corpus();
    let hinter = Hinter::new().with_policy(
        Difficulty::Normal,
        HintPolicy {
            enabled: true,
            depth_cap: Some(3),
            prob_cutoff: 1e-4,
        },
    );

    c.bench_function("hint/recommend_depth3", |bch| {
        bch.iter(|| {
            let mut acc = 0u64;
            for &bd in &boards {
                let hint = hinter.recommend(bd, Difficulty::Normal);
                acc ^= hint.nodes;
            }
            black_box(acc)
        })
    });
}

criterion_group!(search, bench_recommend);
criterion_main!(search);
