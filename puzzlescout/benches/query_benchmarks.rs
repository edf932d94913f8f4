use criterion::{black_box, criterion_group, criterion_main, Criterion};
use puzzlescout::search::CancelToken;
use puzzlescout::{EngineConfig, QueryEngine, QueryFilter};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::{fs::File, io::Write, num::NonZeroUsize};
use tempfile::tempdir;

const THEMES: &[&str] = &["fork", "pin", "mate mateIn2", "endgame", "skewer crushing"];

fn create_shards(
    dir: &tempfile::TempDir,
    shard_count: usize,
    rows_per_shard: usize,
) -> std::io::Result<()> {
    let span = 3000 / shard_count;
    for s in 0..shard_count {
        let path = dir
            .path()
            .join(format!("lichess_db_puzzle_sorted.{:03}.csv", s + 1));
        let mut file = File::create(path)?;
        writeln!(
            file,
            "PuzzleId,FEN,Moves,Rating,RatingDeviation,Popularity,NbPlays,Themes,GameUrl,OpeningTags"
        )?;
        for r in 0..rows_per_shard {
            let rating = 400 + s * span + r * span / rows_per_shard;
            writeln!(
                file,
                "{:05}{:05},8/8/8/8/8/8/8/8 w - - 0 1,e2e4 e7e5,{},75,90,1000,{},,Italian_Game",
                s,
                r,
                rating,
                THEMES[r % THEMES.len()]
            )?;
        }
    }
    Ok(())
}

fn open(dir: &tempfile::TempDir, use_index: bool) -> QueryEngine {
    let mut config = EngineConfig::new(dir.path());
    config.thread_count = NonZeroUsize::new(4).unwrap();
    config.use_index = use_index;
    QueryEngine::open(config).unwrap()
}

fn bench_index_build(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_shards(&dir, 16, 5_000).unwrap();

    c.bench_function("index_build_16_shards", |b| {
        b.iter(|| black_box(open(&dir, true)));
    });
}

fn bench_queries(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    create_shards(&dir, 16, 5_000).unwrap();
    let indexed = open(&dir, true);
    let full = open(&dir, false);
    let filter = QueryFilter::new().rating(1500, 1700).theme("fork");

    let mut group = c.benchmark_group("Narrow Range");
    group.bench_function("count_indexed", |b| {
        b.iter(|| black_box(indexed.count(&filter).unwrap()));
    });
    group.bench_function("count_full_scan", |b| {
        b.iter(|| black_box(full.count(&filter).unwrap()));
    });
    group.bench_function("select_random_indexed", |b| {
        let mut rng = StdRng::seed_from_u64(1);
        b.iter(|| {
            black_box(
                indexed
                    .select_random_with(&filter, &mut rng, &CancelToken::new())
                    .unwrap(),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_index_build, bench_queries);
criterion_main!(benches);
