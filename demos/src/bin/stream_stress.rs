//! # Stream Stress
//!
//! Drives the debug command stream with several producer threads over a
//! number of frames and checks that every accepted record was executed
//! exactly once.
//!
//! Two modes:
//! - lockstep (default): producers run to completion inside each frame,
//!   then the consumer ticks.
//! - `--concurrent`: producers write continuously while the main thread
//!   ticks frames, so writes straddle rotations.
//!
//! ```bash
//! stream_stress --producers 8 --frames 120 --records 2000
//! stream_stress --concurrent --config stream.toml
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use clap::Parser;
use redlilium_debug_drawer::{
    DebugDrawer, DebugDrawerContext, LabelStyle, Record, RecordTag, StreamConfig, WorkerPool,
};

const RED: [f32; 4] = [1.0, 0.0, 0.0, 1.0];
const GREEN: [f32; 4] = [0.0, 1.0, 0.0, 1.0];
const BLUE: [f32; 4] = [0.0, 0.0, 1.0, 1.0];

/// Debug command stream stress test.
#[derive(Parser, Debug)]
#[command(name = "stream_stress", about = "Stress the RedLilium debug command stream")]
struct Args {
    /// Number of producer threads.
    #[arg(long, default_value = "4")]
    producers: usize,

    /// Number of frames to simulate.
    #[arg(long, default_value = "60")]
    frames: u64,

    /// Records each producer queues per frame (lockstep mode).
    #[arg(long, default_value = "1000")]
    records: usize,

    /// Producers write continuously while frames tick.
    #[arg(long)]
    concurrent: bool,

    /// TOML file with stream settings (`block_size`, `frame_record_budget`).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Default)]
struct Tally {
    by_tag: [u64; RecordTag::ALL.len()],
    total: u64,
}

impl Tally {
    fn count(&mut self, record: &Record) {
        self.by_tag[record.tag() as usize - 1] += 1;
        self.total += 1;
    }
}

/// Queue one record of a kind chosen by `step`.
fn emit(ctx: &DebugDrawerContext<'_>, step: usize) -> bool {
    let x = step as f32;
    let outcome = match step % 6 {
        0 => ctx.draw_line([x, 0.0, 0.0], [x, 1.0, 0.0], RED),
        1 => ctx.draw_sphere([x, 0.0, 0.0], 0.5, GREEN),
        2 => ctx.draw_aabb([x, 0.0, 0.0], [x + 1.0, 1.0, 1.0], BLUE),
        3 => ctx.draw_circle([x, 0.0, 0.0], [0.0, 1.0, 0.0], 1.0, RED, 0.0, true),
        4 => ctx.draw_label([x, 2.0, 0.0], "stress", LabelStyle::Default),
        _ => ctx.draw_dotted_line([0.0; 3], [x, x, x], 0.1, GREEN),
    };
    outcome.is_accepted()
}

fn load_config(args: &Args) -> Result<StreamConfig, Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => StreamConfig::from_toml_str(&std::fs::read_to_string(path)?)?,
        None => StreamConfig::default(),
    };
    Ok(config.with_max_producers(args.producers.max(1)))
}

fn run_lockstep(drawer: &DebugDrawer, args: &Args, tally: &mut Tally) -> u64 {
    let pool = WorkerPool::new(args.producers);
    let accepted = AtomicU64::new(0);

    for frame in 1..=args.frames {
        pool.scope(|s| {
            for _ in 0..pool.num_workers() {
                let accepted = &accepted;
                s.spawn(move |index| {
                    let ctx = drawer.context(index);
                    let mut ok = 0;
                    for step in 0..args.records {
                        ok += u64::from(emit(&ctx, step));
                    }
                    accepted.fetch_add(ok, Ordering::Relaxed);
                });
            }
        });
        let report = drawer.on_frame_tick(frame, &mut |record: &Record| tally.count(record));
        log::debug!("{:?}", report);
    }
    accepted.load(Ordering::Relaxed)
}

fn run_concurrent(drawer: &DebugDrawer, args: &Args, tally: &mut Tally) -> u64 {
    let pool = WorkerPool::new(args.producers);
    let accepted = AtomicU64::new(0);
    let running = AtomicBool::new(true);

    pool.scope(|s| {
        for _ in 0..pool.num_workers() {
            let (accepted, running) = (&accepted, &running);
            s.spawn(move |index| {
                let ctx = drawer.context(index);
                let mut step = 0;
                while running.load(Ordering::Acquire) {
                    if emit(&ctx, step) {
                        accepted.fetch_add(1, Ordering::Relaxed);
                    }
                    step += 1;
                }
            });
        }

        for frame in 1..=args.frames {
            let report = drawer.on_frame_tick(frame, &mut |record: &Record| tally.count(record));
            log::debug!("{:?}", report);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        running.store(false, Ordering::Release);
    });

    // everything still queued lands in the next generation
    drawer.on_frame_tick(args.frames + 1, &mut |record: &Record| tally.count(record));
    accepted.load(Ordering::Relaxed)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid stream configuration: {}", e);
            std::process::exit(2);
        }
    };
    let drawer = match DebugDrawer::new(config) {
        Ok(drawer) => drawer,
        Err(e) => {
            log::error!("Invalid stream configuration: {}", e);
            std::process::exit(2);
        }
    };
    drawer.allocate();

    let start = Instant::now();
    let mut tally = Tally::default();
    let accepted = if args.concurrent {
        run_concurrent(&drawer, &args, &mut tally)
    } else {
        run_lockstep(&drawer, &args, &mut tally)
    };
    let elapsed = start.elapsed();

    log::info!(
        "{} producers, {} frames, {} generations in {:.2?}",
        args.producers,
        args.frames,
        drawer.generation(),
        elapsed
    );
    for (tag, count) in RecordTag::ALL.iter().zip(tally.by_tag) {
        if count > 0 {
            log::info!("  {:?}: {}", tag, count);
        }
    }
    log::info!("Accepted {} records, executed {}", accepted, tally.total);

    if accepted != tally.total {
        log::error!(
            "Record count mismatch: {} accepted but {} executed",
            accepted,
            tally.total
        );
        std::process::exit(1);
    }
}
