use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use munin::{Min, Pool, ReduceOp, Sum};
use std::fmt::Display;
use std::time::Instant;
use tracing::info;

mod bmp;

const ENV_CHANNEL: &str = "PIXEL_STATS_CHANNEL";

/// Reduces one channel of a BMP image over the munin worker pool, then runs
/// the same reduction as a plain single-threaded fold for comparison.
#[derive(Parser, Debug)]
struct Args {
    /// BMP image to load
    #[arg(long)]
    input: String,
    /// Reduction to run over the channel
    #[arg(long, value_enum)]
    op: OpKind,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OpKind {
    Sum,
    Min,
}

fn channel_from_env() -> bmp::Channel {
    match std::env::var(ENV_CHANNEL).ok().as_deref() {
        Some("green") => bmp::Channel::Green,
        Some("blue") => bmp::Channel::Blue,
        _ => bmp::Channel::Red,
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();
    let pool = Pool::from_env();
    let channel = channel_from_env();
    info!(pool_size = pool.config().pool_size, input = %args.input, channel = ?channel, "starting");
    match args.op {
        OpKind::Sum => {
            let plane = bmp::load_channel::<u64>(&args.input, channel)?;
            info!(width = plane.width, height = plane.height, elements = plane.values.len(), "channel plane loaded");
            report(&pool, Sum, "sum", &plane.values)
        }
        OpKind::Min => {
            let plane = bmp::load_channel::<u8>(&args.input, channel)?;
            info!(width = plane.width, height = plane.height, elements = plane.values.len(), "channel plane loaded");
            report(&pool, Min, "min", &plane.values)
        }
    }
}

fn report<O>(pool: &Pool, op: O, name: &str, data: &[O::Value]) -> Result<()>
where
    O: ReduceOp + Copy,
    O::Value: Display,
{
    let outcome = pool.run(op, data).context("pool reduction failed")?;
    println!("pool {}: {} ({:.3} ms)", name, outcome.value, outcome.elapsed.as_secs_f64() * 1e3);

    let direct_start = Instant::now();
    let direct = data.iter().fold(op.identity(), |acc, &v| op.combine(acc, v));
    let direct_ms = direct_start.elapsed().as_secs_f64() * 1e3;
    println!();
    println!("direct {}: {} ({:.3} ms)", name, direct, direct_ms);
    Ok(())
}
