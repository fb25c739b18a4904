//! # Trace Player
//!
//! Plays a seeded algorithm trace in the terminal through a `PlaybackStore`.
//!
//! ```text
//! cargo run -p trace-player -- [TRACE.json] [SPEED]
//! ```
//!
//! Without arguments it plays the bundled Two Sum trace at normal speed.
//! `RUST_LOG=stepwise_core=trace` shows every engine operation.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use stepwise_core::trace::ElementState;
use stepwise_core::{Frame, PlaybackConfig, PlaybackStore, Speed, Step, StepSequence, TraceMetadata};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

const TWO_SUM: &str = include_str!("../traces/two-sum.json");

// ============================================================================
// Trace document
// ============================================================================

#[derive(Debug, Deserialize)]
struct TraceFile {
    metadata: TraceMetadata,
    steps: StepSequence<Frame>,
}

impl TraceFile {
    fn parse(json: &str) -> Result<Self> {
        let file: Self = serde_json::from_str(json).context("invalid trace document")?;
        if file.metadata.total_steps != file.steps.length() {
            bail!(
                "metadata claims {} steps but the trace has {}",
                file.metadata.total_steps,
                file.steps.length()
            );
        }
        Ok(file)
    }
}

// ============================================================================
// Rendering
// ============================================================================

fn cell(value: &serde_json::Value, state: ElementState) -> String {
    match state {
        ElementState::Active => format!("[{value}]"),
        ElementState::Comparing => format!("<{value}>"),
        ElementState::Found | ElementState::Target => format!("({value})"),
        _ => value.to_string(),
    }
}

fn render(step: &Step<Frame>, total: usize) -> String {
    let frame = &step.payload;
    let mut out = format!("{:>2}/{total}  {}", step.step_number + 1, step.description);

    if !frame.array.is_empty() {
        let cells: Vec<_> = frame.array.iter().map(|el| cell(&el.value, el.state)).collect();
        out.push_str(&format!("\n       {}", cells.join(" ")));
    }
    for pointer in &frame.pointers {
        out.push_str(&format!("  {}@{}", pointer.name, pointer.index));
    }
    if !frame.variables.is_empty() {
        let vars: Vec<_> = frame
            .variables
            .iter()
            .map(|v| format!("{}={}", v.name, v.value))
            .collect();
        out.push_str(&format!("\n       {}", vars.join(", ")));
    }
    out
}

// ============================================================================
// Main
// ============================================================================

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(env_filter).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let mut args = std::env::args().skip(1);
    let trace = match args.next() {
        Some(path) => {
            let json = std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
            TraceFile::parse(&json)?
        }
        None => TraceFile::parse(TWO_SUM)?,
    };
    let speed = match args.next() {
        Some(raw) => Speed::new(raw.parse().context("speed must be a number")?)?,
        None => Speed::NORMAL,
    };

    let TraceFile { metadata, steps } = trace;
    if steps.is_empty() {
        bail!("trace {} has no steps to play", metadata.problem_id);
    }
    println!("{} ({})", metadata.title, metadata.algorithm);
    if let Some(complexity) = &metadata.complexity {
        println!("complexity: {complexity}");
    }

    let mut store = PlaybackStore::with_config(PlaybackConfig {
        speed,
        ..PlaybackConfig::default()
    });
    info!(problem = %metadata.problem_id, steps = steps.length(), %speed, "loading trace");
    store.load(steps, Some(metadata))?;

    let mut rx = store.subscribe();
    let mut shown = {
        let snap = rx.borrow_and_update();
        if let Some(step) = snap.current_step() {
            println!("{}", render(step, snap.total_steps()));
        }
        snap.current_index
    };

    store.play();
    loop {
        tokio::select! {
            changed = rx.changed() => changed?,
            _ = tokio::signal::ctrl_c() => {
                store.pause();
                info!("interrupted");
                break;
            }
        }

        let snap = rx.borrow_and_update().clone();
        if snap.current_index != shown {
            if let Some(step) = snap.current_step() {
                println!("{}", render(step, snap.total_steps()));
            }
            shown = snap.current_index;
        }
        if snap.is_complete && !snap.is_playing {
            println!("done");
            break;
        }
    }

    Ok(())
}
