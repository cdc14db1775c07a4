//! TILEFALL headless driver
//!
//! Plays games unattended with a move picker, logging every turn and writing
//! the event stream to a JSON-lines journal next to the log file.

use anyhow::{Context, bail};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;
use tilefall::{
    AnimationConfig, BurnStep, DropStep, EventBus, EventKind, GameConfig, GameEvent, MovePicker,
    Presenter, RefillStep, RenderError, Renderer, Snapshot, TurnOutcome,
};
use tracing::{debug, info, trace, warn};

/// Animations play this many times faster than configured
const PLAYBACK_SPEEDUP: f64 = 20.0;

/// Command line options
#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    seed: Option<u64>,
    games: u32,
    picker: MovePicker,
    write_config: bool,
}

const USAGE: &str =
    "usage: tilefall [--config PATH] [--seed N] [--games N] [--picker largest|smallest|first] [--write-config]";

impl Options {
    fn parse(mut args: impl Iterator<Item = String>) -> anyhow::Result<Option<Self>> {
        let mut options = Options {
            games: 1,
            ..Options::default()
        };
        while let Some(arg) = args.next() {
            let mut value = |name: &str| args.next().with_context(|| format!("{name} needs a value"));
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--seed" => {
                    options.seed = Some(value("--seed")?.parse().context("--seed must be a number")?)
                }
                "--games" => {
                    options.games = value("--games")?.parse().context("--games must be a number")?;
                    if options.games == 0 {
                        bail!("--games must be at least 1");
                    }
                }
                "--picker" => options.picker = value("--picker")?.parse()?,
                "--write-config" => options.write_config = true,
                "-h" | "--help" => return Ok(None),
                other => bail!("unknown argument: {other}\n{USAGE}"),
            }
        }
        Ok(Some(options))
    }
}

/// Get the tilefall temp directory, creating it if needed
fn tilefall_temp_dir() -> PathBuf {
    let dir = std::env::temp_dir().join("tilefall");
    let _ = std::fs::create_dir_all(&dir);
    dir
}

/// Renderer that logs each tile and waits out a scaled-down animation
#[derive(Debug)]
struct LogRenderer {
    burn: Duration,
    drop: Duration,
}

impl LogRenderer {
    fn new(animation: &AnimationConfig) -> Self {
        Self {
            burn: animation.burn().div_f64(PLAYBACK_SPEEDUP),
            drop: animation.drop().div_f64(PLAYBACK_SPEEDUP),
        }
    }
}

impl Renderer for LogRenderer {
    fn show_snapshot(&self, snapshot: &Snapshot) {
        debug!("board:\n{}", snapshot);
    }

    async fn burn_tile(&self, step: BurnStep) -> Result<(), RenderError> {
        trace!(tile = step.tile.id, at = %step.position, "burn");
        tokio::time::sleep(self.burn).await;
        Ok(())
    }

    async fn drop_tile(&self, step: DropStep) -> Result<(), RenderError> {
        trace!(tile = step.tile.id, from = %step.from, to = %step.to, "drop");
        tokio::time::sleep(self.drop).await;
        Ok(())
    }

    async fn refill_tile(&self, step: RefillStep) -> Result<(), RenderError> {
        trace!(tile = step.tile.id, from = %step.from, to = %step.to, "refill");
        tokio::time::sleep(step.delay.div_f64(PLAYBACK_SPEEDUP) + self.drop).await;
        Ok(())
    }
}

/// Result of one unattended game
#[derive(Debug)]
struct GameSummary {
    score: u64,
    won: bool,
    turns: u32,
    moves_left: u32,
}

fn main() -> anyhow::Result<()> {
    let Some(options) = Options::parse(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };

    // Generate session ID for this run
    let session_id: u32 = rand::random();

    // Setup tilefall temp directory for logs and journals
    let tilefall_dir = tilefall_temp_dir();
    let log_file = format!("{:08x}.log", session_id);

    // Setup tracing to log file
    let file_appender = tracing_appender::rolling::never(&tilefall_dir, &log_file);
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tilefall=debug".parse().context("bad log directive")?),
        )
        .with_ansi(false)
        .init();

    info!(
        "TILEFALL starting up, session={:08x}, log={}",
        session_id,
        tilefall_dir.join(&log_file).display()
    );

    // Load settings
    let config = match &options.config {
        Some(path) => GameConfig::load_from(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => GameConfig::load(),
    };

    if options.write_config {
        let path = match &options.config {
            Some(path) => {
                config.save_to(path)?;
                path.clone()
            }
            None => config.save().context("failed to save settings")?,
        };
        println!("Settings written to {}", path.display());
        return Ok(());
    }

    let journal_path = tilefall_dir.join(format!("{:08x}.events.jsonl", session_id));
    let journal = File::create(&journal_path)
        .with_context(|| format!("failed to create {}", journal_path.display()))?;
    let journal = Rc::new(RefCell::new(BufWriter::new(journal)));

    let events = Rc::new(EventBus::new());
    {
        let journal = Rc::clone(&journal);
        events.subscribe_all(move |event| {
            writeln!(journal.borrow_mut(), "{}", event.to_json_line())?;
            Ok(())
        });
    }
    events.subscribe(EventKind::GameEnded, |event| {
        if let GameEvent::GameEnded { won } = event {
            info!(won, "game ended");
        }
        Ok(())
    });

    let renderer = Arc::new(LogRenderer::new(&config.animation));
    let mut presenter = Presenter::from_config(&config, options.seed, renderer, Rc::clone(&events))
        .context("failed to set up game")?;

    // Create async runtime for the animation tasks
    let runtime = tokio::runtime::Runtime::new().context("failed to create async runtime")?;
    let summaries = runtime.block_on(play_games(&mut presenter, &options));

    journal.borrow_mut().flush().context("failed to flush event journal")?;

    println!("\nTILEFALL: {} game(s) with the {} picker", summaries.len(), options.picker.name());
    for (i, summary) in summaries.iter().enumerate() {
        println!(
            "Game {}: {} | Score: {} | Turns: {} | Moves left: {}",
            i + 1,
            if summary.won { "won" } else { "lost" },
            summary.score,
            summary.turns,
            summary.moves_left
        );
    }
    let wins = summaries.iter().filter(|s| s.won).count();
    println!("Wins: {}/{} (target {})", wins, summaries.len(), config.scoring.target_score);
    println!("Events: {}", journal_path.display());

    Ok(())
}

async fn play_games(presenter: &mut Presenter<LogRenderer>, options: &Options) -> Vec<GameSummary> {
    let mut summaries = Vec::new();
    for game in 0..options.games {
        if game == 0 {
            presenter.start();
        } else if !presenter.restart() {
            warn!("restart refused, stopping");
            break;
        }
        summaries.push(play_one(presenter, options.picker).await);
    }
    summaries
}

async fn play_one(presenter: &mut Presenter<LogRenderer>, picker: MovePicker) -> GameSummary {
    let mut turns = 0;
    while presenter.session().can_move() {
        let Some(position) = picker.pick(presenter.session().board()) else {
            break;
        };
        match presenter.select_cell(position).await {
            TurnOutcome::Played { .. } => turns += 1,
            TurnOutcome::Ignored(reason) => {
                warn!(?reason, at = %position, "picked move was ignored");
                break;
            }
        }
    }
    let state = presenter.state();
    GameSummary {
        score: state.score,
        won: state.is_won,
        turns,
        moves_left: state.moves_left,
    }
}
