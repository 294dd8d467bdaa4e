//! Gammon-MCTS: a backgammon engine with multi-agent MCTS.
//!
//! ## Usage
//!
//! - `gammon-mcts` - Show a demo
//! - `gammon-mcts legal --dice 3 5` - List legal plays from the opening
//! - `gammon-mcts play --a mcts --b running --games 10` - Run matches
//! - `gammon-mcts replay match.json` - Print every position of a saved match

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use gammon_mcts::agent::{AgentKind, build_agent};
use gammon_mcts::config::{EngineConfig, load_from_path};
use gammon_mcts::game::{MatchRecord, play_match};
use gammon_mcts::mcts::Search;
use gammon_mcts::movegen::legal_actions;
use gammon_mcts::position::{Position, Side};
use gammon_mcts::scoring::pip_score;
use gammon_mcts::value;

/// Gammon-MCTS: backgammon with multi-agent Monte Carlo Tree Search
#[derive(Parser)]
#[command(name = "gammon-mcts")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// TOML file with [search] and [game] settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the opening position and show the result
    Demo {
        /// Thinking time in milliseconds
        #[arg(long, default_value_t = 500)]
        millis: u64,
    },
    /// Print every legal play for a roll from the opening position
    Legal {
        #[arg(long, required = true, num_args = 2, value_parser = clap::value_parser!(u8).range(1..=6))]
        dice: Vec<u8>,
    },
    /// Play matches between two agents
    Play {
        /// Agent for side A
        #[arg(long, value_enum, default_value_t = AgentKind::Mcts)]
        a: AgentKind,
        /// Agent for side B
        #[arg(long, value_enum, default_value_t = AgentKind::Running)]
        b: AgentKind,
        #[arg(long, default_value_t = 1)]
        games: u32,
        #[arg(long)]
        seed: Option<u64>,
        /// Directory for JSON match records
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the positions of a saved match
    Replay { path: PathBuf },
}

fn init_tracing(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = match &cli.config {
        Some(path) => load_from_path(path)?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Some(Commands::Demo { millis }) => run_demo(&config, millis),
        None => run_demo(&config, 500),
        Some(Commands::Legal { dice }) => run_legal([dice[0], dice[1]]),
        Some(Commands::Play {
            a,
            b,
            games,
            seed,
            output,
        }) => run_play(config, a, b, games, seed, output.as_deref()),
        Some(Commands::Replay { path }) => run_replay(&path),
    }
}

fn run_demo(config: &EngineConfig, millis: u64) -> Result<()> {
    println!("Gammon-MCTS: backgammon with multi-agent MCTS\n");

    let mut rng = fastrand::Rng::with_seed(config.game.seed.unwrap_or(1));
    let pos = Position::new_game(&mut rng);
    println!("{pos}\n");
    println!(
        "Pips: A {}  B {}",
        pip_score(&pos, Side::A),
        pip_score(&pos, Side::B)
    );
    println!("Legal plays: {}", legal_actions(&pos).len());

    println!("\nSearching for {millis} ms...");
    let leaf_value = value::from_kind(config.search.leaf_value);
    let mut search = Search::new(&pos, &config.search, leaf_value.as_ref());
    let deadline = Instant::now() + Duration::from_millis(millis);
    let result = search.run(deadline, &mut rng)?;
    println!("Best play: {}", result.action);
    println!(
        "Iterations: {}  Nodes: {}",
        result.iterations, result.nodes
    );
    Ok(())
}

fn run_legal(dice: [u8; 2]) -> Result<()> {
    let pos = Position::starting(dice)?;
    let actions = legal_actions(&pos);
    println!("{} legal plays for {} {}:", actions.len(), dice[0], dice[1]);
    for action in actions {
        println!("  {action}");
    }
    Ok(())
}

fn run_play(
    mut config: EngineConfig,
    a: AgentKind,
    b: AgentKind,
    games: u32,
    seed: Option<u64>,
    output: Option<&Path>,
) -> Result<()> {
    let seed = seed
        .or(config.game.seed)
        .unwrap_or_else(|| fastrand::Rng::new().u64(..));
    config.game.seed = Some(seed);
    let mut rng = fastrand::Rng::with_seed(seed);

    if let Some(dir) = output {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let mut wins = [0u32; 2];
    for game in 0..games {
        let mut agents = [build_agent(a, &config), build_agent(b, &config)];
        let record = play_match(&mut agents, &config.game, &mut rng)?;
        if let Some(winner) = record.winner {
            wins[winner.index()] += 1;
        }
        if let Some(dir) = output {
            record.save(&dir.join(format!("match-{game}.json")))?;
        }
    }

    info!(seed, games, ?wins, "all matches finished");
    println!("{a:?} (A) {} - {} {b:?} (B)", wins[0], wins[1]);
    Ok(())
}

fn run_replay(path: &Path) -> Result<()> {
    let record = MatchRecord::load(path)?;
    let positions = record
        .replay()
        .with_context(|| format!("history in {} does not replay", path.display()))?;
    for (pos, turn) in positions.iter().zip(&record.turns) {
        println!("{pos}");
        println!("Turn {} ({}): {}\n", turn.turn, turn.side, turn.action);
    }
    if let Some(last) = positions.last() {
        println!("{last}");
    }
    match record.winner {
        Some(side) => println!("\nWinner: {side}"),
        None => println!("\nNo winner"),
    }
    Ok(())
}
