//! # Search Driver
//!
//! Runs the planner on one of the bundled games and prints the statistics of
//! the root's children. With `--self-play` the planner plays both sides to
//! the end of the game, reusing the searched subgraph after every move.

use clap::{Parser, ValueEnum};
use colored::Colorize;
use log::info;
use mcts::games::nim::{NimModel, NimRule};
use mcts::games::tictactoe::{TicTacToeModel, TicTacToeState};
use mcts::{BestActionCriterion, Budget, ChildStats, GameModel, Mcts, SearchConfig, SearchStatistics};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum GameKind {
    Nim,
    #[value(name = "tictactoe")]
    TicTacToe,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Criterion {
    MostVisited,
    HighestAverage,
}

impl From<Criterion> for BestActionCriterion {
    fn from(criterion: Criterion) -> Self {
        match criterion {
            Criterion::MostVisited => BestActionCriterion::MostVisited,
            Criterion::HighestAverage => BestActionCriterion::HighestAverageValue,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game to search
    #[arg(short, long, value_enum, default_value_t = GameKind::Nim)]
    game: GameKind,

    /// Starting heap size for Nim
    #[arg(long, default_value_t = 5)]
    objects: u32,

    /// Most objects a Nim move may take
    #[arg(long, default_value_t = 2)]
    max_take: u32,

    /// Play Nim under misère rules (last mover loses)
    #[arg(long, action = clap::ArgAction::SetTrue)]
    misere: bool,

    /// Iterations per search (default: 10,000 unless --time-ms is given)
    #[arg(short = 'i', long)]
    iterations: Option<u64>,

    /// Wall-clock budget per search in milliseconds
    #[arg(long)]
    time_ms: Option<u64>,

    /// UCB1 exploration constant
    #[arg(short = 'e', long, default_value_t = std::f64::consts::SQRT_2)]
    exploration: f64,

    /// Worker threads; 0 uses every CPU
    #[arg(short = 'n', long, default_value_t = 1)]
    threads: usize,

    /// Seed of the iteration random number generators
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,

    /// How the move is picked once the search is over
    #[arg(long, value_enum, default_value_t = Criterion::MostVisited)]
    criterion: Criterion,

    /// Keep playing both sides until the game ends
    #[arg(long, action = clap::ArgAction::SetTrue)]
    self_play: bool,

    /// Write the node and edge tables of the last search as JSON
    #[arg(long)]
    dump: Option<std::path::PathBuf>,
}

impl Args {
    fn search_config(&self) -> SearchConfig {
        let budget = match (self.iterations, self.time_ms.map(Duration::from_millis)) {
            (Some(iterations), Some(time)) => Budget::Both { iterations, time },
            (None, Some(time)) => Budget::Time(time),
            (Some(iterations), None) => Budget::Iterations(iterations),
            (None, None) => Budget::Iterations(10_000),
        };
        let threads = if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        };
        SearchConfig::default()
            .with_budget(budget)
            .with_exploration(self.exploration)
            .with_threads(threads)
            .with_seed(self.seed)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = args.search_config();
    info!("search configuration: {:?}", config);

    match args.game {
        GameKind::Nim => {
            let rule = if args.misere {
                NimRule::Misere
            } else {
                NimRule::Normal
            };
            run(NimModel::new(args.max_take, rule), NimModel::start(args.objects), config, &args)
        }
        GameKind::TicTacToe => run(TicTacToeModel, TicTacToeState::new(), config, &args),
    }
}

fn run<M>(model: M, start: M::State, config: SearchConfig, args: &Args) -> Result<(), Box<dyn Error>>
where
    M: GameModel,
    M::State: fmt::Display,
    M::Action: fmt::Display + Serialize,
    M::Key: Serialize,
{
    let criterion = args.criterion.into();
    let mut search = Mcts::new(model, start, config)?;

    if search.root_is_terminal() {
        println!("{}", search.root_state());
        println!("{}", "The game is already over.".yellow());
        return Ok(());
    }

    loop {
        let state = search.root_state();
        println!("{}", state);
        let player = search.model().player_to_move(&state);

        let stats = search.search()?;
        print_stats(&stats);
        let action = search.best_action(criterion)?;
        print_children(&search.root_children_stats()?, &action);
        if let Some(path) = &args.dump {
            dump(&search, path)?;
        }

        println!("{:?} plays {}\n", player, action.to_string().bold());
        if !args.self_play {
            break;
        }
        search.advance_root(&action)?;

        if search.root_is_terminal() {
            let last = search.root_state();
            println!("{}", last);
            let utility = search.model().terminal_utility(&last, player);
            let verdict = if utility > 0.0 {
                format!("{:?} wins", player).green()
            } else if utility < 0.0 {
                format!("{:?} loses", player).red()
            } else {
                "Draw".yellow()
            };
            println!("Game over: {}", verdict.bold());
            break;
        }
    }
    Ok(())
}

fn print_stats(stats: &SearchStatistics) {
    let secs = stats.elapsed.as_secs_f64().max(f64::EPSILON);
    println!("Search Results:");
    println!("  Iterations: {} ({:?})", stats.iterations, stats.stop);
    println!("  Time: {:.3}s", secs);
    println!("  SPS: {:.0} sims/sec", stats.iterations as f64 / secs);
    println!("  Root Visits: {}", stats.root_visits);
    println!("  Nodes / Edges: {} / {}", stats.total_nodes, stats.total_edges);
    if stats.model_errors > 0 {
        println!("  {}", format!("Model errors: {}", stats.model_errors).red());
    }
}

fn print_children<A: fmt::Display + PartialEq>(children: &[ChildStats<A>], chosen: &A) {
    println!("  {:<10} {:>9} {:>9} {:>9}", "action", "visits", "average", "ucb");
    for child in children {
        let average = child
            .average
            .map_or_else(|| "-".to_string(), |a| format!("{:+.3}", a));
        let ucb = if child.ucb.is_finite() {
            format!("{:+.3}", child.ucb)
        } else {
            "inf".to_string()
        };
        let line = format!(
            "  {:<10} {:>9} {:>9} {:>9}",
            child.action.to_string(),
            child.visits,
            average,
            ucb
        );
        if &child.action == chosen {
            println!("{}", line.green().bold());
        } else {
            println!("{}", line);
        }
    }
}

fn dump<M>(search: &Mcts<M>, path: &Path) -> Result<(), Box<dyn Error>>
where
    M: GameModel,
    M::Action: Serialize,
    M::Key: Serialize,
{
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &search.export_tables()?)?;
    info!("wrote search graph tables to {}", path.display());
    Ok(())
}
