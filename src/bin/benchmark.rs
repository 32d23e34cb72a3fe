use clap::Parser;
use mcts::games::nim::{NimModel, NimRule};
use mcts::games::tictactoe::{TicTacToeModel, TicTacToeState};
use mcts::{GameModel, Mcts, SearchConfig, SearchStatistics};
use std::error::Error;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Search duration in milliseconds per run (default: 2000)
    #[arg(long, default_value_t = 2000)]
    duration_ms: u64,

    /// Number of threads for the parallel run; 0 uses every CPU
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Heap size of the Nim run (default: 60)
    #[arg(long, default_value_t = 60)]
    objects: u32,

    /// Seed of the iteration random number generators
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let threads = if args.threads == 0 {
        num_cpus::get()
    } else {
        args.threads
    };

    println!("Transposition MCTS - Benchmark Tool");
    println!("===================================");
    println!("Duration: {} ms per run", args.duration_ms);
    println!("Parallel Threads: {}", threads);
    println!("-----------------------------------");

    #[cfg(debug_assertions)]
    println!("WARNING: Running in debug mode. Performance will be significantly lower.\nUse --release for accurate benchmarks.\n");

    let base = SearchConfig::default()
        .with_time(Duration::from_millis(args.duration_ms))
        .with_seed(args.seed);

    for (label, config) in [("Sequential", base.clone()), ("Parallel", base.with_threads(threads))] {
        println!("\nRunning {} Benchmark...", label);
        let stats = bench(TicTacToeModel, TicTacToeState::new(), config.clone())?;
        print_stats(&format!("{} Tic-Tac-Toe", label), &stats);
        let stats = bench(
            NimModel::new(3, NimRule::Normal),
            NimModel::start(args.objects),
            config,
        )?;
        print_stats(&format!("{} Nim", label), &stats);
    }
    Ok(())
}

fn bench<M: GameModel>(model: M, start: M::State, config: SearchConfig) -> Result<SearchStatistics, Box<dyn Error>> {
    let mut search = Mcts::new(model, start, config)?;
    Ok(search.search()?)
}

fn print_stats(name: &str, stats: &SearchStatistics) {
    let secs = stats.elapsed.as_secs_f64().max(f64::EPSILON);
    let nps = stats.total_nodes as f64 / secs;
    let sps = stats.root_visits as f64 / secs;

    println!("{} Results:", name);
    println!("  Total Nodes: {}", stats.total_nodes);
    println!("  Total Edges: {}", stats.total_edges);
    println!("  Time: {:.3}s", secs);
    println!("  NPS: {:.0} nodes/sec", nps);
    println!("  SPS: {:.0} sims/sec", sps);
    println!("  Root Visits: {}", stats.root_visits);
}
