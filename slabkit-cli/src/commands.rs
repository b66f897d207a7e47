use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{ensure, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use slabkit_config::{SlabkitConfig, MAX_BOARD_SIZE};
use slabkit_core::alloc::{AllocationTracker, Arena, SeqVec, TrackedStrategy};
use slabkit_search::{
    CspSolver, DfsSolver, HillClimber, ResultsCsv, Routine, SearchContext,
};
use slabkit_telemetry::logging::EventLogger;
use slabkit_telemetry::metrics::MetricsRecorder;

#[derive(Parser)]
#[command(name = "slabkit", version, about)]
pub struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print Prometheus metrics for the session on exit
    #[arg(long, global = true)]
    pub metrics: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Min-conflicts hill climbing
    HillClimb(RunArgs),
    /// Backtracking CSP solver with MRV, LCV and forward checking
    Csp(RunArgs),
    /// Blind DFS counting every solution
    Dfs(RunArgs),
    /// All three routines, one after another
    All(RunArgs),
    /// Tracker and arena walkthrough with an intentional leak
    Demo(DemoArgs),
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Board sizes, comma separated; defaults to the configured list
    #[arg(long, value_delimiter = ',')]
    pub sizes: Vec<usize>,

    /// Directory for result CSVs and reports
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,

    /// Enable allocation tracking and write memory reports
    #[arg(long)]
    pub track: bool,

    /// Seed for hill climbing
    #[arg(long)]
    pub seed: Option<u64>,

    /// Step limit for hill climbing
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Node budget for DFS (0 removes the limit)
    #[arg(long)]
    pub node_limit: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Directory for the demo reports
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => SlabkitConfig::load_from_path(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => SlabkitConfig::load().context("failed to load configuration")?,
    };
    let metrics = MetricsRecorder::new().context("failed to register metrics")?;

    match cli.command {
        Commands::HillClimb(args) => run_routines(&[Routine::HillClimb], &args, &config, &metrics)?,
        Commands::Csp(args) => run_routines(&[Routine::Csp], &args, &config, &metrics)?,
        Commands::Dfs(args) => run_routines(&[Routine::Dfs], &args, &config, &metrics)?,
        Commands::All(args) => run_routines(&Routine::ALL, &args, &config, &metrics)?,
        Commands::Demo(args) => run_demo(&args.out, &config, &metrics)?,
    }

    if cli.metrics {
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

fn build_tracker(config: &SlabkitConfig) -> Arc<AllocationTracker> {
    let settings = &config.memory.tracker;
    let tracker = Arc::new(AllocationTracker::with_stack_depth(settings.max_stack_depth));
    tracker.set_capture_stacks(settings.capture_stacks);
    tracker.enable();
    if !tracker.is_enabled() {
        warn!("built without the `tracking` feature; no memory reports will be written");
    }
    tracker
}

pub fn run_routines(
    routines: &[Routine],
    args: &RunArgs,
    config: &SlabkitConfig,
    metrics: &MetricsRecorder,
) -> anyhow::Result<()> {
    let sizes = if args.sizes.is_empty() {
        config.search.board_sizes.clone()
    } else {
        args.sizes.clone()
    };
    ensure!(
        sizes.iter().all(|&n| (1..=MAX_BOARD_SIZE).contains(&n)),
        "board sizes must lie in 1..={MAX_BOARD_SIZE}"
    );

    let mut ctx = SearchContext::new(&config.memory);
    let tracker = (args.track || config.memory.tracker.enabled).then(|| build_tracker(config));
    if let Some(tracker) = &tracker {
        ctx = ctx.with_tracker(
            Arc::clone(tracker),
            args.out.join(&config.memory.tracker.report_dir),
        );
    }

    let seed = args.seed.or(config.search.seed);
    let max_steps = args.max_steps.unwrap_or(config.search.hill_climb_max_steps);
    let node_limit = match args.node_limit {
        Some(0) => None,
        Some(limit) => Some(limit),
        None => config.search.dfs_node_limit,
    };

    for &routine in routines {
        let mut csv = ResultsCsv::create(&args.out, routine)?;
        info!(%routine, sizes = ?sizes, "starting");

        match routine {
            Routine::HillClimb => {
                let mut climber = HillClimber::new(&ctx, max_steps, seed)?;
                for &n in &sizes {
                    let outcome = climber.run(n)?;
                    let seconds = outcome.elapsed.as_secs_f64();
                    csv.record(n, seconds, 0)?;
                    let verdict = if outcome.solved { "success" } else { "failed" };
                    EventLogger::log_run(routine.name(), n, seconds, verdict);
                    metrics.observe_run(routine.name(), seconds);
                }
            }
            Routine::Csp => {
                let mut solver = CspSolver::new(&ctx)?;
                for &n in &sizes {
                    let outcome = solver.run(n)?;
                    let seconds = outcome.elapsed.as_secs_f64();
                    csv.record(n, seconds, 0)?;
                    let verdict = if outcome.solved { "solved" } else { "no solution" };
                    EventLogger::log_run(routine.name(), n, seconds, verdict);
                    metrics.observe_run(routine.name(), seconds);
                }
            }
            Routine::Dfs => {
                let mut solver = DfsSolver::new(&ctx, node_limit)?;
                for &n in &sizes {
                    let outcome = solver.run(n)?;
                    let seconds = outcome.elapsed.as_secs_f64();
                    csv.record(n, seconds, outcome.solutions)?;
                    let verdict = if outcome.completed {
                        format!("{} solutions", outcome.solutions)
                    } else {
                        format!("{}+ solutions, node budget exhausted", outcome.solutions)
                    };
                    EventLogger::log_run(routine.name(), n, seconds, &verdict);
                    metrics.observe_run(routine.name(), seconds);
                }
            }
        }

        let path = csv.finish()?;
        info!(%routine, "results saved to {}", path.display());
        if let Some(path) = ctx.write_leak_report(routine)? {
            info!(%routine, "leak report saved to {}", path.display());
        }
    }

    metrics.record_stats(&ctx.stats().snapshot());
    if let Some(tracker) = &tracker {
        metrics.record_tracker(&tracker.snapshot());
    }
    Ok(())
}

/// Tracked allocations with one deliberate leak, usage and leak reports, then an
/// arena fill and reset.
pub fn run_demo(out: &Path, config: &SlabkitConfig, metrics: &MetricsRecorder) -> anyhow::Result<()> {
    std::fs::create_dir_all(out)
        .with_context(|| format!("failed to create {}", out.display()))?;

    info!("=== Memory Tracking Test ===");
    let tracker = build_tracker(config);
    tracker.reset();
    {
        let strategy = TrackedStrategy::new(&tracker);
        let ints = SeqVec::<i32, _>::with_capacity_in(100, strategy)?;
        let doubles = SeqVec::<f64, _>::with_capacity_in(50, TrackedStrategy::new(&tracker))?;
        let buffer = tracker.track_alloc(1024)?;

        info!(
            usage = tracker.current_usage(),
            count = tracker.allocation_count(),
            "three tracked allocations live"
        );
        drop(ints);
        drop(doubles);
        info!(usage = tracker.current_usage(), "after releasing two of them");

        let report = out.join("test_memory_report.txt");
        let leaks = out.join("test_memory_leaks.txt");
        tracker.write_report(&report)?;
        // The 1024-byte buffer is still live here and shows up as a leak.
        tracker.write_leak_report(&leaks)?;
        info!("check {} and {}", report.display(), leaks.display());

        metrics.record_tracker(&tracker.snapshot());
        // SAFETY: buffer came from track_alloc(1024) on this tracker.
        unsafe { tracker.track_free(buffer, 1024) };
    }
    tracker.disable();

    info!("=== Arena Allocator Test ===");
    let mut arena = Arena::new(1024);
    {
        let ints: Vec<i32> = (0..10).map(|i| i * 2).collect();
        let doubles: Vec<f64> = (0..5i32).map(|i| f64::from(i) * 1.5).collect();
        arena.alloc_slice_copy(&ints)?;
        arena.alloc_slice_copy(&doubles)?;
    }
    info!(
        total = arena.total_memory(),
        used = arena.used_memory(),
        wasted = arena.wasted_memory(),
        "arena after two slices"
    );
    arena.reset();
    info!(used = arena.used_memory(), "arena after reset");

    info!("all demo steps completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(out: &Path, sizes: Vec<usize>) -> RunArgs {
        RunArgs {
            sizes,
            out: out.to_path_buf(),
            track: false,
            seed: Some(1),
            max_steps: Some(2_000),
            node_limit: None,
        }
    }

    #[test]
    fn test_cli_parses_sizes() {
        let cli = Cli::try_parse_from(["slabkit", "dfs", "--sizes", "4,5,6", "--track"]).unwrap();
        match cli.command {
            Commands::Dfs(args) => {
                assert_eq!(args.sizes, vec![4, 5, 6]);
                assert!(args.track);
                assert_eq!(args.out, PathBuf::from("."));
            }
            _ => panic!("expected dfs"),
        }
    }

    #[test]
    fn test_all_routines_write_csvs() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = MetricsRecorder::new().unwrap();
        let config = SlabkitConfig::default();

        run_routines(&Routine::ALL, &run_args(dir.path(), vec![4, 6]), &config, &metrics).unwrap();

        let dfs = std::fs::read_to_string(dir.path().join("nqueens_dfs_results.csv")).unwrap();
        let lines: Vec<_> = dfs.lines().collect();
        assert_eq!(lines[0], "N,Time(seconds),Solutions");
        assert!(lines[1].starts_with("4,") && lines[1].ends_with(",2"));
        assert!(lines[2].starts_with("6,") && lines[2].ends_with(",4"));
        assert!(dir.path().join("nqueens_csp_results.csv").exists());
        assert!(dir.path().join("nqueens_hillclimbing_results.csv").exists());

        let text = metrics.gather_metrics().unwrap();
        assert!(text.contains("slabkit_search_duration_seconds_count{routine=\"dfs\"} 2"));
    }

    #[test]
    fn test_tracked_run_writes_reports() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = MetricsRecorder::new().unwrap();
        let config = SlabkitConfig::default();
        let mut args = run_args(dir.path(), vec![5]);
        args.track = true;

        run_routines(&[Routine::Dfs], &args, &config, &metrics).unwrap();

        let reports = dir.path().join("reports");
        assert!(reports.join("dfs_memory_N5.txt").exists());
        assert!(reports.join("dfs_final_leaks.txt").exists());
    }

    #[test]
    fn test_out_of_range_sizes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = MetricsRecorder::new().unwrap();
        let err = run_routines(
            &[Routine::Dfs],
            &run_args(dir.path(), vec![0]),
            &SlabkitConfig::default(),
            &metrics,
        )
        .unwrap_err();
        assert!(err.to_string().contains("board sizes"));
    }

    #[test]
    fn test_demo_reports_the_leak() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = MetricsRecorder::new().unwrap();
        run_demo(dir.path(), &SlabkitConfig::default(), &metrics).unwrap();

        let leaks = std::fs::read_to_string(dir.path().join("test_memory_leaks.txt")).unwrap();
        assert!(leaks.contains("Total Leaks: 1"));
        assert!(leaks.contains("Size: 1024 bytes"));
        assert!(dir.path().join("test_memory_report.txt").exists());
    }
}
