//! `qmm`: loads two Matrix Market operands, multiplies them under a selectable semiring,
//! and reports per-phase timings — the CLI/config/diagnostics layer (C16).

use clap::{Args, Parser, Subcommand, ValueEnum};
use qmm_core::semiring::{MinPlus, OrAnd, PlusTimes, Semiring};
use qmm_core::{CollectWarnings, Config, Index, Matrix, Shape};
use qmm_mtx::{read_coordinate_f64_with_sink, write_coordinate_from_tuples};
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(name = "qmm", about = "Recursive quadtree sparse matrix multiply", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Multiply two Matrix Market coordinate files under a chosen semiring.
    Multiply(MultiplyArgs),
}

#[derive(Args, Debug)]
struct MultiplyArgs {
    /// Left operand (.mtx, coordinate format)
    a: PathBuf,
    /// Right operand (.mtx, coordinate format)
    b: PathBuf,

    #[arg(long, value_enum, default_value_t = SemiringArg::PlusTimes)]
    semiring: SemiringArg,

    /// Write the result to this path as Matrix Market coordinate format.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print a coarse ASCII density plot of the result (bucketed into at most 64x64 cells).
    #[arg(long)]
    spy: bool,

    #[arg(long)]
    leaf_split_threshold: Option<usize>,
    #[arg(long)]
    dense_max_count: Option<usize>,
    #[arg(long)]
    dense_max_bytes: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SemiringArg {
    PlusTimes,
    MinPlus,
    OrAnd,
}

impl std::fmt::Display for SemiringArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SemiringArg::PlusTimes => "plus-times",
            SemiringArg::MinPlus => "min-plus",
            SemiringArg::OrAnd => "or-and",
        };
        f.write_str(s)
    }
}

fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.3}s")
    } else if secs >= 1e-3 {
        format!("{:.3}ms", secs * 1e3)
    } else if secs >= 1e-6 {
        format!("{:.3}us", secs * 1e6)
    } else {
        format!("{}ns", d.as_nanos())
    }
}

fn print_timing_breakdown(stages: &[(&str, Duration)], total_elapsed: Duration) {
    let accounted_secs = stages.iter().map(|(_, d)| d.as_secs_f64()).sum::<f64>();
    let total_secs = total_elapsed.as_secs_f64();

    println!();
    println!(
        "timing breakdown (accounted {}, total {}):",
        fmt_duration(Duration::from_secs_f64(accounted_secs)),
        fmt_duration(total_elapsed)
    );
    for (name, dur) in stages {
        let pct = if total_secs > 0.0 {
            (dur.as_secs_f64() / total_secs) * 100.0
        } else {
            0.0
        };
        println!("  {name:<18} {:>12} ({pct:>6.2}%)", fmt_duration(*dur));
    }
    let other_secs = (total_secs - accounted_secs).max(0.0);
    let other_pct = if total_secs > 0.0 { (other_secs / total_secs) * 100.0 } else { 0.0 };
    println!(
        "  {:<18} {:>12} ({other_pct:>6.2}%)",
        "other_overhead",
        fmt_duration(Duration::from_secs_f64(other_secs))
    );
}

fn print_matrix_stats(label: &str, path: &PathBuf, shape: Shape, nnn: usize) {
    println!("{label}: {}", path.display());
    println!("  dim: {} x {}", shape.nrows, shape.ncols);
    println!("  nnn: {nnn}");
}

fn load(path: &PathBuf, warnings: &mut CollectWarnings) -> (Shape, Vec<(Index, Index, f64)>) {
    match read_coordinate_f64_with_sink(path, warnings) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("failed to load {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

fn config_from_args(args: &MultiplyArgs) -> Config {
    let mut config = Config::default();
    if let Some(v) = args.leaf_split_threshold {
        config.leaf_split_threshold = v;
    }
    if let Some(v) = args.dense_max_count {
        config.dense_spa_max_count = v;
    }
    if let Some(v) = args.dense_max_bytes {
        config.dense_spa_max_bytes = v;
    }
    config
}

/// Builds both operands, multiplies them under `semiring`, and returns the result's shape
/// and tuples (already mapped back to `f64` via `out_map`). Generic over the semiring's
/// own value type `T` so `--semiring or-and` can multiply over `bool` while everything
/// else in the CLI stays in terms of the `f64` the Matrix Market format speaks.
fn run_with<T, S>(
    args: &MultiplyArgs,
    semiring: S,
    in_map: impl Fn(f64) -> T,
    out_map: impl Fn(T) -> f64,
    stages: &mut Vec<(&'static str, Duration)>,
) -> (Shape, Vec<(Index, Index, f64)>)
where
    T: Copy,
    S: Semiring<T>,
{
    let mut warnings = CollectWarnings::default();

    let t = Instant::now();
    let (shape_a, tuples_a) = load(&args.a, &mut warnings);
    stages.push(("load_a", t.elapsed()));

    let t = Instant::now();
    let (shape_b, tuples_b) = load(&args.b, &mut warnings);
    stages.push(("load_b", t.elapsed()));

    print_matrix_stats("A", &args.a, shape_a, tuples_a.len());
    print_matrix_stats("B", &args.b, shape_b, tuples_b.len());

    let config = config_from_args(args);

    let t = Instant::now();
    let a: Matrix<T> = Matrix::from_tuples(
        shape_a,
        tuples_a.len(),
        tuples_a.into_iter().map(|(r, c, v)| (r, c, in_map(v))),
        &config,
    );
    stages.push(("build_tree_a", t.elapsed()));

    let t = Instant::now();
    let b: Matrix<T> = Matrix::from_tuples(
        shape_b,
        tuples_b.len(),
        tuples_b.into_iter().map(|(r, c, v)| (r, c, in_map(v))),
        &config,
    );
    stages.push(("build_tree_b", t.elapsed()));

    let t = Instant::now();
    let c = match qmm_core::multiply(&a, &b, &semiring, &config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("multiply failed: {e}");
            print_timing_breakdown(stages, Duration::default());
            print_warning_summary(&warnings);
            std::process::exit(1);
        }
    };
    stages.push(("multiply", t.elapsed()));

    print_warning_summary(&warnings);

    let shape = c.shape();
    let tuples: Vec<(Index, Index, f64)> = c.dump_tuples().into_iter().map(|(r, col, v)| (r, col, out_map(v))).collect();
    (shape, tuples)
}

fn print_warning_summary(warnings: &CollectWarnings) {
    if !warnings.warnings.is_empty() {
        println!("warnings: {} input row(s) skipped", warnings.warnings.len());
    }
}

fn run_multiply(args: &MultiplyArgs) {
    let total_start = Instant::now();
    let mut stages: Vec<(&str, Duration)> = Vec::new();

    let (shape, tuples) = match args.semiring {
        SemiringArg::PlusTimes => run_with(args, PlusTimes, |v| v, |v| v, &mut stages),
        SemiringArg::MinPlus => run_with(args, MinPlus, |v| v, |v| v, &mut stages),
        SemiringArg::OrAnd => run_with(args, OrAnd, |v| v != 0.0, |v| if v { 1.0 } else { 0.0 }, &mut stages),
    };

    println!();
    println!("result: {} x {}, nnn={}", shape.nrows, shape.ncols, tuples.len());

    if args.spy {
        print!("{}", qmm_core::pretty::spy_plot(shape, tuples.iter().copied()));
    }

    if let Some(output) = &args.output {
        let t = Instant::now();
        if let Err(e) = write_coordinate_from_tuples(output, shape, &tuples) {
            eprintln!("failed to write {}: {e}", output.display());
            stages.push(("write_output", t.elapsed()));
            print_timing_breakdown(&stages, total_start.elapsed());
            std::process::exit(1);
        }
        stages.push(("write_output", t.elapsed()));
    }

    print_timing_breakdown(&stages, total_start.elapsed());
}

fn main() {
    let cli = Cli::parse();
    match cli.command {
        Command::Multiply(args) => run_multiply(&args),
    }
}
