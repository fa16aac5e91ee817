use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use inference_bench::artifact_gen::{self, GenerateConfig};
use inference_bench::backend::BackendRegistry;
use inference_bench::harness::{BenchConfig, Harness, Profile};
use inference_bench::report::ConsoleReport;
use inference_bench::tensor::format_shape;
use inference_bench::{BenchError, TrackingAllocator};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: TrackingAllocator = TrackingAllocator;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Benchmark every artifact in a directory.
    Run {
        /// Directory containing compiled artifacts.
        #[arg(long, value_name = "DIR", default_value = "models")]
        model_dir: PathBuf,

        /// Preset for iteration and warm-up counts.
        #[arg(long, value_enum, default_value_t = ProfileArg::Quick)]
        profile: ProfileArg,

        /// Timed invocations per artifact (overrides the profile).
        #[arg(long)]
        iterations: Option<usize>,

        /// Untimed priming invocations per artifact (overrides the profile).
        #[arg(long)]
        warmup: Option<usize>,

        /// Seed for synthetic inputs.
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Size substituted for an open leading (batch) dimension.
        #[arg(long, default_value_t = 1)]
        batch_size: usize,

        /// Size substituted for open non-batch dimensions.
        ///
        /// Without it, artifacts declaring such dimensions are skipped.
        #[arg(long)]
        dynamic_dim: Option<usize>,

        /// Exclusive upper bound for synthetic integer token ids.
        #[arg(long, default_value_t = 256)]
        int_high: i64,

        /// Skip artifacts whose synthetic input would exceed this size.
        #[arg(long, value_name = "MB", default_value_t = 1024)]
        max_input_mb: u64,

        /// Abort an artifact once one invocation takes longer than this.
        #[arg(long, value_name = "MS")]
        max_invoke_ms: Option<u64>,

        /// Artifact file extension to look for. Can be provided multiple times.
        #[arg(long = "extension", value_name = "EXT", action = clap::ArgAction::Append)]
        extensions: Vec<String>,

        /// Also write a JSON results file.
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },

    /// Write a small deterministic set of demo artifacts.
    Generate {
        /// Output directory for the generated artifacts.
        #[arg(long, short = 'o', value_name = "DIR")]
        output: PathBuf,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Height and width of the image model input.
        #[arg(long, default_value_t = 32)]
        image_size: usize,

        /// Token count of the text model input.
        #[arg(long, default_value_t = 64)]
        seq_len: usize,
    },

    /// Show the declared inputs and outputs of one artifact.
    Inspect {
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "inference-bench")]
#[command(about = "Latency and memory benchmarks for compiled inference artifacts")]
struct Args {
    /// More log output on stderr (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Skip per-iteration progress lines.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn now_utc() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    format!("unix:{secs}")
}

fn git_sha_short() -> Option<String> {
    // Best-effort: read from environment set by CI/build scripts.
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    match args.cmd {
        Command::Run {
            model_dir,
            profile,
            iterations,
            warmup,
            seed,
            batch_size,
            dynamic_dim,
            int_high,
            max_input_mb,
            max_invoke_ms,
            extensions,
            out,
        } => {
            let profile: Profile = profile.into();
            let config = BenchConfig {
                iterations: iterations.unwrap_or_else(|| profile.iters()),
                warmup: warmup.unwrap_or_else(|| profile.warmup_iters()),
                seed,
                batch_size,
                dynamic_dim,
                int_high,
                max_input_bytes: max_input_mb.saturating_mul(1 << 20),
                max_invoke_ms,
                extensions: (!extensions.is_empty()).then_some(extensions),
            };
            let harness = Harness::new(config, BackendRegistry::default())?;

            println!("Inference Artifact Benchmark");
            println!("============================\n");

            let mut console = ConsoleReport::new(io::stdout());
            console.show_iterations = !args.quiet;
            let report = match harness.run(&model_dir, &mut console) {
                Ok(report) => report,
                Err(e @ BenchError::NotFound { .. }) => {
                    return Err(anyhow::Error::new(e).context("nothing to benchmark"));
                }
                Err(e) => return Err(e.into()),
            };

            if let Some(out) = out {
                let file = report.to_results_file(now_utc(), git_sha_short());
                let json = serde_json::to_string_pretty(&file)?;
                fs::write(&out, json)
                    .with_context(|| format!("cannot write results to {}", out.display()))?;
                println!("\nResults written to {}", out.display());
            }

            println!("\nBenchmarking complete!");
        }
        Command::Generate {
            output,
            seed,
            image_size,
            seq_len,
        } => {
            let config = GenerateConfig {
                seed,
                image_size,
                seq_len,
                ..Default::default()
            };
            let written = artifact_gen::write_demo_artifacts(&output, &config)?;
            for path in &written {
                let size = fs::metadata(path)?.len();
                eprintln!("Wrote {} ({:.2} KB)", path.display(), size as f64 / 1024.0);
            }
        }
        Command::Inspect { path } => {
            let registry = BackendRegistry::default();
            let artifact = registry.load(&path)?;
            println!("Artifact: {}", path.display());
            println!("Inputs:");
            for spec in artifact.describe_inputs() {
                println!(
                    "  {:<16} {:<20} {:<8} {}",
                    spec.name,
                    format_shape(&spec.shape),
                    spec.dtype,
                    spec.kind_label()
                );
            }
            println!("Outputs:");
            for spec in artifact.describe_outputs() {
                println!(
                    "  {:<16} {:<20} {}",
                    spec.name,
                    format_shape(&spec.shape),
                    spec.dtype
                );
            }
        }
    }

    Ok(())
}
