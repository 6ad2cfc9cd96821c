use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const SERVICE_PACKAGE: &str = "widget_sync_service";
const INTAKE_BINARY: &str = "widget_intake_lambda";
const DIST_DIR: &str = "infra/widget_sync/dist";

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the widget sync workspace",
    long_about = "Runs CI checks, drives the widget consumer against a local AWS\n\
                  emulator, and packages the intake Lambda."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run CI checks (fmt, clippy, tests)
    Ci {
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Run the widget consumer against a local endpoint (e.g. LocalStack)
    ConsumeLocal {
        #[arg(long, default_value = "http://localhost:4566")]
        endpoint_url: String,
        /// Arguments forwarded to widget_consumer
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        consumer_args: Vec<String>,
    },
    /// Build and zip the intake Lambda as a `bootstrap` artifact
    LambdaPackage {
        #[arg(long, default_value = "x86_64-unknown-linux-gnu")]
        target: String,
        #[arg(value_enum, long, default_value_t = BuildProfile::Release)]
        profile: BuildProfile,
    },
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting and clippy
    Lint,
    /// Unit and integration tests
    Test,
    /// Lint + test
    Check,
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildProfile {
    Debug,
    Release,
}

impl BuildProfile {
    fn dir_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }

    fn as_cargo_flag(self) -> Option<&'static str> {
        match self {
            Self::Debug => None,
            Self::Release => Some("--release"),
        }
    }
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn run_cargo(args: &[&str]) -> Result<(), String> {
    eprintln!("+ cargo {}", args.join(" "));
    let status: ExitStatus = Command::new("cargo")
        .args(args)
        .status()
        .map_err(|error| format!("failed to execute cargo: {error}"))?;
    if status.success() {
        Ok(())
    } else {
        Err(format!("cargo {} exited with {status}", args[0]))
    }
}

fn package_intake_lambda(target: &str, profile: BuildProfile) -> Result<(), String> {
    step("Build intake lambda binary");
    let mut cargo_args = vec![
        "build",
        "-p",
        SERVICE_PACKAGE,
        "--target",
        target,
        "--bin",
        INTAKE_BINARY,
    ];
    if let Some(flag) = profile.as_cargo_flag() {
        cargo_args.push(flag);
    }
    run_cargo(&cargo_args)?;

    step("Package lambda zip artifact");
    let binary_path = Path::new("target")
        .join(target)
        .join(profile.dir_name())
        .join(INTAKE_BINARY);
    let dist_dir = Path::new(DIST_DIR);
    fs::create_dir_all(dist_dir)
        .map_err(|error| format!("failed to create '{}': {error}", dist_dir.display()))?;

    let zip_path = dist_dir.join("intake.zip");
    package_lambda_zip(&binary_path, &zip_path)?;
    eprintln!("\nPackaged artifact:\n- {}", zip_path.display());
    Ok(())
}

fn package_lambda_zip(binary_path: &Path, zip_path: &Path) -> Result<(), String> {
    let binary = fs::read(binary_path).map_err(|error| {
        format!(
            "expected lambda binary at '{}': {error}",
            binary_path.display()
        )
    })?;
    let file = fs::File::create(zip_path)
        .map_err(|error| format!("failed to create '{}': {error}", zip_path.display()))?;

    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o755);
    zip.start_file("bootstrap", options)
        .map_err(|error| format!("failed to start bootstrap entry: {error}"))?;
    zip.write_all(&binary)
        .map_err(|error| format!("failed to write bootstrap entry: {error}"))?;
    zip.finish()
        .map_err(|error| format!("failed to finish lambda zip: {error}"))?;
    Ok(())
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_lint() -> Result<(), String> {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"])?;

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ])
}

fn ci_test() -> Result<(), String> {
    step("Test widget_sync_core");
    run_cargo(&["test", "-p", "widget_sync_core"])?;

    step("Test widget_sync_service");
    run_cargo(&["test", "-p", SERVICE_PACKAGE])
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ci { job } => {
            let outcome = match job {
                CiJob::Lint => ci_lint(),
                CiJob::Test => ci_test(),
                CiJob::Check => ci_lint().and_then(|()| ci_test()),
            };
            outcome.map(|()| eprintln!("\nCI job passed."))
        }
        Commands::ConsumeLocal {
            endpoint_url,
            consumer_args,
        } => {
            let mut args = vec![
                "run",
                "-p",
                SERVICE_PACKAGE,
                "--bin",
                "widget_consumer",
                "--",
                "--endpoint-url",
                endpoint_url.as_str(),
            ];
            args.extend(consumer_args.iter().map(String::as_str));
            run_cargo(&args)
        }
        Commands::LambdaPackage { target, profile } => package_intake_lambda(&target, profile),
    };

    if let Err(message) = result {
        eprintln!("error: {message}");
        exit(1);
    }
}
