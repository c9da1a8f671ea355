//! Binary entry point for the regolith CLI.
//!
//! ## Usage
//!
//! ```bash
//! # Turn `allow = true` on line 3 into `allow := true`
//! regolith fix --violation use-assignment-operator=policy/authz.rego:3:7
//!
//! # Move a file under the directory its package names, previewing only
//! regolith fix --dry-run --violation directory-package-mismatch=authz.rego:1:1
//! ```

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use regolith::cli::{parse_violation, run_fix, FixRequest, Violation};
use regolith_core::config::{CliOverrides, ResolvedConfig};
use regolith_core::error::{OutputErrorCode, RegolithError};

// ============================================================================
// CLI Structure
// ============================================================================

/// Apply lint fixes to policy files.
#[derive(Parser, Debug)]
#[command(name = "regolith", version, about = "Apply lint fixes to policy files")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

/// Global arguments shared by all subcommands.
#[derive(Parser, Debug)]
struct GlobalArgs {
    /// Workspace root directory (default: current directory).
    #[arg(long, global = true)]
    workspace: Option<PathBuf>,

    /// Log level for tracing output.
    #[arg(long, global = true, value_enum, default_value = "warn")]
    log_level: LogLevel,
}

/// Log level for tracing output.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Output format for the fix command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum FixFormat {
    /// Human-readable report (default).
    #[default]
    Text,
    /// JSON summary.
    Json,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Apply fixes for the given violations.
    Fix {
        /// Files or directories to load (default: the project root).
        paths: Vec<PathBuf>,
        /// Violation to fix, as `<fixer>=<path>:<row>:<col>[:<end_row>:<end_col>]`.
        #[arg(long = "violation", value_parser = parse_violation)]
        violations: Vec<Violation>,
        /// Project root fixes are reported under.
        #[arg(long)]
        base_dir: Option<PathBuf>,
        /// Fixer to skip; may be repeated.
        #[arg(long = "disable")]
        disabled: Vec<String>,
        /// Glob of files to leave alone; may be repeated.
        #[arg(long = "ignore")]
        ignore: Vec<String>,
        /// Report without writing anything.
        #[arg(long)]
        dry_run: bool,
        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: FixFormat,
    },
    /// List the available fixers.
    Fixers,
}

// ============================================================================
// Main
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.global.log_level);

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let error_code = OutputErrorCode::from(&err);
            let _ = writeln!(io::stderr(), "error: {err}");
            ExitCode::from(error_code.code())
        }
    }
}

/// Initialize tracing subscriber.
fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_tracing_level().to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Execute the CLI command.
fn execute(cli: Cli) -> Result<(), RegolithError> {
    match cli.command {
        Command::Fix {
            paths,
            violations,
            base_dir,
            disabled,
            ignore,
            dry_run,
            format,
        } => {
            let overrides = CliOverrides {
                base_dir,
                disabled,
                ignore,
            };
            execute_fix(&cli.global, paths, violations, overrides, dry_run, format)
        }
        Command::Fixers => execute_fixers(&cli.global),
    }
}

// ============================================================================
// Command Executors
// ============================================================================

fn workspace_root(global: &GlobalArgs) -> Result<PathBuf, RegolithError> {
    match &global.workspace {
        Some(path) => Ok(path.clone()),
        None => std::env::current_dir().map_err(|e| {
            RegolithError::internal(format!("cannot determine current directory: {e}"))
        }),
    }
}

/// Execute fix command.
///
/// Conflicts are printed with the report and turn into an apply error so
/// the exit code reflects them.
fn execute_fix(
    global: &GlobalArgs,
    paths: Vec<PathBuf>,
    violations: Vec<Violation>,
    overrides: CliOverrides,
    dry_run: bool,
    format: FixFormat,
) -> Result<(), RegolithError> {
    let root = workspace_root(global)?;
    let config = ResolvedConfig::resolve(&root, &overrides)?;
    let request = FixRequest {
        paths,
        violations,
        dry_run,
        config,
    };
    let report = run_fix(&request)?;

    let mut stdout = io::stdout();
    let written = match format {
        FixFormat::Text => stdout.write_all(report.text.as_bytes()),
        FixFormat::Json => writeln!(stdout, "{:#}", report.to_json()),
    };
    written
        .and_then(|()| stdout.flush())
        .map_err(|e| RegolithError::internal(e.to_string()))?;

    if report.has_conflicts() {
        let blocked = report.outcome.ledger.conflicted_paths().len();
        return Err(RegolithError::apply(
            format!("{blocked} paths are involved in conflicting moves"),
            None,
        ));
    }
    Ok(())
}

/// Execute fixers command.
fn execute_fixers(global: &GlobalArgs) -> Result<(), RegolithError> {
    let root = workspace_root(global)?;
    let config = ResolvedConfig::resolve(&root, &CliOverrides::default())?;
    let registry = config.registry();

    let mut stdout = io::stdout();
    for name in registry.names() {
        writeln!(stdout, "{name}").map_err(|e| RegolithError::internal(e.to_string()))?;
    }
    Ok(())
}
