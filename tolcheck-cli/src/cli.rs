use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use tolcheck::{
    CONFIG_FILE_NAME, ConfigEntry, ConfigFile, DEFAULT_TOLERANCE, ScanConfig, ScanError, Unit,
    WorkspaceScan, format_value, scan_workspace, select_measurement_types,
};
use tolcheck_report::{ReportOptions, RunSummary, output};
use tracing::{info, warn};

use crate::browser;
use crate::launcher::{self, LaunchConfig};
use crate::logging::init_tracing;
use crate::runner::{self, RunRequest};
use crate::server::{self, DEFAULT_HOST, DEFAULT_PORT, ServerConfig};

#[derive(Debug, Parser)]
#[command(name = "tolcheck")]
#[command(about = "Measurement tolerance checks with Excel and HTML reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Verbosity: -v for info, -vv for debug (includes request bodies)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Runs `launch` with its defaults when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the unit, measurement types and tests found in a directory
    Scan(ScanArgs),
    /// Manage test_config.json
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Process a directory into a workbook and an HTML report
    Process(ProcessArgs),
    /// Run the local web front end
    Serve(ServeArgs),
    /// Prepare the work directory, open the browser and run the web front end
    Launch(LaunchArgs),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a test_config.json with default references and tolerances
    Init(ConfigInitArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Directory holding the CSV and TXT exports
    pub dir: PathBuf,

    /// Search subdirectories as well
    #[arg(short, long)]
    pub recursive: bool,

    /// Skip files matching this glob (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,
}

impl InputArgs {
    fn scan_config(&self) -> ScanConfig {
        let mut config = ScanConfig::new(expand_path(&self.dir));
        config.recursive = self.recursive;
        config.exclude.clone_from(&self.exclude);
        config
    }
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub input: InputArgs,
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Tolerance written for every test
    #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Where to write the file (default: <DIR>/test_config.json)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Tolerance configuration (default: <DIR>/test_config.json when present)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output directory (default: the input directory)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Tolerance for tests the configuration does not cover
    #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Measurement type to evaluate in a text file, FILE relative to DIR (repeatable)
    #[arg(
        short = 'm',
        long = "measurement-type",
        value_name = "FILE=TYPE",
        value_parser = parse_key_value
    )]
    pub measurement_types: Vec<(String, String)>,

    /// Statistics only: no limits and no HTML report
    #[arg(long)]
    pub raw: bool,

    /// Open the report when done
    #[arg(long)]
    pub open: bool,
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory for uploads and outputs
    #[arg(short, long, default_value = ".")]
    pub workdir: PathBuf,
}

impl ServeArgs {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            workdir: expand_path(&self.workdir),
            ..ServerConfig::default()
        }
    }
}

#[derive(Debug, Args)]
pub struct LaunchArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Directory for uploads and outputs
    #[arg(short, long, default_value = ".")]
    pub workdir: PathBuf,

    /// Delay before the browser is opened
    #[arg(long, value_name = "MS", default_value_t = 2000)]
    pub browser_delay_ms: u64,

    /// Do not open a browser
    #[arg(long)]
    pub no_browser: bool,
}

impl LaunchArgs {
    fn launch_config(&self) -> LaunchConfig {
        LaunchConfig {
            server: ServerConfig {
                port: self.port,
                workdir: expand_path(&self.workdir),
                ..ServerConfig::default()
            },
            browser_delay: Duration::from_millis(self.browser_delay_ms),
            open_browser: !self.no_browser,
        }
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FILE=TYPE, got '{raw}'"))?;
    let (key, value) = (key.trim(), value.trim());
    if key.is_empty() || value.is_empty() {
        return Err(format!("expected FILE=TYPE, got '{raw}'"));
    }
    Ok((key.to_owned(), value.to_owned()))
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Parse the command line and run the selected command.
///
/// # Errors
///
/// Returns an error if the command fails.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Some(Command::Scan(args)) => scan(&args, cli.json),
        Some(Command::Config {
            command: ConfigCommand::Init(args),
        }) => config_init(&args, cli.json),
        Some(Command::Process(args)) => process(&args, cli.json),
        Some(Command::Serve(args)) => server::serve(args.server_config(), cli.verbose).await,
        Some(Command::Launch(args)) => launcher::launch(args.launch_config(), cli.verbose).await,
        None => launcher::launch(LaunchConfig::default(), cli.verbose).await,
    }
}

#[derive(Debug, Serialize)]
struct ScanReport<'a> {
    input_dir: &'a Path,
    unit: Unit,
    csv_files: usize,
    txt_files: usize,
    measurement_types: &'a BTreeMap<String, BTreeSet<String>>,
    test_configs: Vec<ConfigEntry>,
    scan_errors: &'a [ScanError],
}

fn write_scan(workspace: &WorkspaceScan, out: &mut dyn Write) -> anyhow::Result<()> {
    let discovery = &workspace.discovery;
    writeln!(out, "Input:  {}", workspace.input_dir.display())?;
    writeln!(out, "Unit:   {}", workspace.unit)?;
    writeln!(
        out,
        "Files:  {} CSV (Output), {} TXT (Input)",
        discovery.csv_count(),
        discovery.txt_count()
    )?;

    if !workspace.measurement_types.is_empty() {
        writeln!(out)?;
        writeln!(out, "Measurement types:")?;
        for (file, types) in &workspace.measurement_types {
            let list = types.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
            if types.len() > 1 {
                writeln!(out, "  {file}: {list} {}", "(select with -m FILE=TYPE)".yellow())?;
            } else {
                writeln!(out, "  {file}: {list}")?;
            }
        }
    }

    writeln!(out)?;
    writeln!(out, "Tests:")?;
    if workspace.test_keys.is_empty() {
        writeln!(out, "  {}", "none (no file name carries a test value)".yellow())?;
    }
    for key in &workspace.test_keys {
        writeln!(
            out,
            "  {:>10} {:<4} Range: {:<8} {}",
            format_value(key.test_value),
            workspace.unit.symbol(),
            key.range_display(),
            key.io_type
        )?;
    }

    for err in &discovery.scan_errors {
        writeln!(out, "{} {}", "warning:".yellow(), err.format_human_readable())?;
    }
    Ok(())
}

fn scan(args: &ScanArgs, json: bool) -> anyhow::Result<()> {
    let workspace = scan_workspace(&args.input.scan_config())?;
    let mut stdout = std::io::stdout().lock();

    if json {
        let report = ScanReport {
            input_dir: &workspace.input_dir,
            unit: workspace.unit,
            csv_files: workspace.discovery.csv_count(),
            txt_files: workspace.discovery.txt_count(),
            measurement_types: &workspace.measurement_types,
            test_configs: workspace
                .default_config(DEFAULT_TOLERANCE)
                .to_file()
                .configurations,
            scan_errors: &workspace.discovery.scan_errors,
        };
        writeln!(stdout, "{}", serde_json::to_string_pretty(&report)?)?;
        return Ok(());
    }
    write_scan(&workspace, &mut stdout)
}

fn config_init(args: &ConfigInitArgs, json: bool) -> anyhow::Result<()> {
    let scan = args.input.scan_config();
    let workspace = scan_workspace(&scan)?;
    if workspace.test_keys.is_empty() {
        anyhow::bail!(
            "No tests found in {}: no file name carries a test value",
            scan.input_dir.display()
        );
    }

    let path = args.output.as_deref().map_or_else(
        || scan.input_dir.join(CONFIG_FILE_NAME),
        expand_path,
    );
    if path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; use --force to overwrite it",
            path.display()
        );
    }

    let mut config = workspace.default_config(args.tolerance);
    config.measurement_types = select_measurement_types(
        &workspace.measurement_types,
        &BTreeMap::new(),
        &BTreeMap::new(),
    );
    let file = config.to_file();
    file.save(&path)?;
    info!(path = %path.display(), entries = file.configurations.len(), "Wrote configuration");

    let mut stdout = std::io::stdout().lock();
    if json {
        let value = serde_json::json!({
            "path": path,
            "unit": workspace.unit.symbol(),
            "configurations": file.configurations.len(),
        });
        writeln!(stdout, "{}", serde_json::to_string_pretty(&value)?)?;
    } else {
        writeln!(
            stdout,
            "{} Wrote {} test configurations to {}",
            "\u{2713}".green(),
            file.configurations.len(),
            path.display()
        )?;
    }
    Ok(())
}

/// The explicit config file, or `test_config.json` in the input directory.
fn load_config(explicit: Option<&Path>, input_dir: &Path) -> anyhow::Result<Option<ConfigFile>> {
    let path = match explicit {
        Some(path) => expand_path(path),
        None => {
            let default = input_dir.join(CONFIG_FILE_NAME);
            if !default.is_file() {
                return Ok(None);
            }
            info!(path = %default.display(), "Using configuration from the input directory");
            default
        }
    };
    ConfigFile::load(&path)
        .map(Some)
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

fn write_verdict(summary: &RunSummary, out: &mut dyn Write) -> anyhow::Result<()> {
    match (summary.mean_check, summary.sigma_check) {
        (Some(mean), Some(sigma)) if mean.fail + sigma.fail > 0 => {
            let text = format!(
                "{} mean and {} \u{b1}2\u{3c3} checks failed",
                mean.fail, sigma.fail
            );
            writeln!(out, "{}", text.red().bold())?;
        }
        (Some(_), Some(_)) => writeln!(out, "{}", "All checks passed".green().bold())?,
        _ => writeln!(out, "{}", "Raw mode: no limits evaluated".yellow())?,
    }
    Ok(())
}

fn process(args: &ProcessArgs, json: bool) -> anyhow::Result<()> {
    let scan = args.input.scan_config();
    let config = if args.raw {
        None
    } else {
        load_config(args.config.as_deref(), &scan.input_dir)?
    };

    let request = RunRequest {
        tolerance: args.tolerance,
        config,
        measurement_types: args.measurement_types.iter().cloned().collect(),
        raw: args.raw,
        report: ReportOptions::new(args.output_dir.as_deref().map(expand_path), args.open),
    };
    let summary = runner::run(&scan, &request)?;

    let mut stdout = std::io::stdout().lock();
    if json {
        output::write_json(&summary, &mut stdout)?;
    } else {
        output::write_human(&summary, &mut stdout)?;
        write_verdict(&summary, &mut stdout)?;
    }

    if request.report.open_after_write {
        let target = summary.files.primary();
        if let Err(e) = browser::open(target.as_os_str()) {
            warn!("Could not open {}: {e:#}", target.display());
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("VT.txt = CurVoltage").unwrap(),
            ("VT.txt".to_owned(), "CurVoltage".to_owned())
        );
        assert!(parse_key_value("VT.txt").is_err());
        assert!(parse_key_value("=CurVoltage").is_err());
        assert!(parse_key_value("VT.txt=").is_err());
    }

    #[test]
    fn test_process_flags() {
        let cli = Cli::try_parse_from([
            "tolcheck",
            "-vv",
            "process",
            "bench",
            "--raw",
            "-m",
            "a.txt=CurVoltage",
            "--measurement-type",
            "b.txt=Other",
            "--exclude",
            "*_old.csv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Some(Command::Process(args)) = cli.command else {
            panic!("expected process");
        };
        assert!(args.raw);
        assert_eq!(args.measurement_types.len(), 2);
        assert_eq!(args.input.exclude, vec!["*_old.csv".to_owned()]);
        assert!((args.tolerance - DEFAULT_TOLERANCE).abs() < 1e-12);
    }

    #[test]
    fn test_launch_defaults() {
        let cli = Cli::try_parse_from(["tolcheck", "launch"]).unwrap();
        let Some(Command::Launch(args)) = cli.command else {
            panic!("expected launch");
        };
        let config = args.launch_config();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.browser_delay, Duration::from_secs(2));
        assert!(config.open_browser);
    }

    #[test]
    fn test_no_command_means_launch() {
        let cli = Cli::try_parse_from(["tolcheck", "--json"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.json);
    }

    #[test]
    fn test_load_config_prefers_explicit_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        assert!(load_config(None, tmp.path()).unwrap().is_none());

        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            r#"{"unit": "V", "configurations": []}"#,
        )
        .unwrap();
        let found = load_config(None, tmp.path()).unwrap().unwrap();
        assert_eq!(found.unit.as_deref(), Some("V"));

        let other = tmp.path().join("other.json");
        std::fs::write(&other, r#"{"unit": "mA"}"#).unwrap();
        let explicit = load_config(Some(other.as_path()), tmp.path()).unwrap().unwrap();
        assert_eq!(explicit.unit.as_deref(), Some("mA"));

        assert!(load_config(Some(tmp.path().join("missing.json").as_path()), tmp.path()).is_err());
    }
}
