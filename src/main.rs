//! wl-drm-auth binary entry point

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wl_drm_auth::{inspect, report, Config, PrimaryNodePolicy, ReportFormat, Session, SystemOpener};

/// Flags for the default (discover and authenticate) mode
#[derive(Debug, Default, PartialEq, Eq)]
struct AuthOptions {
    config: Option<PathBuf>,
    interface: Option<String>,
    min_version: Option<u32>,
    numbered_card: bool,
    json: bool,
}

impl AuthOptions {
    fn apply(&self, config: &mut Config) {
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(min_version) = self.min_version {
            config.min_version = min_version;
        }
        if self.numbered_card {
            config.primary_node = PrimaryNodePolicy::Numbered;
        }
        if self.json {
            config.format = ReportFormat::Json;
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Authenticate(AuthOptions),
    Inspect { json: bool, paths: Vec<PathBuf> },
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let mut iter = args.iter();

    if args.first().map(String::as_str) == Some("inspect") {
        iter.next();
        let mut json = false;
        let mut paths = Vec::new();
        for arg in iter {
            match arg.as_str() {
                "--json" => json = true,
                flag if flag.starts_with("--") => return Err(format!("unknown flag: {flag}")),
                path => paths.push(PathBuf::from(path)),
            }
        }
        if paths.is_empty() {
            return Err("inspect needs at least one device path".to_string());
        }
        return Ok(Command::Inspect { json, paths });
    }

    let mut options = AuthOptions::default();
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{flag} needs a value"))
        };
        match arg.as_str() {
            "-h" | "--help" => return Ok(Command::Help),
            "--config" => options.config = Some(PathBuf::from(value("--config")?)),
            "--interface" => options.interface = Some(value("--interface")?),
            "--min-version" => {
                let raw = value("--min-version")?;
                let parsed = raw
                    .parse()
                    .map_err(|_| format!("--min-version: not a number: {raw}"))?;
                options.min_version = Some(parsed);
            }
            "--numbered-card" => options.numbered_card = true,
            "--json" => options.json = true,
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(Command::Authenticate(options))
}

fn print_usage() {
    eprintln!("Usage: wl-drm-auth [--config FILE] [--interface NAME] [--min-version N]");
    eprintln!("                   [--numbered-card] [--json]");
    eprintln!("       wl-drm-auth inspect [--json] PATH...");
    eprintln!();
    eprintln!("Must be run inside a Wayland session whose compositor advertises wl_drm.");
}

/// Filter controlled by RUST_LOG (default: wl_drm_auth=info). Logs go to stderr.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wl_drm_auth=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run_authenticate(options: &AuthOptions) -> anyhow::Result<()> {
    let mut config = match &options.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config.apply_env()?;
    options.apply(&mut config);
    config.validate()?;

    let session = Session::connect()?;
    let outcome = wl_drm_auth::run(&session, &config, &SystemOpener)?;

    let rendered =
        report::render(&outcome.report, config.format).context("failed to render report")?;
    println!("{rendered}");
    Ok(())
}

fn run_inspect(json: bool, paths: &[PathBuf]) -> anyhow::Result<bool> {
    let inspected = inspect::inspect_paths(paths);
    let format = if json {
        ReportFormat::Json
    } else {
        ReportFormat::Text
    };
    println!(
        "{}",
        report::render(&inspected, format).context("failed to render report")?
    );
    Ok(inspected.success())
}

fn report_error(e: &anyhow::Error) {
    match e.downcast_ref::<wl_drm_auth::Error>() {
        Some(err) => match err.os_error() {
            Some(code) => error!(stage = err.stage(), os_error = code, "Fatal error: {:#}", e),
            None => error!(stage = err.stage(), "Fatal error: {:#}", e),
        },
        None => error!("Fatal error: {:#}", e),
    }
}

fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{message}");
            print_usage();
            std::process::exit(1);
        }
    };

    let code = match command {
        Command::Help => {
            print_usage();
            0
        }
        Command::Inspect { json, paths } => match run_inspect(json, &paths) {
            Ok(true) => 0,
            Ok(false) => 1,
            Err(e) => {
                report_error(&e);
                1
            }
        },
        Command::Authenticate(options) => match run_authenticate(&options) {
            Ok(()) => {
                info!("Authenticated");
                0
            }
            Err(e) => {
                report_error(&e);
                1
            }
        },
    };
    std::process::exit(code);
}
