use clap::{Parser, Subcommand};
use neon_loader::cli::simulate_cmd::SimulateOptions;
use neon_loader::cli::{scan_cmd, simulate_cmd};
use neon_loader::LoaderConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "neon-loader", version, about = "Progressive media loader for the Neon Murer site")]
struct Cli {
    /// Config file (defaults to ~/.neon-loader/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,

    /// Suppress formatted output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Show extra detail
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Disable colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the deferred media and widgets on a page
    Scan {
        /// HTML file to inspect
        file: PathBuf,
    },
    /// Run the loader against a page, scrolling from top to bottom
    Simulate {
        /// HTML file to load
        file: PathBuf,
        /// Fetch resources from this site instead of the local directory
        #[arg(long)]
        base_url: Option<String>,
        /// Local directory resources are served from
        #[arg(long)]
        root: Option<PathBuf>,
        /// Viewport size as WIDTHxHEIGHT
        #[arg(long, default_value = "1280x800", value_parser = parse_viewport)]
        viewport: (f64, f64),
        /// Behave like a host without visibility observation
        #[arg(long)]
        no_observer: bool,
        /// Force-load elements matching this selector before scrolling
        #[arg(long)]
        force: Vec<String>,
        /// Only evaluate the first screen
        #[arg(long)]
        no_scroll: bool,
        /// Write the resulting markup to this file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

fn parse_viewport(raw: &str) -> Result<(f64, f64), String> {
    let (w, h) = raw
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got {raw}"))?;
    let w: f64 = w.trim().parse().map_err(|_| format!("invalid width in {raw}"))?;
    let h: f64 = h.trim().parse().map_err(|_| format!("invalid height in {raw}"))?;
    if w <= 0.0 || h <= 0.0 {
        return Err(format!("viewport must be positive, got {raw}"));
    }
    Ok((w, h))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.json {
        std::env::set_var("NEON_LOADER_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("NEON_LOADER_QUIET", "1");
    }
    if cli.verbose {
        std::env::set_var("NEON_LOADER_VERBOSE", "1");
    }
    if cli.no_color {
        std::env::set_var("NEON_LOADER_NO_COLOR", "1");
    }

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("neon_loader={default_level}").into());
    if cli.json {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    let config = LoaderConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Scan { file } => scan_cmd::run(&file, config),
        Command::Simulate {
            file,
            base_url,
            root,
            viewport,
            no_observer,
            force,
            no_scroll,
            output,
        } => {
            let opts = SimulateOptions {
                file,
                base_url,
                root,
                viewport_width: viewport.0,
                viewport_height: viewport.1,
                no_observer,
                force,
                no_scroll,
                output,
            };
            simulate_cmd::run(opts, config).await
        }
    }
}
