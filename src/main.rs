mod commands;
mod config;
mod model;
mod reco;
mod report;
mod req;

use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::{Parser, Subcommand};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use commands::image_or_default;
use config::Settings;
use model::SegmentMode;
use req::http::{ReadOptions, VisionClient};

/// Send one image to the cloud vision service and show what it found.
#[derive(Debug, Parser)]
#[command(name = "reco-vision", version)]
struct Cli {
    /// Service endpoint, e.g. https://<resource>.cognitiveservices.azure.com/
    #[arg(long, global = true, env = config::ENDPOINT_VAR)]
    endpoint: Option<String>,

    /// Subscription key of the resource
    #[arg(long, global = true, env = config::KEY_VAR, hide_env_values = true)]
    key: Option<String>,

    /// Log requests and raw responses to stderr, on top of any RUST_LOG filter
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Detect objects and draw them on a copy of the image
    Objects {
        image: Option<PathBuf>,
        #[arg(long, default_value = commands::OBJECTS_OUTPUT)]
        output: PathBuf,
    },
    /// Detect people and draw their bounding boxes
    People {
        image: Option<PathBuf>,
        #[arg(long, default_value = commands::PEOPLE_OUTPUT)]
        output: PathBuf,
        /// People below this confidence are listed but not drawn
        #[arg(long, default_value_t = 0.2)]
        min_confidence: f32,
    },
    /// Remove the background, keeping the foreground subject
    Background {
        image: Option<PathBuf>,
        #[arg(long, default_value = commands::BACKGROUND_OUTPUT)]
        output: PathBuf,
    },
    /// Produce the foreground alpha matte
    Foreground {
        image: Option<PathBuf>,
        #[arg(long, default_value = commands::FOREGROUND_OUTPUT)]
        output: PathBuf,
    },
    /// Caption the image and its regions
    Caption { image: Option<PathBuf> },
    /// List the tags the service assigns to the image
    Tags { image: Option<PathBuf> },
    /// Extract printed and handwritten text
    Read {
        image: Option<PathBuf>,
        /// Seconds between polls of the read operation
        #[arg(long, default_value_t = 1)]
        poll_secs: u64,
        #[arg(long, default_value_t = 120)]
        max_polls: u32,
    },
}

fn main() {
    dotenv::dotenv().ok();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        // --help and --version
        Err(err) if !err.use_stderr() => err.exit(),
        Err(err) => {
            report_outcome(Err(usage_error(err)), &mut io::stdout().lock());
            return;
        }
    };
    init_tracing(cli.verbose);

    let outcome = run(cli);
    report_outcome(outcome, &mut io::stdout().lock());
}

/// Failures end up as one `Error:` line; the exit status stays 0 either way.
fn report_outcome(outcome: anyhow::Result<()>, out: &mut impl Write) {
    if let Err(err) = outcome {
        let _ = writeln!(out, "Error: {:#}", err);
    }
}

fn usage_error(err: clap::Error) -> anyhow::Error {
    let rendered = err.to_string();
    anyhow::anyhow!(rendered
        .trim_start_matches("error: ")
        .lines()
        .next()
        .unwrap_or_default()
        .to_string())
}

fn init_tracing(verbose: bool) {
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), verbose);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn log_filter(rust_log: Option<&str>, verbose: bool) -> EnvFilter {
    let filter = rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"));
    if verbose {
        filter.add_directive(LevelFilter::DEBUG.into())
    } else {
        filter
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = Settings::resolve(cli.endpoint, cli.key)?;
    tracing::debug!(endpoint = settings.endpoint(), "configuration loaded");
    let client = VisionClient::new(settings)?;
    let mut out = io::stdout().lock();

    match cli.command {
        Command::Objects { image, output } => {
            let image = image_or_default(image, commands::DEFAULT_OBJECTS_IMAGE);
            commands::objects(&client, &image, &output, &mut out)
        }
        Command::People {
            image,
            output,
            min_confidence,
        } => {
            let image = image_or_default(image, commands::DEFAULT_PEOPLE_IMAGE);
            commands::people(&client, &image, &output, min_confidence, &mut out)
        }
        Command::Background { image, output } => {
            let image = image_or_default(image, commands::DEFAULT_PEOPLE_IMAGE);
            commands::segment(&client, &image, SegmentMode::BackgroundRemoval, &output, &mut out)
        }
        Command::Foreground { image, output } => {
            let image = image_or_default(image, commands::DEFAULT_PEOPLE_IMAGE);
            commands::segment(&client, &image, SegmentMode::ForegroundMatting, &output, &mut out)
        }
        Command::Caption { image } => {
            let image = image_or_default(image, commands::DEFAULT_DOCUMENT_IMAGE);
            commands::caption(&client, &image, &mut out)
        }
        Command::Tags { image } => {
            let image = image_or_default(image, commands::DEFAULT_DOCUMENT_IMAGE);
            commands::tags(&client, &image, &mut out)
        }
        Command::Read {
            image,
            poll_secs,
            max_polls,
        } => {
            let image = image_or_default(image, commands::DEFAULT_DOCUMENT_IMAGE);
            let options = ReadOptions {
                poll_interval: std::time::Duration::from_secs(poll_secs),
                max_polls,
            };
            commands::read(&client, &image, options, &mut out)
        }
    }
}
