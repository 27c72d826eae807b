use clap::{Args, Parser, Subcommand};
use fcb_cli::commands::{append, demo, dump, records, status};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fcb")]
#[command(about = "Flash circular buffer inspection harness", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Flash image location and geometry shared by the image-backed commands.
#[derive(Args)]
struct ImageArgs {
    /// Path to the flash image file (created erased if missing).
    #[arg(long, short)]
    image: PathBuf,

    /// Sector size in bytes.
    #[arg(long, default_value_t = fcb::config::FLASH_SECTOR_SIZE)]
    sector_size: u32,

    /// Number of sectors.
    #[arg(long, default_value_t = fcb::config::FLASH_SECTOR_COUNT)]
    sector_count: u32,
}

#[derive(Subcommand)]
enum Commands {
    /// In-memory walkthrough: erase, mount, append, report.
    Demo,
    /// Mount an image and show the control block plus a per-sector table.
    Status {
        #[command(flatten)]
        image: ImageArgs,
    },
    /// Append one record to an image.
    Append {
        #[command(flatten)]
        image: ImageArgs,

        /// Payload bytes, taken verbatim.
        #[arg(long, short)]
        data: String,
    },
    /// List the decoded records between tail and head.
    Records {
        #[command(flatten)]
        image: ImageArgs,
    },
    /// Hex-dump the start of one sector.
    Dump {
        #[command(flatten)]
        image: ImageArgs,

        /// Sector index to dump.
        #[arg(long, short)]
        sector: u32,

        /// Number of bytes to print.
        #[arg(long, default_value_t = 64)]
        num_bytes: u32,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "fcb_cli=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo => demo::run(),
        Commands::Status { image } => {
            status::run(image.image, image.sector_size, image.sector_count)
        }
        Commands::Append { image, data } => {
            append::run(image.image, image.sector_size, image.sector_count, data)
        }
        Commands::Records { image } => {
            records::run(image.image, image.sector_size, image.sector_count)
        }
        Commands::Dump {
            image,
            sector,
            num_bytes,
        } => dump::run(
            image.image,
            image.sector_size,
            image.sector_count,
            sector,
            num_bytes,
        ),
    }
}
