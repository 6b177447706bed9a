use anyhow::Context;
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bingoscan::{
    Plate, PlateGenerator, PlateRepository, PlateStore, ProgressListener, RecognizerConfig,
    ScanConfig, ScanSession, TicketNumber,
};

#[derive(Parser)]
#[command(name = "bingoscan")]
#[command(about = "Read the number grid of photographed bingo tickets")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan ticket photos and print their grids
    Scan {
        /// Ticket images, processed in order
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,

        #[arg(long, default_value_t = 3)]
        rows: u32,

        #[arg(long, default_value_t = 9)]
        cols: u32,

        /// Append the scanned grids to this plate store
        #[arg(long, value_name = "DB")]
        save: Option<PathBuf>,

        /// Text detection model (defaults to ~/.cache/ocrs/text-detection.rten)
        #[arg(long, value_name = "FILE")]
        detection_model: Option<PathBuf>,

        /// Text recognition model (defaults to ~/.cache/ocrs/text-recognition.rten)
        #[arg(long, value_name = "FILE")]
        recognition_model: Option<PathBuf>,
    },
    /// Score stored plates against the called numbers
    Score {
        #[arg(long, value_name = "DB")]
        db: PathBuf,

        /// Comma separated called numbers, e.g. 4,17,63
        #[arg(long, value_delimiter = ',')]
        called: Vec<TicketNumber>,
    },
    /// Generate random plates into a store
    Generate {
        #[arg(long, default_value_t = 30)]
        count: usize,

        #[arg(long)]
        seed: Option<u64>,

        /// Store to write the plates into; printed to stdout when omitted
        #[arg(long, value_name = "DB")]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Scan {
            images,
            rows,
            cols,
            save,
            detection_model,
            recognition_model,
        } => scan(images, rows, cols, save, detection_model, recognition_model).await,
        Command::Score { db, called } => score(db, called).await,
        Command::Generate { count, seed, db } => generate(count, seed, db).await,
    }
}

async fn scan(
    images: Vec<PathBuf>,
    rows: u32,
    cols: u32,
    save: Option<PathBuf>,
    detection_model: Option<PathBuf>,
    recognition_model: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut recognizer = RecognizerConfig::from_cache_dir()?;
    if let Some(path) = detection_model {
        recognizer.detection_model = path;
    }
    if let Some(path) = recognition_model {
        recognizer.recognition_model = path;
    }

    let mut session = ScanSession::load(ScanConfig::default(), &recognizer)
        .context("Failed to start the recognition engine")?;

    let mut progress = |index: usize, total: usize, label: &str| -> anyhow::Result<()> {
        eprintln!("[{index}/{total}] {label}");
        Ok(())
    };
    let listener: &mut dyn ProgressListener = &mut progress;
    let grids = session.scan_batch(&images, rows, cols, Some(listener));
    session.close();

    for grid in &grids {
        println!("{grid}\n");
    }
    println!("Scanned {} of {} tickets", grids.len(), images.len());

    if let Some(db) = save {
        let store = PlateStore::open(&db).await?;
        let plates: Vec<Plate> = grids.iter().map(Plate::from_grid).collect();
        let total = store.append_plates(&plates).await?;
        store.close().await?;
        info!(added = plates.len(), total, "Plates saved");
    }

    Ok(())
}

async fn score(db: PathBuf, called: Vec<TicketNumber>) -> anyhow::Result<()> {
    let store = PlateStore::open(&db).await?;
    let plates = store.load_plates().await?;
    store.close().await?;

    let called: HashSet<TicketNumber> = called.into_iter().collect();
    let mut scored: Vec<(usize, &Plate)> = plates
        .iter()
        .map(|p| (p.score_against(&called), p))
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    for (points, plate) in scored {
        println!("{}  {points:>2}", plate.id);
    }
    Ok(())
}

async fn generate(count: usize, seed: Option<u64>, db: Option<PathBuf>) -> anyhow::Result<()> {
    let mut generator = match seed {
        Some(seed) => PlateGenerator::seeded(seed),
        None => PlateGenerator::new(),
    };
    let plates = generator.generate(count);

    let Some(db) = db else {
        println!("{}", serde_json::to_string_pretty(&plates)?);
        return Ok(());
    };

    let store = PlateStore::open(&db).await?;
    store.save_plates(&plates).await?;
    store.close().await?;

    println!("Generated {} plates into {}", plates.len(), db.display());
    Ok(())
}
