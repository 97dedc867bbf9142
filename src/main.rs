//! Gallery Indexer CLI
//!
//! Scans media directories into a queryable content index and generates
//! derivative thumbnails on demand.

use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use gallery_indexer::{IndexConfig, ScanMode, ScanReport, Scanner};

const ABOUT: &str = r#"
Gallery Indexer - hierarchical media content index

Examples:
  gallery_indexer scan-all -r /media/galleries          index every top-level directory
  gallery_indexer scan travel -r /media/galleries       rescan one directory by slug
  gallery_indexer scan /media/galleries/travel --mode full
  gallery_indexer thumbs travel -r /media/galleries     generate deferred thumbnails
  gallery_indexer scan-all -r /media/galleries --json   JSON report output
"#;

/// Hierarchical media gallery indexer
#[derive(Parser)]
#[command(name = "gallery_indexer")]
#[command(author, version, about = ABOUT, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index every top-level directory under the content root
    ScanAll {
        /// Content root directory
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// SQLite database file path
        #[arg(short = 'd', long)]
        db: Option<PathBuf>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scan one directory, addressed by filesystem path or stored slug
    Scan {
        /// Directory path or slug
        target: String,

        /// Content root directory
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// Scan mode: full, incremental or lightweight
        #[arg(short = 'm', long, default_value = "incremental")]
        mode: String,

        /// SQLite database file path
        #[arg(short = 'd', long)]
        db: Option<PathBuf>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate deferred thumbnails for one indexed directory
    Thumbs {
        /// Directory slug
        slug: String,

        /// Content root directory
        #[arg(short = 'r', long)]
        root: PathBuf,

        /// SQLite database file path
        #[arg(short = 'd', long)]
        db: Option<PathBuf>,

        /// Images encoded concurrently per batch
        #[arg(short = 'b', long, default_value = "4")]
        batch_size: usize,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::ScanAll { root, db, json } => {
            let config = build_config(root, db, None);
            let mut scanner = Scanner::open(config)?;
            info!("Starting full-tree scan");
            let report = scanner.scan_all()?;
            print_report(&report, json);
        }
        Commands::Scan {
            target,
            root,
            mode,
            db,
            json,
        } => {
            let mode: ScanMode = mode.parse()?;
            let config = build_config(root, db, None);
            let mut scanner = Scanner::open(config)?;
            info!("Scanning '{}' (mode: {})", target, mode.as_str());
            let report = scanner.scan_directory(&target, mode)?;
            print_report(&report, json);
        }
        Commands::Thumbs {
            slug,
            root,
            db,
            batch_size,
            json,
        } => {
            let config = build_config(root, db, Some(batch_size));
            let mut scanner = Scanner::open(config)?;
            info!("Generating thumbnails for '{}'", slug);
            let report = scanner.generate_thumbnails_for_directory(&slug)?;
            print_report(&report, json);
        }
    }
    Ok(())
}

fn build_config(root: PathBuf, db: Option<PathBuf>, batch_size: Option<usize>) -> IndexConfig {
    let mut builder = IndexConfig::builder().root(root);
    if let Some(db) = db {
        builder = builder.db_path(db);
    }
    if let Some(size) = batch_size {
        builder = builder.thumb_batch_size(size);
    }
    builder.build()
}

fn print_report(report: &ScanReport, json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(report).unwrap_or_else(|_| "{}".to_string())
        );
        return;
    }
    println!("Scan completed:");
    println!("  Images processed: {}", report.images_processed);
    println!("  Thumbnails generated: {}", report.thumbnails_generated);
    println!("  Directories created: {}", report.directories_created);
    println!("  Configs applied: {}", report.configs_applied);
    println!("  Orphans removed: {}", report.orphans_removed);
    println!("  Errors: {}", report.error_count());
    println!("  Duration: {}ms", report.duration_ms);
    for error in &report.errors {
        println!("    - {}", error);
    }
}
