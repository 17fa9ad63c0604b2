// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Flatscan: scan a document page out of a photograph.
//
// Entry point. Initialises logging, loads configuration, runs the scanner on
// one image and writes the rectified page.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::Parser;
use flatscan_core::ScanConfig;
use flatscan_core::error::{Result, ScanError};
use flatscan_core::human_errors::humanize_error;
use flatscan_document::{Rectification, Scanner, Visualizer};
use image::DynamicImage;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "flatscan")]
#[command(about = "Locate a photographed page and rectify it into a flat, top-down scan")]
#[command(version)]
struct Cli {
    /// Path to the input photograph.
    #[arg(long)]
    src: PathBuf,

    /// Path to write the rectified page.
    #[arg(long, default_value = "dst.jpg")]
    dst: PathBuf,

    /// Write the located quadrilateral and the result as debug images.
    #[arg(short, long)]
    visualize: bool,

    /// JSON file overriding scanner settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for debug images written by --visualize.
    #[arg(long, default_value = "flatscan-debug")]
    debug_dir: PathBuf,
}

/// Writes every visualised image as a numbered PNG.
struct PngDumper {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl PngDumper {
    fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            counter: AtomicUsize::new(0),
        }
    }

    fn path_for(&self, title: &str) -> PathBuf {
        let index = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!("{index:02}-{}.png", slug(title)))
    }
}

impl Visualizer for PngDumper {
    fn show(&self, title: &str, image: &DynamicImage) {
        let path = self.path_for(title);
        match image.save(&path) {
            Ok(()) => debug!(title, path = %path.display(), "Debug image written"),
            Err(err) => warn!(title, path = %path.display(), error = %err, "Cannot write debug image"),
        }
    }
}

/// Lowercase, with runs of non-alphanumerics collapsed to `-`.
fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}

fn load_config(cli: &Cli) -> Result<ScanConfig> {
    let mut config = match &cli.config {
        Some(path) => ScanConfig::from_json_file(path)?,
        None => ScanConfig::default(),
    };
    config.visualize |= cli.visualize;
    Ok(config)
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|err| ScanError::Image(format!("failed to open {}: {err}", path.display())))
}

fn run(cli: &Cli) -> Result<Rectification> {
    let mut scanner = Scanner::new(load_config(cli)?)?;
    if scanner.config().visualize {
        std::fs::create_dir_all(&cli.debug_dir)?;
        scanner = scanner.with_visualizer(PngDumper::new(cli.debug_dir.clone()));
    }

    let photo = open_image(&cli.src)?;
    info!(
        path = %cli.src.display(),
        width = photo.width(),
        height = photo.height(),
        "Photograph loaded"
    );

    let result = scanner.scan(&photo)?;
    let corners = result.corners();
    info!(
        top_left = ?corners.top_left,
        top_right = ?corners.top_right,
        bottom_left = ?corners.bottom_left,
        bottom_right = ?corners.bottom_right,
        "Document corners"
    );
    match &result {
        Rectification::Rectified { camera, .. } => info!(
            focal_length = camera.focal_length,
            aspect_ratio = camera.aspect_ratio,
            "Rectified with camera model"
        ),
        Rectification::FallbackRectified { reason, .. } => {
            warn!(%reason, "Rectified with edge-length fallback")
        }
    }

    result.image().save(&cli.dst).map_err(|err| {
        ScanError::Image(format!("failed to write {}: {err}", cli.dst.display()))
    })?;
    info!(
        path = %cli.dst.display(),
        width = result.image().width(),
        height = result.image().height(),
        "Scan written"
    );
    Ok(result)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "Scan failed");
            eprintln!("{}", humanize_error(&err));
            ExitCode::FAILURE
        }
    }
}
