use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;

use crate::{
    extract_row_images_limited, upload_row_images, ContentType, FsBlobStore, PackageLimits,
    UploadContext,
};

#[derive(Clone, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// CLI arguments for the `boq-images` binary.
#[derive(Parser)]
#[command(about = "Extract row-anchored images from a BOQ workbook (XLSX).")]
pub struct Args {
    /// Workbook to read.
    input: PathBuf,

    /// Store extracted images under this directory instead of only listing them.
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Project id used as the first key segment (`{project}/{token}-{row}.{ext}`).
    #[arg(long, default_value = "local")]
    project: String,

    /// Key token distinguishing this import (default: current Unix time in milliseconds).
    #[arg(long)]
    token: Option<String>,

    /// Public URL prefix for stored images (default: `file://` URL of `--out`).
    #[arg(long, value_name = "URL", requires = "out")]
    base_url: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Maximum inflated size of any single package entry.
    #[arg(long, value_name = "BYTES")]
    max_part_bytes: Option<u64>,

    /// Maximum inflated size of the whole package.
    #[arg(long, value_name = "BYTES")]
    max_total_bytes: Option<u64>,
}

#[derive(Debug, Serialize)]
struct JsonImage<'a> {
    row: u32,
    content_type: ContentType,
    bytes: usize,
    part: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonListReport<'a> {
    input: &'a str,
    images: Vec<JsonImage<'a>>,
}

#[derive(Debug, Serialize)]
struct JsonStored<'a> {
    row: u32,
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct JsonFailed<'a> {
    row: u32,
    key: &'a str,
    error: String,
}

#[derive(Debug, Serialize)]
struct JsonUploadReport<'a> {
    input: &'a str,
    project: &'a str,
    stored: Vec<JsonStored<'a>>,
    failed: Vec<JsonFailed<'a>>,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    run_with_args(args)
}

pub fn run_with_args(args: Args) -> Result<()> {
    let defaults = PackageLimits::default();
    let limits = PackageLimits {
        max_part_bytes: args.max_part_bytes.unwrap_or(defaults.max_part_bytes),
        max_total_bytes: args.max_total_bytes.unwrap_or(defaults.max_total_bytes),
    };

    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("read workbook {}", args.input.display()))?;
    let images = extract_row_images_limited(&bytes, limits)
        .with_context(|| format!("extract images from {}", args.input.display()))?;
    let input = args.input.display().to_string();

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();

    let Some(out_dir) = args.out.as_deref() else {
        match args.format {
            OutputFormat::Text => {
                for image in images.values() {
                    writeln!(
                        handle,
                        "{}\t{}\t{}\t{}",
                        image.row,
                        image.content_type,
                        image.bytes.len(),
                        image.part_name
                    )?;
                }
            }
            OutputFormat::Json => {
                let report = JsonListReport {
                    input: &input,
                    images: images
                        .values()
                        .map(|image| JsonImage {
                            row: image.row,
                            content_type: image.content_type,
                            bytes: image.bytes.len(),
                            part: image.part_name.as_str(),
                        })
                        .collect(),
                };
                serde_json::to_writer(&mut handle, &report)?;
                handle.write_all(b"\n")?;
            }
        }
        return Ok(());
    };

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("create output directory {}", out_dir.display()))?;
    let base_url = match args.base_url {
        Some(url) => url,
        None => {
            let root = std::fs::canonicalize(out_dir)
                .with_context(|| format!("resolve output directory {}", out_dir.display()))?;
            format!("file://{}", root.display())
        }
    };

    let store = FsBlobStore::new(out_dir, base_url);
    let mut ctx = UploadContext::new(args.project.as_str());
    if let Some(token) = args.token {
        ctx = ctx.with_token(token);
    }
    let report = upload_row_images(&images, &store, &ctx);

    match args.format {
        OutputFormat::Text => {
            for (row, url) in &report.urls {
                writeln!(handle, "{row}\t{url}")?;
            }
            for failed in &report.failed {
                eprintln!("row {}: failed to store {}: {}", failed.row, failed.key, failed.error);
            }
        }
        OutputFormat::Json => {
            let json_report = JsonUploadReport {
                input: &input,
                project: &ctx.project_id,
                stored: report
                    .urls
                    .iter()
                    .map(|(row, url)| JsonStored {
                        row: *row,
                        url: url.as_str(),
                    })
                    .collect(),
                failed: report
                    .failed
                    .iter()
                    .map(|failed| JsonFailed {
                        row: failed.row,
                        key: failed.key.as_str(),
                        error: failed.error.to_string(),
                    })
                    .collect(),
            };
            serde_json::to_writer(&mut handle, &json_report)?;
            handle.write_all(b"\n")?;
        }
    }

    Ok(())
}
