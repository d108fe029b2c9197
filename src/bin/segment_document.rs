use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use contractmatch_lib::models::SegmentationMode;
use contractmatch_lib::services::document::read_segments;
use contractmatch_lib::services::text_processor::preview;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "segment_document",
    version,
    about = "Dump the paragraph segments extracted from a contract (.txt, .md, .docx, .pdf)"
)]
struct Cli {
    path: PathBuf,

    /// Join wrapped lines and split on blank lines instead of on every line
    #[arg(long, default_value_t = false)]
    blank_lines: bool,

    /// Number of segments to print
    #[arg(long, default_value_t = 50)]
    show: usize,

    /// Write the segments as JSON
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = if cli.blank_lines {
        SegmentationMode::BlankLines
    } else {
        SegmentationMode::Lines
    };
    let show_n = cli.show;
    let path = cli.path.display().to_string();

    let segments = read_segments(&cli.path, mode).with_context(|| format!("reading {}", path))?;
    let total_chars: usize = segments.iter().map(|s| s.text.chars().count()).sum();

    println!("File: {}", path);
    println!("Segmentation: {:?}", mode);
    println!("Segments: {} ({} chars)", segments.len(), total_chars);
    println!();

    for seg in segments.iter().take(show_n) {
        println!(
            "[P{:04}] chars={}  {}",
            seg.index + 1,
            seg.text.chars().count(),
            preview(&seg.text, 120)
        );
    }
    if segments.len() > show_n {
        println!("... ({} more segments)", segments.len() - show_n);
    }

    if let Some(out_path) = cli.out {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Output<'a> {
            file: &'a str,
            segmentation: SegmentationMode,
            total_chars: usize,
            segments: &'a [contractmatch_lib::models::Segment],
        }

        let out = Output {
            file: &path,
            segmentation: mode,
            total_chars,
            segments: &segments,
        };

        let json = serde_json::to_string_pretty(&out)?;
        std::fs::write(&out_path, json).with_context(|| format!("writing {}", out_path.display()))?;
        println!();
        println!("Wrote JSON: {}", out_path.display());
    }

    Ok(())
}
