//! SubRip codec.
//!
//! Encoding turns recognized [`Segment`]s into numbered SRT blocks. Decoding is
//! lenient: it yields [`TranslationBlock`]s whose timing lines are kept as
//! opaque text, and silently drops any block that is not exactly
//! label / timing / text.

use std::path::Path;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::Result;

/// One recognized span of speech on the global timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// A parsed subtitle entry. Only `text` is ever rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationBlock {
    pub label: String,
    pub timing: String,
    pub text: String,
}

/// Encode segments as SRT text, numbering blocks from 1.
pub fn encode(segments: &[Segment]) -> String {
    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        let text = segment.text.trim();
        let text = text.strip_prefix("- ").unwrap_or(text);

        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            format_srt_time(segment.start),
            format_srt_time(segment.end),
            text
        ));
    }

    srt_content
}

/// Decode SRT text into blocks, discarding malformed ones.
pub fn decode(srt_text: &str) -> Vec<TranslationBlock> {
    let srt_text = srt_text.strip_prefix('\u{feff}').unwrap_or(srt_text);

    let mut blocks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut dropped = 0usize;

    for line in srt_text.lines().chain(std::iter::once("")) {
        if !line.trim().is_empty() {
            current.push(line);
            continue;
        }
        if current.is_empty() {
            continue;
        }
        match current.as_slice() {
            [label, timing, text] => blocks.push(TranslationBlock {
                label: label.to_string(),
                timing: timing.to_string(),
                text: text.to_string(),
            }),
            _ => dropped += 1,
        }
        current.clear();
    }

    if dropped > 0 {
        debug!("Dropped {} malformed subtitle blocks", dropped);
    }
    blocks
}

/// Re-encode decoded blocks, preserving label and timing text exactly.
pub fn encode_blocks(blocks: &[TranslationBlock]) -> String {
    let mut srt_content = String::new();
    for block in blocks {
        srt_content.push_str(&format!("{}\n{}\n{}\n\n", block.label, block.timing, block.text));
    }
    srt_content
}

/// Generate an SRT file from segments
pub async fn write_srt<P: AsRef<Path>>(segments: &[Segment], output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    fs::write(output_path, encode(segments)).await?;

    info!("SRT file generated with {} segments", segments.len());
    Ok(())
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    let total_milliseconds = (seconds * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}
