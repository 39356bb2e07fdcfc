//! Map output: binary PGM rasters and the JSON run summary.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use occugrid_mapping::{PoseAssociation, ProbabilitySnapshot, RunStats};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Grey level for an occupancy probability: occupied is dark, free is light.
pub fn grey_level(probability: f64) -> u8 {
    (255.0 * (1.0 - probability)).round().clamp(0.0, 255.0) as u8
}

/// Encode a snapshot as a binary (P5) PGM image.
///
/// The first image row is the grid row with the highest `y`, so north is up.
pub fn encode_pgm(snapshot: &ProbabilitySnapshot) -> Vec<u8> {
    let header = format!("P5\n{} {}\n255\n", snapshot.width(), snapshot.height());
    let mut out = Vec::with_capacity(header.len() + snapshot.as_slice().len());
    out.extend_from_slice(header.as_bytes());
    for row in snapshot.rows().rev() {
        out.extend(row.iter().map(|&p| grey_level(p)));
    }
    out
}

pub fn write_pgm(snapshot: &ProbabilitySnapshot, path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(&encode_pgm(snapshot))?;
    writer.flush()
}

/// `dir/frame_000042.pgm` for the frame written after scan 42.
pub fn frame_path(dir: &Path, scans_done: usize) -> PathBuf {
    dir.join(format!("frame_{scans_done:06}.pgm"))
}

/// Machine-readable record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub log: PathBuf,
    pub map: PathBuf,
    pub association: PoseAssociation,
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    pub skipped_log_lines: usize,
    pub frames_written: usize,
    pub cells: CellCounts,
    pub stats: RunStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellCounts {
    pub free: usize,
    pub unknown: usize,
    pub occupied: usize,
}

impl From<(usize, usize, usize)> for CellCounts {
    fn from((free, unknown, occupied): (usize, usize, usize)) -> Self {
        Self {
            free,
            unknown,
            occupied,
        }
    }
}

pub fn write_summary(summary: &RunSummary, path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary).map_err(std::io::Error::other)?;
    writer.write_all(b"\n")?;
    writer.flush()
}
