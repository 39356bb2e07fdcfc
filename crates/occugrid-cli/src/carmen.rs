//! Reader for CARMEN-style text logs.
//!
//! Only `FLASER` (front laser) records are used:
//!
//! ```text
//! FLASER n r1 … rn x y theta odom_x odom_y odom_theta ipc_timestamp ipc_hostname logger_timestamp
//! ```
//!
//! Each record yields one [`Scan`] (beam angles spread over the configured
//! field of view) and one [`StampedPose`] (the laser pose `x y theta`), both
//! stamped with `ipc_timestamp`. Records without timestamps are stamped
//! with their ordinal among the accepted `FLASER` records. Any field that is
//! present but does not parse makes the whole record malformed; it is
//! skipped and counted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use occugrid_types::{Pose, Scan, StampedPose};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum LogError {
    #[error("Failed to open log {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to read log at line {line}: {source}")]
    Read {
        line: usize,
        source: std::io::Error,
    },
}

/// Poses and scans extracted from one log, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLog {
    pub poses: Vec<StampedPose>,
    pub scans: Vec<Scan>,
    /// `FLASER` lines that could not be parsed.
    pub skipped_lines: usize,
}

/// Open and parse the log at `path`.
pub fn read_log(path: &Path, field_of_view: f64) -> Result<ParsedLog, LogError> {
    let file = File::open(path).map_err(|source| LogError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    parse_log(BufReader::new(file), field_of_view)
}

/// Parse a log from any buffered reader.
pub fn parse_log<R: BufRead>(reader: R, field_of_view: f64) -> Result<ParsedLog, LogError> {
    let mut log = ParsedLog::default();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|source| LogError::Read {
            line: line_no,
            source,
        })?;
        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("FLASER") {
            continue;
        }

        let ordinal = log.scans.len() as f64;
        match parse_flaser(tokens, ordinal, field_of_view) {
            Ok((pose, scan)) => {
                log.poses.push(pose);
                log.scans.push(scan);
            }
            Err(reason) => {
                warn!(line = line_no, reason, "Skipping malformed FLASER record");
                log.skipped_lines += 1;
            }
        }
    }

    debug!(
        scans = log.scans.len(),
        skipped = log.skipped_lines,
        "Parsed CARMEN log"
    );
    Ok(log)
}

/// Parse the fields after the `FLASER` keyword.
fn parse_flaser<'a, I>(
    mut tokens: I,
    ordinal: f64,
    field_of_view: f64,
) -> Result<(StampedPose, Scan), &'static str>
where
    I: Iterator<Item = &'a str>,
{
    let count: usize = tokens
        .next()
        .ok_or("missing beam count")?
        .parse()
        .map_err(|_| "invalid beam count")?;

    // Ok(None) when the token is absent, Err when it is present but garbled.
    let mut optional = || -> Result<Option<f64>, &'static str> {
        tokens
            .next()
            .map(|t| t.parse::<f64>().map_err(|_| "invalid number"))
            .transpose()
    };
    let mut required = |missing: &'static str| -> Result<f64, &'static str> {
        optional()?.ok_or(missing)
    };

    let ranges = (0..count)
        .map(|_| required("fewer ranges than announced"))
        .collect::<Result<Vec<_>, _>>()?;
    let x = required("missing laser pose")?;
    let y = required("missing laser pose")?;
    let theta = required("missing laser pose")?;

    // Odometry may be absent but must parse when present; the laser pose
    // supersedes it.
    for _ in 0..3 {
        optional()?;
    }
    let timestamp = optional()?.unwrap_or(ordinal);

    let pose = Pose::new(x, y, theta);
    if !pose.is_finite() || !timestamp.is_finite() {
        return Err("non-finite pose or timestamp");
    }

    Ok((
        StampedPose::new(timestamp, pose),
        Scan::from_sweep(timestamp, &ranges, field_of_view),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn parse(text: &str) -> ParsedLog {
        parse_log(text.as_bytes(), PI).expect("in-memory read")
    }

    // ── records ─────────────────────────────────────────────────────────────

    #[test]
    fn full_record_yields_pose_and_scan() {
        let log = parse(
            "FLASER 3 1.0 2.0 3.0 0.5 -1.0 0.25 0.4 -0.9 0.2 1001.5 robot 1001.6\n",
        );
        assert_eq!(log.skipped_lines, 0);
        assert_eq!(log.poses, vec![StampedPose::new(1001.5, Pose::new(0.5, -1.0, 0.25))]);

        let scan = &log.scans[0];
        assert_eq!(scan.timestamp, 1001.5);
        let ranges: Vec<f64> = scan.beams.iter().map(|b| b.range).collect();
        assert_eq!(ranges, vec![1.0, 2.0, 3.0]);
        assert!((scan.beams[0].angle_offset + PI / 2.0).abs() < 1e-12);
        assert!(scan.beams[1].angle_offset.abs() < 1e-12);
    }

    #[test]
    fn missing_timestamp_falls_back_to_ordinal() {
        let log = parse("FLASER 1 4.0 0 0 0\nFLASER 1 4.0 1 0 0\n");
        let stamps: Vec<f64> = log.poses.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![0.0, 1.0]);
        assert_eq!(log.scans[1].timestamp, 1.0);
    }

    #[test]
    fn zero_beam_record_gives_empty_scan() {
        let log = parse("FLASER 0 1 2 0 1 2 0 7.0 host 7.1\n");
        assert_eq!(log.scans.len(), 1);
        assert!(log.scans[0].is_empty());
        assert_eq!(log.poses[0].pose.x, 1.0);
    }

    // ── filtering ───────────────────────────────────────────────────────────

    #[test]
    fn other_lines_are_ignored() {
        let log = parse(
            "# CARMEN Logfile\n\
             PARAM robot_front_laser_max 50.0 host 0\n\
             ODOM 0 0 0 0 0 0 1.0 host 1.0\n\
             \n\
             FLASER 1 2.5 0 0 0 0 0 0 2.0 host 2.0\n\
             RLASER 1 2.5 0 0 0 0 0 0 2.0 host 2.0\n",
        );
        assert_eq!(log.scans.len(), 1);
        assert_eq!(log.skipped_lines, 0);
    }

    #[test]
    fn malformed_records_are_counted_and_skipped() {
        let log = parse(
            "FLASER\n\
             FLASER x 1 2 3\n\
             FLASER 3 1.0 2.0\n\
             FLASER 1 1.0 zero 0 0\n\
             FLASER 1 1.0 nan 0 0 0 0 0 3.0 host 3.0\n\
             FLASER 1 1.0 0 0 0 0 0 0 4.0 host 4.0\n",
        );
        assert_eq!(log.skipped_lines, 5);
        assert_eq!(log.scans.len(), 1);
        assert_eq!(log.scans[0].timestamp, 4.0);
    }

    #[test]
    fn garbled_timestamp_skips_record_instead_of_using_ordinal() {
        let log = parse(
            "FLASER 1 1.0 0 0 0 0 0 0 1001.0 host 1001.0\n\
             FLASER 1 1.0 0 0 0 0 0 0 garbage host 1002.0\n\
             FLASER 1 1.0 0 0 0 0 0 0 1003.0 host 1003.0\n",
        );
        assert_eq!(log.skipped_lines, 1);
        let stamps: Vec<f64> = log.poses.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![1001.0, 1003.0]);
        assert!(occugrid_mapping::PoseTrack::new(log.poses).is_ok());
    }

    #[test]
    fn garbled_odometry_skips_record() {
        let log = parse(
            "FLASER 1 1.0 0 0 0 0 oops 0 5.0 host 5.0\n\
             FLASER 1 1.0 0 0 0 0 0\n\
             FLASER 1 1.0 0 0 0 0 0 0 6.0 host 6.0\n",
        );
        assert_eq!(log.skipped_lines, 1);
        // Truncated odometry is tolerated and stamped with the ordinal.
        let stamps: Vec<f64> = log.poses.iter().map(|p| p.timestamp).collect();
        assert_eq!(stamps, vec![0.0, 6.0]);
    }

    #[test]
    fn read_log_reports_missing_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = read_log(&dir.path().join("absent.log"), PI).unwrap_err();
        assert!(matches!(err, LogError::Open { .. }));
    }

    #[test]
    fn read_log_from_disk() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("run.log");
        std::fs::write(&path, "FLASER 2 1 1 0 0 0 0 0 0 5.0 host 5.0\n").expect("write");
        let log = read_log(&path, PI).expect("parse");
        assert_eq!(log.scans[0].len(), 2);
    }
}
