//! Run configuration – reads the TOML file given with `--config`.
//!
//! ```toml
//! association = "nearest"
//!
//! [grid]
//! width = 800
//! height = 800
//! resolution = 0.1
//! # origin_x / origin_y default to centring X and placing the start a
//! # third of the way up Y.
//!
//! [sensor]
//! max_range = 50.0
//! field_of_view = 3.14159
//!
//! [model]
//! prior = 0.5
//! log_odds_hit = 0.9
//! log_odds_free = -0.7
//!
//! [output]
//! frames_every = 0
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use occugrid_mapping::{GridConfig, MapperConfig, ModelConfig, PoseAssociation, SensorConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config at {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config at {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Config file {} does not exist", .0.display())]
    Missing(PathBuf),
}

/// `[grid]` section. Unlike [`GridConfig`] the origin is optional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSection {
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_y: Option<f64>,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            width: 800,
            height: 800,
            resolution: 0.1,
            origin_x: None,
            origin_y: None,
        }
    }
}

impl GridSection {
    /// Resolve the origin: by default the log's world origin lands at the
    /// horizontal centre of the grid and one third of the way up.
    pub fn to_grid_config(&self) -> GridConfig {
        let extent_x = self.width as f64 * self.resolution;
        let extent_y = self.height as f64 * self.resolution;
        GridConfig {
            width: self.width,
            height: self.height,
            resolution: self.resolution,
            origin_x: self.origin_x.unwrap_or(-extent_x / 2.0),
            origin_y: self.origin_y.unwrap_or(-extent_y / 3.0),
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Write a PGM frame every N scans; 0 disables frames.
    pub frames_every: usize,
    /// Cells below this probability are reported as free.
    pub free_threshold: f64,
    /// Cells above this probability are reported as occupied.
    pub occupied_threshold: f64,
    /// Optional JSON run summary path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PathBuf>,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            frames_every: 0,
            free_threshold: 0.35,
            occupied_threshold: 0.65,
            summary: None,
        }
    }
}

/// Everything the `occugrid` binary reads from its config file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub association: PoseAssociation,
    pub grid: GridSection,
    pub sensor: SensorConfig,
    pub model: ModelConfig,
    pub output: OutputSection,
}

impl Settings {
    /// The engine's view of these settings. Validation happens in
    /// [`Mapper::new`][occugrid_mapping::Mapper::new].
    pub fn mapper_config(&self) -> MapperConfig {
        MapperConfig {
            grid: self.grid.to_grid_config(),
            sensor: self.sensor,
            model: self.model,
            association: self.association,
        }
    }
}

/// Load settings from `path` (or defaults when `None`) and apply
/// `OCCUGRID_*` overrides.
pub fn resolve(path: Option<&Path>) -> Result<Settings, ConfigError> {
    match path {
        Some(p) => load_from(p)?.ok_or_else(|| ConfigError::Missing(p.to_path_buf())),
        None => {
            let mut settings = Settings::default();
            apply_env_overrides(&mut settings);
            Ok(settings)
        }
    }
}

/// Load settings from a specific path. Returns `None` if the file does not
/// exist.
pub fn load_from(path: &Path) -> Result<Option<Settings>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut settings: Settings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    apply_env_overrides(&mut settings);
    Ok(Some(settings))
}

/// Apply `OCCUGRID_*` environment variable overrides.
///
/// | Variable | Field |
/// |---|---|
/// | `OCCUGRID_RESOLUTION` | `grid.resolution` |
/// | `OCCUGRID_MAX_RANGE` | `sensor.max_range` |
/// | `OCCUGRID_PRIOR` | `model.prior` |
/// | `OCCUGRID_FRAMES_EVERY` | `output.frames_every` |
///
/// Values that fail to parse are ignored.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let float = |key: &str| lookup(key).and_then(|v| v.trim().parse::<f64>().ok());

    if let Some(v) = float("OCCUGRID_RESOLUTION") {
        settings.grid.resolution = v;
    }
    if let Some(v) = float("OCCUGRID_MAX_RANGE") {
        settings.sensor.max_range = v;
    }
    if let Some(v) = float("OCCUGRID_PRIOR") {
        settings.model.prior = v;
    }
    if let Some(v) = lookup("OCCUGRID_FRAMES_EVERY")
        && let Ok(n) = v.trim().parse::<usize>()
    {
        settings.output.frames_every = n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_settings_produce_valid_mapper_config() {
        let cfg = Settings::default().mapper_config();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn default_origin_anchors_like_the_recorder() {
        let grid = GridSection {
            width: 300,
            height: 600,
            resolution: 0.5,
            origin_x: None,
            origin_y: None,
        }
        .to_grid_config();
        assert_eq!(grid.origin_x, -75.0);
        assert_eq!(grid.origin_y, -100.0);
    }

    #[test]
    fn explicit_origin_is_kept() {
        let grid = GridSection {
            origin_x: Some(1.5),
            origin_y: Some(-2.0),
            ..GridSection::default()
        }
        .to_grid_config();
        assert_eq!((grid.origin_x, grid.origin_y), (1.5, -2.0));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let result = load_from(&dir.path().join("nope.toml")).expect("no error");
        assert!(result.is_none());
    }

    #[test]
    fn resolve_errors_on_missing_explicit_path() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let err = resolve(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn load_from_parses_partial_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("run.toml");
        fs::write(
            &path,
            r#"
association = "interpolated"

[grid]
width = 120
origin_x = -6.0

[model]
log_odds_hit = 1.2

[output]
frames_every = 25
"#,
        )
        .expect("write");

        let settings = load_from(&path).expect("load ok").expect("some");
        assert_eq!(settings.association, PoseAssociation::Interpolated);
        assert_eq!(settings.grid.width, 120);
        assert_eq!(settings.grid.origin_x, Some(-6.0));
        assert_eq!(settings.grid.origin_y, None);
        assert_eq!(settings.model.log_odds_hit, 1.2);
        assert_eq!(settings.model.log_odds_free, ModelConfig::default().log_odds_free);
        assert_eq!(settings.output.frames_every, 25);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("bad.toml");
        fs::write(&path, "[grid]\nwidth = \"wide\"\n").expect("write");
        let err = load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn settings_roundtrip_through_toml() {
        let mut settings = Settings::default();
        settings.grid.origin_y = Some(3.0);
        settings.output.summary = Some(PathBuf::from("summary.json"));
        let raw = toml::to_string_pretty(&settings).expect("serialize");
        let back: Settings = toml::from_str(&raw).expect("parse");
        assert_eq!(settings, back);
    }

    #[test]
    fn overrides_apply_parsed_values() {
        let mut settings = Settings::default();
        apply_overrides_from(
            &mut settings,
            env(&[
                ("OCCUGRID_RESOLUTION", "0.05"),
                ("OCCUGRID_MAX_RANGE", " 30 "),
                ("OCCUGRID_PRIOR", "0.4"),
                ("OCCUGRID_FRAMES_EVERY", "10"),
            ]),
        );
        assert_eq!(settings.grid.resolution, 0.05);
        assert_eq!(settings.sensor.max_range, 30.0);
        assert_eq!(settings.model.prior, 0.4);
        assert_eq!(settings.output.frames_every, 10);
    }

    #[test]
    fn overrides_ignore_invalid_values() {
        let mut settings = Settings::default();
        let original = settings.clone();
        apply_overrides_from(
            &mut settings,
            env(&[("OCCUGRID_RESOLUTION", "fine"), ("OCCUGRID_FRAMES_EVERY", "-3")]),
        );
        assert_eq!(settings, original);
    }
}
