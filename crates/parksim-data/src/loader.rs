//! Facility file loading: format detection, deserialization, and conversion
//! of the human-facing schema into engine configuration.

use log::{debug, info};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use parksim_core::config::{
    DensityThresholds, FacilityConfig, GateKind, GateSpec, TargetBand, TrafficPrecedence,
};
use parksim_core::engine::{Engine, EngineError};
use parksim_core::fixed::{Percent, checked_f64_to_fixed64, f64_to_fixed64};
use parksim_core::maintenance::{Toggle, ToggleKind};

use crate::schema::{
    FacilityData, GateData, GateKindData, GatePlacement, MaintenanceData, MaintenanceKindData,
    PrecedenceData,
};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading a facility file.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// No facility file with the given base name exists in the directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A field holds a value the engine cannot represent.
    #[error("invalid {field} in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        field: String,
        detail: String,
    },

    /// A maintenance preset names something the facility does not have.
    #[error("unresolved {kind:?} reference '{key}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        kind: ToggleKind,
        key: String,
    },

    /// The converted configuration was rejected by the engine.
    #[error("{file}: {source}")]
    Engine {
        file: PathBuf,
        #[source]
        source: EngineError,
    },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for `{base_name}.ron`, `.toml` or `.json`.
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but a missing file is an error.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format, path)
}

/// Deserialize in-memory `content`; `path` only labels errors.
pub fn deserialize_str<T: DeserializeOwned>(
    content: &str,
    format: Format,
    path: &Path,
) -> Result<T, DataLoadError> {
    let parse_err = |detail: String| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    };
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Json => serde_json::from_str(content).map_err(|e| parse_err(e.to_string())),
        Format::Toml => toml::from_str(content).map_err(|e| parse_err(e.to_string())),
    }
}

// ===========================================================================
// Conversion
// ===========================================================================

/// A loaded facility: engine configuration plus startup maintenance.
#[derive(Debug, Clone)]
pub struct FacilitySetup {
    pub config: FacilityConfig,
    pub maintenance: Vec<MaintenanceData>,
}

/// Convert a parsed file into engine configuration. `file` labels errors.
pub fn resolve_facility(data: FacilityData, file: &Path) -> Result<FacilitySetup, DataLoadError> {
    let invalid = |field: &str, detail: String| DataLoadError::InvalidValue {
        file: file.to_path_buf(),
        field: field.to_string(),
        detail,
    };

    let gates = data
        .gates
        .iter()
        .map(|gate| {
            resolve_gate(gate, data.rows, data.cols)
                .map_err(|detail| invalid("gate placement", detail))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let percent = |field: &str, v: f64| {
        to_percent(v).ok_or_else(|| invalid(field, format!("{v} is not a fraction in [0, 1]")))
    };
    let probability = |field: &str, v: f64| {
        if (0.0..=1.0).contains(&v) {
            Ok(f64_to_fixed64(v))
        } else {
            Err(invalid(field, format!("{v} is not a probability")))
        }
    };
    let rate = checked_f64_to_fixed64(data.pricing.rate).ok_or_else(|| {
        invalid(
            "pricing.rate",
            format!("{} is not a representable amount", data.pricing.rate),
        )
    })?;

    let config = FacilityConfig {
        rows: data.rows,
        cols: data.cols,
        zones: data.zones,
        gates,
        seed: data.seed,
        disabled_probability: probability(
            "pricing.disabled_fraction",
            data.pricing.disabled_fraction,
        )?,
        rate,
        band: TargetBand {
            min: percent("control.min_occupancy", data.control.min_occupancy)?,
            max: percent("control.max_occupancy", data.control.max_occupancy)?,
        },
        gain: percent("control.gain", data.control.gain)?,
        churn_probability: probability("control.churn", data.control.churn)?,
        density: DensityThresholds {
            medium: percent("traffic.medium_above", data.traffic.medium_above)?,
            high: percent("traffic.high_above", data.traffic.high_above)?,
        },
        occupancy_period: data.timing.occupancy_ms,
        traffic_period: data.timing.traffic_ms,
        traffic_precedence: match data.traffic.precedence {
            PrecedenceData::DensityAuthoritative => TrafficPrecedence::DensityAuthoritative,
            PrecedenceData::LastWriteWins => TrafficPrecedence::LastWriteWins,
        },
        event_capacity: data.events.capacity,
        command_history: data.events.command_history,
    };

    Ok(FacilitySetup {
        config,
        maintenance: data.maintenance,
    })
}

/// A `row`/`col` pair must name a cell of the grid; a column past the edge
/// would otherwise wrap onto the next row. Linear positions are range
/// checked by the engine.
fn resolve_gate(gate: &GateData, rows: usize, cols: usize) -> Result<GateSpec, String> {
    let position = match gate.placement() {
        Some(GatePlacement::Position(position)) => position,
        Some(GatePlacement::Cell { row, col }) => {
            if row >= rows || col >= cols {
                return Err(format!(
                    "gate '{}' at row {row}, col {col} is outside the {rows}x{cols} grid",
                    gate.label
                ));
            }
            row * cols + col
        }
        None => {
            return Err(format!(
                "gate '{}' needs either `position` or both `row` and `col`",
                gate.label
            ));
        }
    };
    let kind = match gate.kind {
        GateKindData::Entry => GateKind::Entry,
        GateKindData::Exit => GateKind::Exit,
    };
    Ok(GateSpec::new(gate.label.clone(), position, kind))
}

/// Round a fraction in `[0, 1]` to the nearest whole percent.
fn to_percent(v: f64) -> Option<Percent> {
    (0.0..=1.0)
        .contains(&v)
        .then(|| Percent((v * 100.0).round() as u32))
}

fn toggle_kind(kind: MaintenanceKindData) -> ToggleKind {
    match kind {
        MaintenanceKindData::Gate => ToggleKind::Gate,
        MaintenanceKindData::StreetHorizontal => ToggleKind::StreetHorizontal,
        MaintenanceKindData::StreetVertical => ToggleKind::StreetVertical,
        MaintenanceKindData::Zone => ToggleKind::Zone,
        MaintenanceKindData::Spot => ToggleKind::Spot,
    }
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// Load and convert a facility file.
pub fn load_facility(path: &Path) -> Result<FacilitySetup, DataLoadError> {
    let data: FacilityData = deserialize_file(path)?;
    let setup = resolve_facility(data, path)?;
    debug!(
        "loaded {} ({}x{}, {} gates, {} maintenance presets)",
        path.display(),
        setup.config.rows,
        setup.config.cols,
        setup.config.gates.len(),
        setup.maintenance.len()
    );
    Ok(setup)
}

/// Load only the engine configuration from a facility file.
pub fn load_facility_config(path: &Path) -> Result<FacilityConfig, DataLoadError> {
    Ok(load_facility(path)?.config)
}

/// Build an engine from a loaded facility. Maintenance presets are queued
/// and take effect at the start of the first tick, before any vehicle moves.
pub fn build_engine(setup: FacilitySetup, file: &Path) -> Result<Engine, DataLoadError> {
    let engine_err = |source: EngineError| DataLoadError::Engine {
        file: file.to_path_buf(),
        source,
    };
    let mut engine = Engine::new(setup.config).map_err(engine_err)?;

    for preset in &setup.maintenance {
        let kind = toggle_kind(preset.kind);
        let toggle = Toggle::parse(kind, &preset.key, true, engine.layout()).map_err(|_| {
            DataLoadError::UnresolvedRef {
                file: file.to_path_buf(),
                kind,
                key: preset.key.clone(),
            }
        })?;
        engine.toggle(toggle).map_err(engine_err)?;
    }

    info!(
        "engine ready from {} with {} maintenance presets",
        file.display(),
        setup.maintenance.len()
    );
    Ok(engine)
}

/// Load a facility file and build its engine.
pub fn load_engine(path: &Path) -> Result<Engine, DataLoadError> {
    let setup = load_facility(path)?;
    build_engine(setup, path)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "parksim_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const SMALL_TOML: &str = r#"
        rows = 8
        cols = 8
        zones = ["A", "B"]
        gates = [
            { label = "IN", kind = "entry", position = 0 },
            { label = "OUT", kind = "exit", row = 4, col = 0 },
        ]

        [control]
        min_occupancy = 0.25
        gain = 0.5
    "#;

    fn small_data() -> FacilityData {
        toml::from_str(SMALL_TOML).unwrap()
    }

    // -----------------------------------------------------------------------
    // Format detection and discovery
    // -----------------------------------------------------------------------

    #[test]
    fn detect_formats() {
        assert_eq!(detect_format(Path::new("f.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("f.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("f.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("f.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("conflict");
        fs::write(dir.join("facility.ron"), "()").unwrap();
        fs::write(dir.join("facility.json"), "{}").unwrap();
        assert!(matches!(
            find_data_file(&dir, "facility"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("missing");
        assert!(matches!(
            require_data_file(&dir, "facility"),
            Err(DataLoadError::MissingRequired { .. })
        ));
        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Conversion
    // -----------------------------------------------------------------------

    #[test]
    fn converts_fractions_to_percents() {
        let setup = resolve_facility(small_data(), Path::new("small.toml")).unwrap();
        let cfg = setup.config;
        assert_eq!(cfg.band.min, Percent(25));
        assert_eq!(cfg.band.max, Percent(90));
        assert_eq!(cfg.gain, Percent(50));
        assert_eq!(cfg.gates[1].position, 32);
        assert_eq!(cfg.gates[1].kind, GateKind::Exit);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn out_of_range_fraction_is_rejected() {
        let mut data = small_data();
        data.control.max_occupancy = 1.5;
        let err = resolve_facility(data, Path::new("small.toml")).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidValue { ref field, .. } if field == "control.max_occupancy"));
    }

    #[test]
    fn gate_without_placement_is_rejected() {
        let mut data = small_data();
        data.gates[0].position = None;
        assert!(matches!(
            resolve_facility(data, Path::new("small.toml")),
            Err(DataLoadError::InvalidValue { .. })
        ));
    }

    #[test]
    fn gate_cell_outside_grid_is_rejected() {
        // Column 12 on an 8-column grid must not wrap onto row 1.
        let mut data = small_data();
        data.gates[0].position = None;
        data.gates[0].row = Some(0);
        data.gates[0].col = Some(12);
        let err = resolve_facility(data, Path::new("small.toml")).unwrap_err();
        assert!(matches!(err, DataLoadError::InvalidValue { ref field, .. } if field == "gate placement"));

        let mut data = small_data();
        data.gates[1].row = Some(8);
        assert!(matches!(
            resolve_facility(data, Path::new("small.toml")),
            Err(DataLoadError::InvalidValue { .. })
        ));
    }

    #[test]
    fn unrepresentable_rate_is_rejected() {
        for rate in [1e12, -1e12, f64::NAN, f64::INFINITY] {
            let mut data = small_data();
            data.pricing.rate = rate;
            let err = resolve_facility(data, Path::new("small.toml")).unwrap_err();
            assert!(
                matches!(err, DataLoadError::InvalidValue { ref field, .. } if field == "pricing.rate"),
                "rate {rate} gave {err:?}"
            );
        }

        let data: FacilityData = toml::from_str(&format!("{SMALL_TOML}\n[pricing]\nrate = 1e12\n")).unwrap();
        assert!(resolve_facility(data, Path::new("small.toml")).is_err());
    }

    #[test]
    fn engine_rejects_off_street_gate() {
        let mut data = small_data();
        data.gates[0].position = Some(9); // (1, 1) is a spot
        let setup = resolve_facility(data, Path::new("small.toml")).unwrap();
        assert!(matches!(
            build_engine(setup, Path::new("small.toml")),
            Err(DataLoadError::Engine { .. })
        ));
    }

    #[test]
    fn unknown_preset_is_unresolved() {
        let mut setup = resolve_facility(small_data(), Path::new("small.toml")).unwrap();
        setup.maintenance.push(MaintenanceData {
            kind: MaintenanceKindData::Zone,
            key: "Q".to_string(),
        });
        assert!(matches!(
            build_engine(setup, Path::new("small.toml")),
            Err(DataLoadError::UnresolvedRef { kind: ToggleKind::Zone, .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Full pipeline
    // -----------------------------------------------------------------------

    #[test]
    fn load_engine_from_each_format() {
        let dir = make_test_dir("formats");
        fs::write(dir.join("a.toml"), SMALL_TOML).unwrap();
        fs::write(
            dir.join("b.json"),
            r#"{"rows": 8, "cols": 8, "zones": ["A", "B"],
                "gates": [{"label": "IN", "kind": "entry", "position": 0},
                          {"label": "OUT", "kind": "exit", "position": 32}]}"#,
        )
        .unwrap();
        fs::write(
            dir.join("c.ron"),
            r#"(rows: 8, cols: 8, zones: ["A", "B"],
                gates: [(label: "IN", kind: entry, position: Some(0)),
                        (label: "OUT", kind: exit, row: Some(4), col: Some(0))])"#,
        )
        .unwrap();

        for file in ["a.toml", "b.json", "c.ron"] {
            let engine = load_engine(&dir.join(file)).unwrap();
            assert_eq!(engine.layout().total_spots(), 36, "{file}");
            assert_eq!(engine.layout().gate_by_label("OUT").unwrap().row, 4);
        }
        cleanup(&dir);
    }

    #[test]
    fn parse_error_names_the_file() {
        let dir = make_test_dir("parse");
        let path = dir.join("broken.toml");
        fs::write(&path, "rows = ").unwrap();
        match load_facility(&path) {
            Err(DataLoadError::Parse { file, .. }) => assert_eq!(file, path),
            other => panic!("expected parse error, got {other:?}"),
        }
        cleanup(&dir);
    }
}
