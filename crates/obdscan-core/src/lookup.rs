//! DTC description lookup.
//!
//! The scan itself only produces codes; turning a code into text is the job
//! of a `DescriptionLookup`. Two sources are bundled: a small static table
//! of generic SAE codes and a TOML database with one table per system.
//!
//! ```toml
//! [powertrain]
//! P0105 = "Manifold Absolute Pressure/Barometric Pressure Circuit Malfunction"
//!
//! [network]
//! U0100 = "Lost Communication With ECM/PCM A"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::thread;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::dtc::{DiagnosticTroubleCode, FaultSystem};

/// Resolves a formatted code (e.g. `"P0105"`) to a description.
/// `None` means the code is unknown to this source.
pub trait DescriptionLookup: Send + Sync {
    fn resolve(&self, code: &str) -> Option<String>;
}

/// Built-in descriptions for common generic codes.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticDtcTable;

impl DescriptionLookup for StaticDtcTable {
    fn resolve(&self, code: &str) -> Option<String> {
        static_description(&code.to_ascii_uppercase()).map(str::to_string)
    }
}

fn static_description(code: &str) -> Option<&'static str> {
    let description = match code {
        // Powertrain - fuel and air metering
        "P0100" => "Mass or Volume Air Flow Circuit Malfunction",
        "P0101" => "Mass or Volume Air Flow Circuit Range/Performance Problem",
        "P0105" => "Manifold Absolute Pressure/Barometric Pressure Circuit Malfunction",
        "P0106" => "Manifold Absolute Pressure/Barometric Pressure Circuit Range/Performance Problem",
        "P0110" => "Intake Air Temperature Circuit Malfunction",
        "P0115" => "Engine Coolant Temperature Circuit Malfunction",
        "P0120" => "Throttle Position Sensor/Switch A Circuit Malfunction",
        "P0130" => "O2 Sensor Circuit Malfunction (Bank 1 Sensor 1)",
        "P0171" => "System Too Lean (Bank 1)",
        "P0172" => "System Too Rich (Bank 1)",
        // Powertrain - injector circuit
        "P0200" => "Injector Circuit Malfunction",
        "P0201" => "Injector Circuit Malfunction - Cylinder 1",
        "P0202" => "Injector Circuit Malfunction - Cylinder 2",
        "P0203" => "Injector Circuit Malfunction - Cylinder 3",
        "P0204" => "Injector Circuit Malfunction - Cylinder 4",
        // Powertrain - ignition
        "P0300" => "Random/Multiple Cylinder Misfire Detected",
        "P0301" => "Cylinder 1 Misfire Detected",
        "P0302" => "Cylinder 2 Misfire Detected",
        "P0335" => "Crankshaft Position Sensor A Circuit Malfunction",
        // Powertrain - emission controls
        "P0420" => "Catalyst System Efficiency Below Threshold (Bank 1)",
        "P0442" => "Evaporative Emission Control System Leak Detected (small leak)",
        "P0455" => "Evaporative Emission Control System Leak Detected (gross leak)",
        // Powertrain - speed and idle control
        "P0500" => "Vehicle Speed Sensor Malfunction",
        "P0505" => "Idle Control System Malfunction",
        // Chassis
        "C0035" => "Left Front Wheel Speed Sensor Circuit",
        "C0040" => "Right Front Wheel Speed Sensor Circuit",
        // Body
        "B1000" => "ECU Malfunction",
        // Network
        "U0100" => "Lost Communication With ECM/PCM A",
        "U0121" => "Lost Communication With Anti-Lock Brake System (ABS) Control Module",
        "U0155" => "Lost Communication With Instrument Panel Cluster (IPC) Control Module",
        _ => return None,
    };
    Some(description)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DatabaseFile {
    powertrain: HashMap<String, String>,
    chassis: HashMap<String, String>,
    body: HashMap<String, String>,
    network: HashMap<String, String>,
}

/// Descriptions loaded from a TOML file, one table per system.
#[derive(Debug, Default)]
pub struct TomlDtcDatabase {
    tables: HashMap<FaultSystem, HashMap<String, String>>,
}

impl TomlDtcDatabase {
    /// Load a database from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading DTC database {}", path.display()))?;
        let db = Self::from_toml_str(&content)
            .with_context(|| format!("parsing DTC database {}", path.display()))?;
        info!(path = %path.display(), entries = db.len(), "DTC database loaded");
        Ok(db)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: DatabaseFile = toml::from_str(content)?;
        let normalise = |table: HashMap<String, String>| {
            table
                .into_iter()
                .map(|(k, v)| (k.to_ascii_uppercase(), v))
                .collect::<HashMap<_, _>>()
        };

        let mut tables = HashMap::new();
        tables.insert(FaultSystem::Powertrain, normalise(file.powertrain));
        tables.insert(FaultSystem::Chassis, normalise(file.chassis));
        tables.insert(FaultSystem::Body, normalise(file.body));
        tables.insert(FaultSystem::Network, normalise(file.network));
        Ok(Self { tables })
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DescriptionLookup for TomlDtcDatabase {
    fn resolve(&self, code: &str) -> Option<String> {
        let system = FaultSystem::from_letter(code.chars().next()?)?;
        self.tables
            .get(&system)?
            .get(&code.to_ascii_uppercase())
            .cloned()
    }
}

/// Tries each source in order; first hit wins.
#[derive(Default)]
pub struct LayeredLookup {
    layers: Vec<Box<dyn DescriptionLookup>>,
}

impl LayeredLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: impl DescriptionLookup + 'static) -> Self {
        self.layers.push(Box::new(layer));
        self
    }
}

impl DescriptionLookup for LayeredLookup {
    fn resolve(&self, code: &str) -> Option<String> {
        self.layers.iter().find_map(|l| l.resolve(code))
    }
}

/// A decoded code with its description, if one was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DtcReport {
    pub code: String,
    pub system: FaultSystem,
    pub description: Option<String>,
}

impl fmt::Display for DtcReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(d) => write!(f, "{} {}", self.code, d),
            None => write!(f, "{} no description found", self.code),
        }
    }
}

/// Resolve every code, one worker per code, keeping dump order.
///
/// A missing description never stops the others; it is reported as
/// `description: None`.
pub fn resolve_all<L>(lookup: &L, codes: &[DiagnosticTroubleCode]) -> Vec<DtcReport>
where
    L: DescriptionLookup + ?Sized,
{
    thread::scope(|s| {
        let workers: Vec<_> = codes
            .iter()
            .map(|dtc| {
                s.spawn(move || {
                    let code = dtc.code();
                    let description = lookup.resolve(&code);
                    DtcReport {
                        code,
                        system: dtc.system(),
                        description,
                    }
                })
            })
            .collect();

        workers
            .into_iter()
            .zip(codes)
            .map(|(worker, dtc)| {
                let report = worker.join().unwrap_or_else(|_| {
                    warn!(code = %dtc, "Lookup worker panicked");
                    DtcReport {
                        code: dtc.code(),
                        system: dtc.system(),
                        description: None,
                    }
                });
                if report.description.is_none() {
                    debug!(code = %report.code, "No description");
                }
                report
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtc::decode_all;
    use std::time::Duration;

    const DB: &str = r#"
[powertrain]
P0105 = "MAP circuit"
p1a2b = "Manufacturer specific"

[network]
U0100 = "Lost comms with ECM"
"#;

    #[test]
    fn test_static_table() {
        assert!(StaticDtcTable.resolve("P0300").is_some());
        assert!(StaticDtcTable.resolve("p0300").is_some());
        assert_eq!(StaticDtcTable.resolve("P3FFF"), None);
    }

    #[test]
    fn test_toml_database_per_system() {
        let db = TomlDtcDatabase::from_toml_str(DB).unwrap();
        assert_eq!(db.len(), 3);
        assert_eq!(db.resolve("P0105").as_deref(), Some("MAP circuit"));
        assert_eq!(db.resolve("P1A2B").as_deref(), Some("Manufacturer specific"));
        assert_eq!(db.resolve("U0100").as_deref(), Some("Lost comms with ECM"));
        // Right code, wrong system table
        assert_eq!(db.resolve("C0105"), None);
        assert_eq!(db.resolve(""), None);
    }

    #[test]
    fn test_toml_database_rejects_garbage() {
        assert!(TomlDtcDatabase::from_toml_str("[powertrain\nP0105 = ").is_err());
    }

    #[test]
    fn test_layered_lookup_prefers_first() {
        let lookup = LayeredLookup::new()
            .with_layer(TomlDtcDatabase::from_toml_str(DB).unwrap())
            .with_layer(StaticDtcTable);
        assert_eq!(lookup.resolve("P0105").as_deref(), Some("MAP circuit"));
        assert!(lookup.resolve("P0300").is_some());
        assert_eq!(lookup.resolve("B3FFF"), None);
    }

    /// Answers slower for earlier codes so completion order is reversed.
    struct SlowFirst;

    impl DescriptionLookup for SlowFirst {
        fn resolve(&self, code: &str) -> Option<String> {
            if code == "P0105" {
                std::thread::sleep(Duration::from_millis(50));
            }
            (code != "B1234").then(|| format!("desc {code}"))
        }
    }

    #[test]
    fn test_resolve_all_keeps_dump_order_and_tolerates_not_found() {
        let codes = decode_all("010592340203").unwrap();
        let reports = resolve_all(&SlowFirst, &codes);

        let order: Vec<&str> = reports.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(order, vec!["P0105", "B1234", "P0203"]);
        assert_eq!(reports[0].description.as_deref(), Some("desc P0105"));
        assert_eq!(reports[1].description, None);
        assert_eq!(reports[1].to_string(), "B1234 no description found");
        assert_eq!(reports[2].system, FaultSystem::Powertrain);
    }
}
