//! Wire types exchanged with the PINN benchmark server.
//!
//! Field names follow the server's JSON exactly, including the capitalised
//! sampling parameters (`N_data`, `Lx`, ...). Anything the client does not
//! model explicitly is kept in [`BenchmarkConfig::extra`] so a fetch/save
//! cycle never drops server-side settings.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Directory (relative to the server root) where uploaded meshes land.
pub const MESH_DIR: &str = "meshes/files";

/// Metric key for the PINN model.
pub const PINN_MODEL: &str = "PINN";

/// Metric key for the finite-element reference solver.
pub const FEM_MODEL: &str = "FEM";

/// Benchmark configuration as stored in the server's `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Problem identifier, e.g. `electrostatic_mesh` or `poisson_2d`.
    pub problem: String,
    /// Mesh path relative to the server root.
    pub mesh_file: String,
    /// Number of training samples.
    #[serde(rename = "N_data")]
    pub n_data: u64,
    /// Number of test samples.
    #[serde(rename = "N_test")]
    pub n_test: u64,
    /// Whether the problem is solved on the mesh.
    pub use_mesh: bool,
    /// Boundary name to prescribed value.
    pub boundary_conditions: BTreeMap<String, f64>,
    /// Network hyper-parameters, passed through untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pinn_config: Option<Map<String, Value>>,
    /// Domain width.
    #[serde(rename = "Lx", skip_serializing_if = "Option::is_none")]
    pub lx: Option<f64>,
    /// Domain height.
    #[serde(rename = "Ly", skip_serializing_if = "Option::is_none")]
    pub ly: Option<f64>,
    /// Training time horizon for transient problems.
    #[serde(rename = "T_train", skip_serializing_if = "Option::is_none")]
    pub t_train: Option<f64>,
    /// Thermal diffusivity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    /// Wave speed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c: Option<f64>,
    /// Excitation frequency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    /// Conductivity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sigma: Option<f64>,
    /// Permeability.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mu: Option<f64>,
    /// Grid points along x.
    #[serde(rename = "Nx_train", skip_serializing_if = "Option::is_none")]
    pub nx_train: Option<u32>,
    /// Grid points along y.
    #[serde(rename = "Ny_train", skip_serializing_if = "Option::is_none")]
    pub ny_train: Option<u32>,
    /// Server-side keys not modelled above (`slice_config`, `train_box`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BenchmarkConfig {
    /// Point the configuration at a mesh that was uploaded under [`MESH_DIR`].
    pub fn use_uploaded_mesh(&mut self, filename: &str) {
        self.mesh_file = format!("{MESH_DIR}/{filename}");
        self.use_mesh = true;
    }
}

/// Per-model error metrics, keyed by model name.
///
/// The server writes one MAE value per model, or an `error` string when the
/// metrics file could not be read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(pub BTreeMap<String, Value>);

impl Metrics {
    /// Mean absolute error reported for `model`.
    #[must_use]
    pub fn mae(&self, model: &str) -> Option<f64> {
        self.0.get(model).and_then(Value::as_f64)
    }

    /// The error message the server returned instead of metrics.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.0.get("error").and_then(Value::as_str)
    }

    /// Iterate over every numeric metric.
    pub fn models(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name.as_str(), v)))
    }

    /// The ML baseline with the lowest MAE, leaving out PINN and FEM.
    #[must_use]
    pub fn best_ml(&self) -> Option<(&str, f64)> {
        self.models()
            .filter(|(name, _)| *name != PINN_MODEL && *name != FEM_MODEL)
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// True when the server has no metrics yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Format an MAE the way the dashboard shows it (`1.23e-4`), or `N/A`.
#[must_use]
pub fn format_mae(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.2e}"))
}

/// Health/identity reported by the server root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceInfo {
    /// `online` when the server is up.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Training manager state, e.g. `IDLE` or `RUNNING`.
    pub training_status: String,
}

/// Generic `{status, message}` acknowledgement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMessage {
    /// `success`, `stopped`, `error`, ...
    pub status: String,
    /// Human readable detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusMessage {
    /// True for `success`-like statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status.as_str(), "success" | "stopped" | "ok")
    }
}

/// Reply to `POST /train`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingStarted {
    /// `started` or `error`.
    pub status: String,
    /// Process id of the training worker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    /// Directory name of the new run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Reason when the server refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TrainingStarted {
    /// True when the server launched a training process.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.status == "started"
    }
}

/// Reply to `POST /mesh/upload`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshUploaded {
    /// `success` on upload.
    pub status: String,
    /// Human readable detail.
    pub message: String,
    /// Stored file name.
    pub filename: String,
}

/// Entry of `GET /runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run directory name.
    pub id: String,
    /// ISO-8601 creation time.
    pub timestamp: String,
    /// Metrics of the run, empty when unavailable.
    #[serde(default)]
    pub metrics: Metrics,
}

/// Reply to `GET /runs/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetails {
    /// Run directory name.
    pub id: String,
    /// Final metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    /// Configuration the run was started with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    /// Model architecture summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_summary: Option<Value>,
}

/// Markdown document served by `GET /docs/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    /// Raw markdown.
    pub content: String,
}

/// Documents the server is willing to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocId {
    /// Project overview.
    Readme,
    /// Architecture notes.
    Architecture,
    /// Learnings and logs.
    Learnings,
    /// Legacy technical docs.
    OldDocs,
}

impl DocId {
    /// All documents in menu order.
    pub const ALL: [Self; 4] = [Self::Readme, Self::Architecture, Self::Learnings, Self::OldDocs];

    /// Path segment used by the server.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Readme => "readme",
            Self::Architecture => "architecture",
            Self::Learnings => "learnings",
            Self::OldDocs => "old_docs",
        }
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|doc| doc.as_str() == s)
            .ok_or_else(|| format!("unknown document: {s}"))
    }
}

/// Built-in mesh generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshKind {
    /// Electric machine stator cross-section.
    Stator,
    /// Plate with holes.
    Plate,
    /// L-shaped domain.
    Lshape,
}

impl fmt::Display for MeshKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stator => write!(f, "stator"),
            Self::Plate => write!(f, "plate"),
            Self::Lshape => write!(f, "lshape"),
        }
    }
}
