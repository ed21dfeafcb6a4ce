//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

/// Order management commands.
#[derive(Debug, Subcommand)]
pub enum OrderCommand {
    /// Place a new order and predict its delivery time
    Create {
        /// Ordering customer id (e.g. `cust_1`)
        #[arg(long)]
        customer: String,

        /// Restaurant id (e.g. `rest_1`)
        #[arg(short, long)]
        restaurant: String,

        /// Product ids, one per unit ordered
        #[arg(short, long = "product", required = true, num_args = 1..)]
        products: Vec<String>,

        /// Weather at order time
        #[arg(short, long, value_enum)]
        weather: Option<WeatherArg>,

        /// Traffic level (derived from the hour when omitted)
        #[arg(short, long, value_enum)]
        traffic: Option<TrafficArg>,

        /// Do not contact the prediction service
        #[arg(long)]
        offline: bool,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// List stored orders
    List {
        /// Only orders of this restaurant
        #[arg(short, long)]
        restaurant: Option<String>,

        /// Only orders of this customer
        #[arg(long)]
        customer: Option<String>,

        /// Only orders with this status
        #[arg(short, long, value_enum)]
        status: Option<StatusArg>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show one order
    Show {
        /// Order id
        id: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Move an order to its next status
    Advance {
        /// Order id
        id: String,

        /// When delivering, simulate the delivery time around the prediction
        #[arg(long)]
        simulate: bool,
    },

    /// Set the status of an order
    SetStatus {
        /// Order id
        id: String,

        /// Target status
        #[arg(value_enum)]
        status: StatusArg,
    },
}

/// Predict command arguments.
#[derive(Debug, Args)]
pub struct PredictCommand {
    /// Distance between restaurant and customer in km
    #[arg(short, long)]
    pub distance: f64,

    /// Preparation time in minutes
    #[arg(short, long, default_value = "15")]
    pub prep: u32,

    /// Hour of day, 0-23 (now when omitted)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
    pub hour: Option<u32>,

    /// Day of week, 0 = Sunday (today when omitted)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..7))]
    pub day: Option<u32>,

    /// Weather at order time
    #[arg(short, long, value_enum, default_value = "sunny")]
    pub weather: WeatherArg,

    /// Traffic level (derived from the hour when omitted)
    #[arg(short, long, value_enum)]
    pub traffic: Option<TrafficArg>,

    /// Use the local formula only
    #[arg(long)]
    pub offline: bool,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Distance command arguments.
#[derive(Debug, Args)]
pub struct DistanceCommand {
    /// Latitude of the first point
    #[arg(allow_negative_numbers = true)]
    pub lat1: f64,
    /// Longitude of the first point
    #[arg(allow_negative_numbers = true)]
    pub lon1: f64,
    /// Latitude of the second point
    #[arg(allow_negative_numbers = true)]
    pub lat2: f64,
    /// Longitude of the second point
    #[arg(allow_negative_numbers = true)]
    pub lon2: f64,
}

/// Catalog browsing commands.
#[derive(Debug, Subcommand)]
pub enum CatalogCommand {
    /// List restaurants
    Restaurants {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List products
    Products {
        /// Only products of this restaurant
        #[arg(short, long)]
        restaurant: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List customers
    Customers {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Stats command arguments.
#[derive(Debug, Args)]
pub struct StatsCommand {
    /// Only count this restaurant
    #[arg(short, long)]
    pub restaurant: Option<String>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Local data management commands.
#[derive(Debug, Subcommand)]
pub enum DataCommand {
    /// Export orders and training logs as JSON
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Replace local data with an export
    Import {
        /// Export file to read
        file: PathBuf,
    },

    /// Delete all orders and training logs
    Clear {
        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Deliver up to five preparing orders with simulated times
    Sample,

    /// Add ten random historical orders
    Seed,
}

/// Training data synchronisation commands.
#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Check whether the ML service is reachable
    Health,

    /// Show what the service holds for training
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Upload delivered orders and training logs
    Upload {
        /// Only upload this restaurant's data
        #[arg(short, long)]
        restaurant: Option<String>,
    },

    /// Ask the service to retrain its model
    Retrain,

    /// Upload, wait, then retrain
    Auto,
}

/// PINN benchmark dashboard commands.
#[derive(Debug, Subcommand)]
pub enum PinnCommand {
    /// Show server identity and training state
    Info,

    /// Print the benchmark configuration as JSON
    Config,

    /// Replace the benchmark configuration with a JSON file
    SaveConfig {
        /// Configuration file
        file: PathBuf,
    },

    /// Show the latest per-model metrics
    Metrics,

    /// List meshes known to the server
    Meshes,

    /// Generate a built-in mesh
    GenerateMesh {
        /// Mesh to generate
        #[arg(value_enum)]
        kind: MeshKindArg,
    },

    /// Upload a mesh file
    UploadMesh {
        /// Mesh file to upload
        file: PathBuf,

        /// Point the configuration at the uploaded mesh
        #[arg(long = "use")]
        use_mesh: bool,
    },

    /// List past training runs
    Runs,

    /// Show one training run
    Run {
        /// Run id
        id: String,
    },

    /// Delete a training run
    DeleteRun {
        /// Run id
        id: String,

        /// Skip confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Start training
    Train {
        /// Save this configuration before starting
        #[arg(long = "with-config", value_name = "FILE")]
        config: Option<PathBuf>,

        /// Stream training logs until the run ends
        #[arg(short, long)]
        follow: bool,
    },

    /// Stop the running training
    Stop,

    /// Print a documentation page
    Docs {
        /// Page to print
        #[arg(value_enum, default_value = "readme")]
        doc: DocArg,
    },

    /// Stream training logs
    Logs,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Order status argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    /// Being prepared
    Preparing,
    /// Out for delivery
    InRoute,
    /// Delivered
    Delivered,
    /// Cancelled
    Cancelled,
}

impl From<StatusArg> for crate::orders::OrderStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Preparing => Self::Preparing,
            StatusArg::InRoute => Self::InRoute,
            StatusArg::Delivered => Self::Delivered,
            StatusArg::Cancelled => Self::Cancelled,
        }
    }
}

/// Weather argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WeatherArg {
    /// Clear sky
    Sunny,
    /// Overcast
    Cloudy,
    /// Raining
    Rainy,
}

impl From<WeatherArg> for crate::eta::Weather {
    fn from(arg: WeatherArg) -> Self {
        match arg {
            WeatherArg::Sunny => Self::Sunny,
            WeatherArg::Cloudy => Self::Cloudy,
            WeatherArg::Rainy => Self::Rainy,
        }
    }
}

/// Traffic argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TrafficArg {
    /// Free-flowing
    Light,
    /// Some congestion
    Moderate,
    /// Heavy congestion
    Heavy,
}

impl From<TrafficArg> for crate::eta::TrafficLevel {
    fn from(arg: TrafficArg) -> Self {
        match arg {
            TrafficArg::Light => Self::Light,
            TrafficArg::Moderate => Self::Moderate,
            TrafficArg::Heavy => Self::Heavy,
        }
    }
}

/// Built-in mesh argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MeshKindArg {
    /// Stator cross-section
    Stator,
    /// Plate with holes
    Plate,
    /// L-shaped domain
    Lshape,
}

impl From<MeshKindArg> for etalab_pinn::MeshKind {
    fn from(arg: MeshKindArg) -> Self {
        match arg {
            MeshKindArg::Stator => Self::Stator,
            MeshKindArg::Plate => Self::Plate,
            MeshKindArg::Lshape => Self::Lshape,
        }
    }
}

/// Documentation page argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocArg {
    /// Project overview
    Readme,
    /// Architecture notes
    Architecture,
    /// Learnings and logs
    Learnings,
    /// Legacy technical docs
    OldDocs,
}

impl From<DocArg> for etalab_pinn::DocId {
    fn from(arg: DocArg) -> Self {
        match arg {
            DocArg::Readme => Self::Readme,
            DocArg::Architecture => Self::Architecture,
            DocArg::Learnings => Self::Learnings,
            DocArg::OldDocs => Self::OldDocs,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
