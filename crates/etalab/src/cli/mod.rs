//! Command-line interface for etalab.
//!
//! This module provides the CLI structure and command handlers for the
//! `etalab` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    CatalogCommand, ConfigCommand, DataCommand, DistanceCommand, DocArg, MeshKindArg,
    OrderCommand, OutputFormat, PinnCommand, PredictCommand, StatsCommand, StatusArg,
    SyncCommand, TrafficArg, WeatherArg,
};

/// etalab - Delivery orders with ETA prediction
///
/// Places and tracks delivery orders, predicts delivery times through the
/// ML service (or a local formula when it is offline), and feeds completed
/// deliveries back for retraining.
#[derive(Debug, Parser)]
#[command(name = "etalab")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Place and track orders
    #[command(subcommand)]
    Order(OrderCommand),

    /// Predict a delivery time from raw features
    Predict(PredictCommand),

    /// Great-circle distance between two points in km
    Distance(DistanceCommand),

    /// Browse restaurants, products and customers
    #[command(subcommand)]
    Catalog(CatalogCommand),

    /// Show delivery and prediction statistics
    Stats(StatsCommand),

    /// Export, import or reset local data
    #[command(subcommand)]
    Data(DataCommand),

    /// Upload training data and retrain the model
    #[command(subcommand)]
    Sync(SyncCommand),

    /// Drive the PINN benchmark server
    #[command(subcommand)]
    Pinn(PinnCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn stats_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Stats(StatsCommand {
                restaurant: None,
                json: false,
            }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "etalab");
    }

    #[test]
    fn test_verbosity_levels() {
        use crate::logging::Verbosity;

        assert_eq!(stats_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(stats_cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(stats_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(stats_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(stats_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_order_create() {
        let args = [
            "etalab", "order", "create", "--customer", "cust_1", "-r", "rest_1", "-p", "prod_1",
            "prod_2", "--weather", "rainy", "--offline",
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Command::Order(OrderCommand::Create {
                customer,
                restaurant,
                products,
                weather,
                traffic,
                offline,
                json,
            }) => {
                assert_eq!(customer, "cust_1");
                assert_eq!(restaurant, "rest_1");
                assert_eq!(products, ["prod_1", "prod_2"]);
                assert_eq!(weather, Some(WeatherArg::Rainy));
                assert_eq!(traffic, None);
                assert!(offline);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_order_create_requires_products() {
        let args = ["etalab", "order", "create", "--customer", "cust_1", "-r", "rest_1"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_set_status() {
        let args = ["etalab", "order", "set-status", "order_1", "in-route"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Order(OrderCommand::SetStatus {
                status: StatusArg::InRoute,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_predict_defaults() {
        let args = ["etalab", "predict", "--distance", "2.5"];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Predict(cmd) = cli.command else {
            panic!("expected predict");
        };
        assert!((cmd.distance - 2.5).abs() < f64::EPSILON);
        assert_eq!(cmd.prep, 15);
        assert_eq!(cmd.weather, WeatherArg::Sunny);
        assert_eq!(cmd.hour, None);
    }

    #[test]
    fn test_parse_predict_rejects_bad_hour() {
        let args = ["etalab", "predict", "--distance", "1", "--hour", "24"];
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn test_parse_distance_negative_coordinates() {
        let args = ["etalab", "distance", "-23.55", "-46.63", "-23.56", "-46.65"];
        let cli = Cli::try_parse_from(args).unwrap();
        let Command::Distance(cmd) = cli.command else {
            panic!("expected distance");
        };
        assert!((cmd.lat1 + 23.55).abs() < f64::EPSILON);
        assert!((cmd.lon2 + 46.65).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_pinn_train_follow() {
        let args = ["etalab", "pinn", "train", "--follow"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Pinn(PinnCommand::Train {
                config: None,
                follow: true
            })
        ));
    }

    #[test]
    fn test_parse_pinn_docs_default() {
        let args = ["etalab", "pinn", "docs"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(matches!(
            cli.command,
            Command::Pinn(PinnCommand::Docs {
                doc: DocArg::Readme
            })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let args = ["etalab", "-c", "/custom/config.toml", "stats"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let args = ["etalab", "sync", "health", "-vv"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Sync(SyncCommand::Health)));
    }

    #[test]
    fn test_parse_with_quiet() {
        let args = ["etalab", "-q", "data", "sample"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::Data(DataCommand::Sample)));
    }
}
