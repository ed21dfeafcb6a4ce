//! `etalab` - CLI for delivery orders and ETA prediction
//!
//! This binary places and tracks orders, predicts delivery times, syncs
//! training data with the ML service and drives the PINN benchmark server.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use chrono::Utc;
use clap::Parser;

use etalab::catalog::Catalog;
use etalab::checkout::{place_order, quick_estimate, OrderDraft};
use etalab::cli::{
    CatalogCommand, Cli, Command, ConfigCommand, DataCommand, DistanceCommand, OrderCommand,
    OutputFormat, PinnCommand, PredictCommand, StatsCommand, SyncCommand,
};
use etalab::config::Config;
use etalab::eta::{EtaClient, PredictionRequest, PredictionResponse};
use etalab::geo::{haversine_km, GeoPoint};
use etalab::orders::{ExportData, Order, OrderRepository, OrderStatus};
use etalab::stats::local_stats;
use etalab::storage::Storage;
use etalab::sync::{deliver_simulated, generate_sample_data, sample_orders, SyncClient};
use etalab::{init_logging, Error};
use etalab_pinn::model::{FEM_MODEL, PINN_MODEL};
use etalab_pinn::{format_mae, BenchmarkConfig, DashboardClient, LogConsole, TrainingSession};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Execute the command
    match cli.command {
        Command::Order(cmd) => handle_order(&config, cmd).await,
        Command::Predict(cmd) => handle_predict(&config, &cmd).await,
        Command::Distance(cmd) => {
            handle_distance(&cmd);
            Ok(())
        }
        Command::Catalog(cmd) => handle_catalog(cmd),
        Command::Stats(cmd) => handle_stats(&config, &cmd),
        Command::Data(cmd) => handle_data(&config, cmd),
        Command::Sync(cmd) => handle_sync(&config, cmd).await,
        Command::Pinn(cmd) => handle_pinn(&config, cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_repository(config: &Config) -> etalab::Result<OrderRepository> {
    Ok(OrderRepository::new(Storage::open(config.database_path())?))
}

fn eta_client(config: &Config, offline: bool) -> etalab::Result<EtaClient> {
    let mut prediction = config.prediction.clone();
    prediction.offline |= offline;
    EtaClient::from_config(&prediction)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<w$}", w = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    println!("{}", line(headers.to_vec()));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in rows {
        println!("{}", line(row.iter().map(String::as_str).collect()));
    }
}

fn print_rows(format: OutputFormat, headers: &[&str], rows: &[Vec<String>]) {
    match format {
        OutputFormat::Table => print_table(headers, rows),
        OutputFormat::Plain | OutputFormat::Json => {
            for row in rows {
                println!("{}", row.join("\t"));
            }
        }
    }
}

fn minutes(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |m| format!("{m} min"))
}

fn print_prediction(prediction: &PredictionResponse) {
    println!("ETA:           {} min", prediction.eta_minutes);
    println!("Confidence:    {}%", prediction.confidence);
    println!("Model:         {}", prediction.model_used);
    if prediction.risk_factors.is_empty() {
        println!("Risk factors:  none");
    } else {
        println!("Risk factors:");
        for risk in &prediction.risk_factors {
            println!("  - {risk}");
        }
    }
}

// === Orders ===

async fn handle_order(config: &Config, cmd: OrderCommand) -> CliResult {
    let repo = open_repository(config)?;

    match cmd {
        OrderCommand::Create {
            customer,
            restaurant,
            products,
            weather,
            traffic,
            offline,
            json,
        } => {
            let catalog = Catalog::builtin()?;
            let client = eta_client(config, offline)?;
            let draft = OrderDraft {
                customer_id: customer,
                restaurant_id: restaurant,
                product_ids: products,
                weather: weather.map(Into::into),
                traffic: traffic.map(Into::into),
            };

            let now = Utc::now();
            let placed = place_order(&catalog, &repo, &client, &draft, now).await?;
            if json {
                print_json(&placed)?;
            } else {
                println!("Order {} placed", placed.order.id);
                println!("Quick estimate: {} min", quick_estimate(&catalog, &draft, now)?);
                println!("Total:         {:.2}", placed.order.total_amount);
                if let Some(distance) = placed.order.distance_km {
                    println!("Distance:      {distance:.2} km");
                }
                print_prediction(&placed.prediction);
            }
        }
        OrderCommand::List {
            restaurant,
            customer,
            status,
            format,
        } => {
            let status = status.map(OrderStatus::from);
            let orders: Vec<Order> = repo
                .orders()?
                .into_iter()
                .filter(|o| restaurant.as_deref().map_or(true, |r| o.restaurant_id == r))
                .filter(|o| customer.as_deref().map_or(true, |c| o.customer_id == c))
                .filter(|o| status.map_or(true, |s| o.status == s))
                .collect();

            if format == OutputFormat::Json {
                return print_json(&orders);
            }
            if orders.is_empty() {
                println!("No orders.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = orders
                .iter()
                .map(|o| {
                    vec![
                        o.id.clone(),
                        o.restaurant_id.clone(),
                        o.customer_id.clone(),
                        o.status.to_string(),
                        minutes(o.predicted_eta_min),
                        minutes(o.actual_delivery_min),
                        format!("{:.2}", o.total_amount),
                        o.created_at.format("%Y-%m-%d %H:%M").to_string(),
                    ]
                })
                .collect();
            print_rows(
                format,
                &["ID", "RESTAURANT", "CUSTOMER", "STATUS", "PREDICTED", "ACTUAL", "TOTAL", "CREATED"],
                &rows,
            );
        }
        OrderCommand::Show { id, json } => {
            let order = repo
                .order_by_id(&id)?
                .ok_or_else(|| Error::OrderNotFound(id.clone()))?;
            if json {
                return print_json(&order);
            }

            let catalog = Catalog::builtin()?;
            let name_of = |id: &str, name: Option<&str>| {
                name.map_or_else(|| id.to_string(), |n| format!("{n} ({id})"))
            };
            println!("Order {}", order.id);
            println!("-----------------------------");
            println!("Status:        {}", order.status);
            println!(
                "Restaurant:    {}",
                name_of(
                    &order.restaurant_id,
                    catalog.restaurant(&order.restaurant_id).map(|r| r.name.as_str())
                )
            );
            println!(
                "Customer:      {}",
                name_of(
                    &order.customer_id,
                    catalog.customer(&order.customer_id).map(|c| c.name.as_str())
                )
            );
            println!("Created:       {}", order.created_at.to_rfc3339());
            if let Some(delivered_at) = order.delivered_at {
                println!("Delivered:     {}", delivered_at.to_rfc3339());
            }
            println!("Predicted:     {}", minutes(order.predicted_eta_min));
            println!("Actual:        {}", minutes(order.actual_delivery_min));
            if let Some(late) = order.is_late() {
                println!("Late:          {}", if late { "yes" } else { "no" });
            }
            if let Some(distance) = order.distance_km {
                println!("Distance:      {distance:.2} km");
            }
            println!("Items:");
            for item in &order.items {
                let name = catalog
                    .product(&item.product_id)
                    .map_or(item.product_id.as_str(), |p| p.name.as_str());
                println!(
                    "  {} x {name} @ {:.2} = {:.2}",
                    item.quantity,
                    item.unit_price,
                    item.subtotal()
                );
            }
            println!("Total:         {:.2}", order.total_amount);
        }
        OrderCommand::Advance { id, simulate } => {
            let current = repo
                .order_by_id(&id)?
                .ok_or_else(|| Error::OrderNotFound(id.clone()))?;
            let order = if simulate && current.status.next() == Some(OrderStatus::Delivered) {
                deliver_simulated(&repo, &id, &mut rand::thread_rng(), Utc::now())?
            } else {
                repo.advance_order(&id)?
            };
            println!("Order {} is now {}", order.id, order.status);
            if order.status == OrderStatus::Delivered {
                println!("Delivered in {}", minutes(order.actual_delivery_min));
            }
        }
        OrderCommand::SetStatus { id, status } => {
            let order = repo
                .update_order_status(&id, status.into())?
                .ok_or_else(|| Error::OrderNotFound(id.clone()))?;
            println!("Order {} is now {}", order.id, order.status);
        }
    }
    Ok(())
}

// === Prediction ===

async fn handle_predict(config: &Config, cmd: &PredictCommand) -> CliResult {
    let now = Utc::now();
    let mut request = PredictionRequest::at(now, cmd.distance, cmd.prep, cmd.weather.into());
    if let Some(hour) = cmd.hour {
        request.hour_of_day = hour;
        request.traffic_level = etalab::eta::traffic_for_hour(hour);
    }
    if let Some(day) = cmd.day {
        request.day_of_week = day;
    }
    if let Some(traffic) = cmd.traffic {
        request.traffic_level = traffic.into();
    }

    let client = eta_client(config, cmd.offline)?;
    let prediction = client.predict_at(&request, now).await;

    if cmd.json {
        print_json(&prediction)
    } else {
        print_prediction(&prediction);
        Ok(())
    }
}

fn handle_distance(cmd: &DistanceCommand) {
    let km = haversine_km(
        GeoPoint::new(cmd.lat1, cmd.lon1),
        GeoPoint::new(cmd.lat2, cmd.lon2),
    );
    println!("{km:.2} km");
}

// === Catalog ===

fn handle_catalog(cmd: CatalogCommand) -> CliResult {
    let catalog = Catalog::builtin()?;

    match cmd {
        CatalogCommand::Restaurants { format } => {
            if format == OutputFormat::Json {
                return print_json(&catalog.restaurants);
            }
            let rows: Vec<Vec<String>> = catalog
                .restaurants
                .iter()
                .map(|r| {
                    vec![
                        r.id.clone(),
                        r.name.clone(),
                        format!("{:.4}", r.lat),
                        format!("{:.4}", r.lon),
                        format!("{} min", r.avg_prep_time_min),
                    ]
                })
                .collect();
            print_rows(format, &["ID", "NAME", "LAT", "LON", "PREP"], &rows);
        }
        CatalogCommand::Products { restaurant, format } => {
            if let Some(id) = &restaurant {
                catalog.require_restaurant(id)?;
            }
            let products: Vec<_> = catalog
                .products
                .iter()
                .filter(|p| restaurant.as_deref().map_or(true, |r| p.restaurant_id == r))
                .collect();
            if format == OutputFormat::Json {
                return print_json(&products);
            }
            let rows: Vec<Vec<String>> = products
                .iter()
                .map(|p| {
                    vec![
                        p.id.clone(),
                        p.restaurant_id.clone(),
                        p.name.clone(),
                        format!("{:.2}", p.price),
                        format!("+{} min", p.additional_prep_min),
                    ]
                })
                .collect();
            print_rows(format, &["ID", "RESTAURANT", "NAME", "PRICE", "PREP"], &rows);
        }
        CatalogCommand::Customers { format } => {
            if format == OutputFormat::Json {
                return print_json(&catalog.customers);
            }
            let rows: Vec<Vec<String>> = catalog
                .customers
                .iter()
                .map(|c| {
                    vec![
                        c.id.clone(),
                        c.name.clone(),
                        format!("{:.4}", c.lat),
                        format!("{:.4}", c.lon),
                        c.whatsapp_phone.clone(),
                    ]
                })
                .collect();
            print_rows(format, &["ID", "NAME", "LAT", "LON", "PHONE"], &rows);
        }
    }
    Ok(())
}

// === Stats ===

fn handle_stats(config: &Config, cmd: &StatsCommand) -> CliResult {
    if let Some(id) = &cmd.restaurant {
        Catalog::builtin()?.require_restaurant(id)?;
    }

    let repo = open_repository(config)?;
    let stats = local_stats(
        &repo.orders()?,
        &repo.ml_training_logs()?,
        cmd.restaurant.as_deref(),
        config.sync.min_training_logs,
    );

    if cmd.json {
        return print_json(&stats);
    }

    match &cmd.restaurant {
        Some(id) => println!("Delivery statistics for {id}"),
        None => println!("Delivery statistics"),
    }
    println!("-------------------");
    println!("Orders:             {}", stats.total_orders);
    println!("  Preparing:        {}", stats.preparing_orders);
    println!("  In route:         {}", stats.in_route_orders);
    println!("  Delivered:        {}", stats.delivered_orders);
    println!("  Cancelled:        {}", stats.cancelled_orders);
    println!();
    println!("Training logs:      {}", stats.ml_logs);
    println!(
        "Accurate (±5 min):  {} ({}%)",
        stats.accurate_predictions, stats.accuracy_rate
    );
    println!(
        "Late deliveries:    {} (on time {}%)",
        stats.late_deliveries, stats.on_time_rate
    );
    println!("Avg delivery time:  {} min", stats.avg_delivery_time);
    println!(
        "Ready for training: {}",
        if stats.ready_for_training { "yes" } else { "no" }
    );
    Ok(())
}

// === Local data ===

fn handle_data(config: &Config, cmd: DataCommand) -> CliResult {
    let repo = open_repository(config)?;

    match cmd {
        DataCommand::Export { output } => {
            let json = serde_json::to_string_pretty(&repo.export()?)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{json}"),
            }
        }
        DataCommand::Import { file } => {
            let data = read_json::<ExportData>(&file)?;
            repo.import(&data)?;
            println!(
                "Imported {} orders and {} training logs",
                data.orders.len(),
                data.ml_logs.len()
            );
        }
        DataCommand::Clear { yes } => {
            if yes {
                repo.clear_all()?;
                println!("All orders and training logs deleted.");
            } else {
                println!("This will delete all orders and training logs.");
                println!("Use --yes to confirm.");
            }
        }
        DataCommand::Sample => {
            let delivered = generate_sample_data(&repo, &mut rand::thread_rng(), Utc::now())?;
            if delivered == 0 {
                println!("No preparing orders to deliver. Place some orders first.");
            } else {
                println!("Delivered {delivered} orders with simulated times.");
            }
        }
        DataCommand::Seed => {
            let catalog = Catalog::builtin()?;
            let now = Utc::now();
            let orders = sample_orders(&catalog, &mut rand::thread_rng(), now);
            let mut logs = 0;
            for order in &orders {
                repo.save_order(order)?;
                if order.status == OrderStatus::Delivered
                    && repo.record_training_log_at(order, now)?.is_some()
                {
                    logs += 1;
                }
            }
            println!("Added {} sample orders ({logs} training logs).", orders.len());
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> etalab::Result<T> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

// === Training sync ===

async fn handle_sync(config: &Config, cmd: SyncCommand) -> CliResult {
    let client = SyncClient::from_config(config)?;

    match cmd {
        SyncCommand::Health => {
            let online = client.check_health().await;
            println!(
                "Training service ({}): {}",
                config.sync.base_url,
                if online { "online" } else { "offline" }
            );

            let eta = eta_client(config, false)?;
            if !eta.check_health().await {
                println!("Prediction service ({}): offline", config.prediction.base_url);
                return Ok(());
            }
            let health = eta.health().await?;
            println!(
                "Prediction service ({}): {} (model loaded: {})",
                config.prediction.base_url, health.status, health.model_loaded
            );
            match eta.model_metrics().await {
                Ok(metrics) => {
                    println!("  Model:          {}", metrics.model_name);
                    println!("  Accuracy:       {:.1}%", metrics.accuracy);
                    println!("  MAE:            {:.2} min", metrics.mae);
                    println!("  RMSE:           {:.2} min", metrics.rmse);
                    println!("  R²:             {:.3}", metrics.r2_score);
                    println!("  Late:           {:.1}%", metrics.late_percentage);
                    println!("  Predictions:    {}", metrics.total_predictions);
                }
                Err(e) => println!("  Metrics unavailable: {e}"),
            }
        }
        SyncCommand::Status { json } => {
            let status = client.training_status().await?;
            if json {
                return print_json(&status);
            }
            println!("Training data on server");
            println!("-----------------------");
            println!("Upload batches:     {}", status.data_files_count);
            println!("Orders:             {}", status.total_orders);
            println!("Training logs:      {}", status.total_logs);
            println!("Ready for training: {}", status.ready_for_training);
            println!("Retrained model:    {}", status.retrained_model_exists);
        }
        SyncCommand::Upload { restaurant } => {
            let repo = open_repository(config)?;
            let response = client
                .upload_training_data(&repo, restaurant.as_deref())
                .await?;
            println!("{}", response.message);
        }
        SyncCommand::Retrain => {
            let response = client.trigger_retrain().await?;
            println!("{}", response.message);
            if let Some(accuracy) = response.new_accuracy {
                println!("New accuracy: {accuracy:.1}%");
            }
        }
        SyncCommand::Auto => {
            let repo = open_repository(config)?;
            let report = client.auto_sync(&repo).await?;
            println!("Upload:  {}", report.upload.message);
            match report.retrain {
                Some(retrain) => println!("Retrain: {}", retrain.message),
                None => println!("Retrain: skipped"),
            }
        }
    }
    Ok(())
}

// === PINN dashboard ===

async fn handle_pinn(config: &Config, cmd: PinnCommand) -> CliResult {
    let client = DashboardClient::with_timeout(&config.dashboard.base_url, config.dashboard_timeout())?;

    match cmd {
        PinnCommand::Info => {
            let info = client.service_info().await?;
            println!("Service:   {}", info.service);
            println!("Status:    {}", info.status);
            println!("Training:  {}", info.training_status);
        }
        PinnCommand::Config => print_json(&client.config().await?)?,
        PinnCommand::SaveConfig { file } => {
            let benchmark = read_json::<BenchmarkConfig>(&file)?;
            let reply = client.save_config(&benchmark).await?;
            println!("{}", reply.message.unwrap_or(reply.status));
        }
        PinnCommand::Metrics => {
            let metrics = client.metrics().await?;
            if let Some(error) = metrics.error() {
                println!("Metrics unavailable: {error}");
            } else if metrics.is_empty() {
                println!("No metrics yet.");
            } else {
                for (model, mae) in metrics.models() {
                    println!("{model:<8} MAE {}", format_mae(Some(mae)));
                }
                match metrics.best_ml() {
                    Some((model, mae)) => {
                        println!("Best ML: {model} ({})", format_mae(Some(mae)));
                    }
                    None => println!("Best ML: N/A"),
                }
            }
        }
        PinnCommand::Meshes => {
            for mesh in client.meshes().await? {
                println!("{mesh}");
            }
        }
        PinnCommand::GenerateMesh { kind } => {
            let reply = client.generate_mesh(kind.into()).await?;
            println!("{}", reply.message.unwrap_or(reply.status));
        }
        PinnCommand::UploadMesh { file, use_mesh } => {
            let uploaded = client.upload_mesh(&file).await?;
            println!("{}", uploaded.message);
            if use_mesh {
                let mut benchmark = client.config().await?;
                benchmark.use_uploaded_mesh(&uploaded.filename);
                client.save_config(&benchmark).await?;
                println!("Configuration now uses {}", benchmark.mesh_file);
            }
        }
        PinnCommand::Runs => {
            let runs = client.runs().await?;
            if runs.is_empty() {
                println!("No runs.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = runs
                .iter()
                .map(|run| {
                    vec![
                        run.id.clone(),
                        run.timestamp.clone(),
                        format_mae(run.metrics.mae(PINN_MODEL)),
                        format_mae(run.metrics.mae(FEM_MODEL)),
                    ]
                })
                .collect();
            print_table(&["RUN", "TIMESTAMP", "PINN MAE", "FEM MAE"], &rows);
        }
        PinnCommand::Run { id } => print_json(&client.run(&id).await?)?,
        PinnCommand::DeleteRun { id, yes } => {
            if yes {
                let reply = client.delete_run(&id).await?;
                println!("{}", reply.message.unwrap_or(reply.status));
            } else {
                println!("This will delete run {id} and all its files.");
                println!("Use --yes to confirm.");
            }
        }
        PinnCommand::Train {
            config: benchmark_file,
            follow,
        } => {
            let benchmark = benchmark_file
                .as_deref()
                .map(read_json::<BenchmarkConfig>)
                .transpose()?;
            let mut session = TrainingSession::start(&client, benchmark.as_ref()).await?;
            println!(
                "Training started (run {}, pid {})",
                session.run_id().unwrap_or("?"),
                session.pid().map_or_else(|| "?".to_string(), |p| p.to_string())
            );
            if follow {
                session.follow(&client, |line| println!("{line}")).await?;
            }
        }
        PinnCommand::Stop => {
            let reply = client.stop_training().await?;
            println!("{}", reply.message.unwrap_or(reply.status));
        }
        PinnCommand::Docs { doc } => {
            println!("{}", client.documentation(doc.into()).await?.content);
        }
        PinnCommand::Logs => {
            let mut stream = client.stream_logs().await?;
            let mut console = LogConsole::new();
            while let Some(event) = stream.next_event().await {
                let open = console.record(&event);
                if let Some(line) = console.lines().last() {
                    println!("{line}");
                }
                if !open {
                    break;
                }
            }
        }
    }
    Ok(())
}

// === Configuration ===

fn handle_config(config: &Config, cmd: ConfigCommand) -> CliResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                print_json(config)?;
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Prediction]");
                println!("  Base URL:           {}", config.prediction.base_url);
                println!("  Health timeout:     {} ms", config.prediction.health_timeout_ms);
                println!("  Request timeout:    {} ms", config.prediction.request_timeout_ms);
                println!("  Offline:            {}", config.prediction.offline);
                println!();
                println!("[Sync]");
                println!("  Base URL:           {}", config.sync.base_url);
                println!("  Retrain delay:      {} ms", config.sync.retrain_delay_ms);
                println!("  Min training logs:  {}", config.sync.min_training_logs);
                println!();
                println!("[Dashboard]");
                println!("  Base URL:           {}", config.dashboard.base_url);
                println!("  Request timeout:    {} ms", config.dashboard.request_timeout_ms);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
