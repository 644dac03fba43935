//! Mobile Alerts bridge command line.
//!
//! Usage:
//!   mobile-alerts-bridge models
//!   mobile-alerts-bridge detect --file measurement.json
//!   mobile-alerts-bridge discover --phone-id <id>
//!   mobile-alerts-bridge poll --devices <id>,<id>

use clap::{Parser, Subcommand};
use log::{error, info};
use mobile_alerts_bridge::config::{Config, load_dotenv, parse_device_list};
use mobile_alerts_bridge::coordinator::{Coordinator, DeviceReport, evaluate};
use mobile_alerts_bridge::device::DeviceBinding;
use mobile_alerts_bridge::error::Result;
use mobile_alerts_bridge::inference::{ModelCatalog, ModelMatcher, classify};
use mobile_alerts_bridge::input::mobile_alerts::{MobileAlertsClient, parse_records};
use mobile_alerts_bridge::sensors::{SensorReading, SensorValue};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mobile-alerts-bridge")]
#[command(about = "Detect Mobile Alerts device models and read their sensors")]
struct Cli {
    /// Phone id of the Mobile Alerts app account
    #[arg(long, env = "MOBILE_ALERTS_PHONE_ID", global = true)]
    phone_id: Option<String>,

    /// Override the lastmeasurement endpoint
    #[arg(long, env = "MOBILE_ALERTS_API_URL", global = true)]
    api_url: Option<String>,

    /// Comma separated device ids
    #[arg(long, env = "MOBILE_ALERTS_DEVICES", global = true, value_delimiter = ',')]
    devices: Vec<String>,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in model catalog
    Models,
    /// Detect the model of a measurement read from a file or stdin
    Detect {
        /// JSON file; reads stdin when omitted
        #[arg(long)]
        file: Option<PathBuf>,

        /// Device id for a bare measurement object
        #[arg(long, default_value = "unknown")]
        device_id: String,

        /// Model to use when several fit
        #[arg(long)]
        model: Option<String>,

        /// Bind to a single measurement key instead of detecting a model
        #[arg(long, conflicts_with = "model")]
        key: Option<String>,
    },
    /// List every device of the account with its detected model
    Discover,
    /// Fetch the configured devices once and print their readings
    Poll,
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

fn main() {
    // Environment must be complete before any thread is started.
    load_dotenv();
    init_logger();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(cli)) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env();
    if let Some(phone_id) = cli.phone_id {
        config.api.phone_id = phone_id.trim().to_string();
    }
    if let Some(url) = cli.api_url {
        config.api.url = url;
    }
    if !cli.devices.is_empty() {
        config.devices.ids = parse_device_list(&cli.devices.join(","));
    }

    let catalog = Arc::new(ModelCatalog::builtin());

    match cli.command {
        Commands::Models => {
            if cli.json {
                let models: Vec<_> = catalog.iter().collect();
                println!("{}", serde_json::to_string_pretty(&models)?);
            } else {
                for model in catalog.iter() {
                    let fields: Vec<&str> =
                        model.declared_fields.iter().map(String::as_str).collect();
                    println!(
                        "{:<20} {:<40} {{{}}}",
                        model.model_id,
                        model.display_name,
                        fields.join(", ")
                    );
                }
            }
        }
        Commands::Detect {
            file,
            device_id,
            model,
            key,
        } => {
            let content = match file {
                Some(path) => std::fs::read_to_string(path)?,
                None => {
                    let mut buffer = String::new();
                    std::io::stdin().read_to_string(&mut buffer)?;
                    buffer
                }
            };
            let records = parse_records(serde_json::from_str(&content)?, &device_id)?;
            let binding = match key {
                Some(key) => DeviceBinding::MeasurementKey(key),
                None => DeviceBinding::Detect,
            };

            let mut reports = Vec::with_capacity(records.len());
            for record in &records {
                if !cli.json {
                    let signature = classify(&record.measurement);
                    let result = ModelMatcher::new(&catalog).find_matches(&signature);
                    println!("Device {}", record.device_id);
                    println!("  signature:  {}", signature);
                    println!("  candidates: {:?} ({:?})", result.model_ids(), result.kind());
                }
                reports.push(evaluate(&catalog, record, &binding, model.as_deref()));
            }
            print_reports(&reports, cli.json)?;
        }
        Commands::Discover => {
            let coordinator = Coordinator::from_config(
                MobileAlertsClient::new(&config.api)?,
                catalog,
                &config,
            )?;
            let reports = coordinator.discover().await?;
            print_reports(&reports, cli.json)?;
        }
        Commands::Poll => {
            info!(
                "Polling {} devices (scan interval {} min)",
                config.devices.ids.len(),
                config.polling.scan_interval_minutes
            );
            let coordinator = Coordinator::from_config(
                MobileAlertsClient::new(&config.api)?,
                catalog,
                &config,
            )?;
            let reports = coordinator.refresh().await?;
            print_reports(&reports, cli.json)?;
        }
    }

    Ok(())
}

fn print_reports(reports: &[DeviceReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }

    for report in reports {
        match report {
            DeviceReport::Missing { device_id } => {
                println!("{}: not in API response", device_id);
            }
            DeviceReport::Unsupported {
                device_id,
                signature,
            } => {
                println!(
                    "{}: unsupported device, measurement keys {{{}}}",
                    device_id,
                    signature.join(", ")
                );
            }
            DeviceReport::Ambiguous {
                device_id,
                candidates,
                ..
            } => {
                println!(
                    "{}: ambiguous, choose one of {} (--model or MOBILE_ALERTS_MODELS)",
                    device_id,
                    candidates.join(", ")
                );
            }
            DeviceReport::Resolved {
                device_id,
                model_id,
                basis,
                readings,
            } => {
                println!("{}: {} ({:?})", device_id, model_id, basis);
                print_readings(readings);
            }
            DeviceReport::Legacy {
                device_id,
                field,
                readings,
            } => {
                println!("{}: measurement key {}", device_id, field);
                print_readings(readings);
            }
        }
    }
    Ok(())
}

fn print_readings(readings: &[SensorReading]) {
    for reading in readings {
        let value = match &reading.value {
            SensorValue::Number(n) => n.to_string(),
            SensorValue::Flag(b) => b.to_string(),
            SensorValue::Text(s) => s.clone(),
            SensorValue::Timestamp(t) => t.to_rfc3339(),
            SensorValue::Battery(status) => status.to_string(),
            SensorValue::Raw(v) => v.to_string(),
            SensorValue::Unavailable => "unavailable".to_string(),
        };
        println!("    {:<12} {:<24} {}", reading.field, reading.category, value);
    }
}
