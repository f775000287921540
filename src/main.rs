use std::path::PathBuf;

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use sunrise_light::config::LightKind;
use sunrise_light::*;
use tracing::{debug, info, instrument};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored alarms
    List,
    /// Add a new alarm
    Add {
        /// Hour of full brightness (0-23)
        #[arg(long, default_value_t = 7)]
        hour: u32,
        /// Minute of full brightness (0-59)
        #[arg(short, long, default_value_t = 0)]
        minute: u32,
        /// Days (mon,tue,wed,thu,fri,sat,sun,all,weekdays,weekend)
        #[arg(short, long, default_value = "weekdays")]
        days: DayFlags,
        /// Store the alarm switched off
        #[arg(long)]
        disabled: bool,
    },
    /// Remove an alarm
    Remove {
        /// Alarm id as shown by `list`
        id: AlarmId,
    },
    /// Switch an alarm on
    Enable { id: AlarmId },
    /// Switch an alarm off
    Disable { id: AlarmId },
    /// Change the time of full brightness
    SetTime {
        id: AlarmId,
        /// Hour (0-23)
        #[arg(long)]
        hour: u32,
        /// Minute (0-59)
        #[arg(short, long)]
        minute: u32,
    },
    /// Add or remove target days
    SetDays {
        id: AlarmId,
        /// Days to add
        #[arg(short, long)]
        add: Option<DayFlags>,
        /// Days to remove
        #[arg(short, long)]
        remove: Option<DayFlags>,
    },
    /// Show the combined schedule and brightness
    Status {
        /// Evaluate at this local time ("YYYY-MM-DD HH:MM") instead of now
        #[arg(long, value_parser = parse_moment)]
        at: Option<NaiveDateTime>,
    },
    /// Drive the light until interrupted
    Run {
        /// Use a Bluetooth LED strip regardless of the configured light
        #[arg(long)]
        ble: bool,
        /// MAC address or id of the strip
        #[arg(short, long)]
        address: Option<String>,
    },
}

#[tokio::main]
#[instrument]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("sunrise_light=info,sunrise=info")),
        )
        .compact()
        .init();

    color_eyre::install()?;

    let cli = Cli::parse();
    debug!("Parsed command line arguments");

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let mut store = JsonFileStore::new(&config.store.path);

    match cli.command.unwrap_or(Commands::Status { at: None }) {
        Commands::List => list(&store)?,
        Commands::Add {
            hour,
            minute,
            days,
            disabled,
        } => {
            let mut alarm = Alarm::at(days, hour, minute)?;
            alarm.set_active(!disabled);
            let id = store.upsert(alarm)?;
            println!("{id}");
        }
        Commands::Remove { id } => {
            store.remove(id)?;
            info!("Removed alarm {}", id);
        }
        Commands::Enable { id } => update(&mut store, id, |alarm| {
            alarm.set_active(true);
            Ok(())
        })?,
        Commands::Disable { id } => update(&mut store, id, |alarm| {
            alarm.set_active(false);
            Ok(())
        })?,
        Commands::SetTime { id, hour, minute } => {
            update(&mut store, id, |alarm| alarm.set_time(hour, minute))?
        }
        Commands::SetDays { id, add, remove } => {
            if add.is_none() && remove.is_none() {
                return Err(eyre!("Nothing to change, pass --add and/or --remove"));
            }
            update(&mut store, id, |alarm| {
                if let Some(days) = add {
                    alarm.add_target_day(days);
                }
                if let Some(days) = remove {
                    alarm.remove_target_day(days);
                }
                Ok(())
            })?
        }
        Commands::Status { at } => {
            let now = at.unwrap_or_else(|| SystemClock.now());
            status(&store, &config.ramp()?, now)?;
        }
        Commands::Run { ble, address } => {
            let address = address.or_else(|| config.light.address.clone());
            let ramp = config.ramp()?;
            let period = config.tick_interval();
            if ble || config.light.kind == LightKind::Ble {
                let sink = BleSink::connect(address.as_deref()).await?;
                Driver::new(SystemClock, store, sink, ramp)
                    .run(period, shutdown_signal())
                    .await?;
            } else {
                Driver::new(SystemClock, store, LogSink::new(), ramp)
                    .run(period, shutdown_signal())
                    .await?;
            }
        }
    }

    Ok(())
}

/// Load one alarm, change it and store the whole record again
fn update<F>(store: &mut JsonFileStore, id: AlarmId, change: F) -> Result<()>
where
    F: FnOnce(&mut Alarm) -> sunrise_light::Result<()>,
{
    let mut alarm = store.get(id)?;
    change(&mut alarm)?;
    store.upsert(alarm.clone())?;
    info!("Updated alarm {}: {}", id, alarm);
    Ok(())
}

fn list(store: &JsonFileStore) -> Result<()> {
    let alarms = store.load_all()?;
    if alarms.is_empty() {
        println!("No alarms configured");
        return Ok(());
    }

    let now = SystemClock.now();
    for alarm in alarms {
        let id = alarm
            .id()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "-".into());
        let next = match alarm.target_datetime(now) {
            Ok(moment) => moment.format("%a %Y-%m-%d %H:%M").to_string(),
            Err(_) => "never".into(),
        };
        println!("{id}  {alarm}  next: {next}");
    }
    Ok(())
}

fn status(store: &JsonFileStore, ramp: &RampConfig, now: NaiveDateTime) -> Result<()> {
    let alarms: AlarmSet = store.load_all()?.into_iter().collect();

    println!("Time:        {}", now.format("%a %Y-%m-%d %H:%M:%S"));
    println!("Alarms:      {}", alarms.len());
    println!("Active days: {}", alarms.active_days());
    match alarms.nearest(now) {
        Ok(nearest) => {
            println!("Nearest:     {}", nearest);
            match nearest.target_datetime(now) {
                Ok(moment) => println!("Next target: {}", moment.format("%a %Y-%m-%d %H:%M")),
                Err(e) => println!("Next target: none ({e})"),
            }
        }
        Err(e) => println!("Nearest:     none ({e})"),
    }
    match alarms.desired_brightness(now, ramp) {
        Ok(level) => println!("Brightness:  {}%", level),
        Err(e) => println!("Brightness:  unavailable ({e})"),
    }
    Ok(())
}

fn parse_moment(value: &str) -> std::result::Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map_err(|e| format!("expected \"YYYY-MM-DD HH:MM\": {e}"))
}

/// Resolves on ctrl-c
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
