use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand};
use inquire::Text;
use lunchReminder::clients::notifier::{ConsoleNotifier, NotificationCenter};
use lunchReminder::config::HostConfig;
use lunchReminder::models::appointment::{Appointment, Guest, Location};
use lunchReminder::runtime;
use lunchReminder::service::appointment_service::AppointmentService;
use lunchReminder::service::notification_message_service::{format_lunch_time, join_guest_names};
use lunchReminder::store::appointments::JsonFileStore;
use lunchReminder::store::settings::{
    JsonSettingsStore, MONITOR_TIME_WINDOW_KEY, SettingsStore, TASK_ENABLED_KEY, TASK_STATUS_KEY,
};
use lunchReminder::tasks::deferral::ScheduledRun;
use lunchReminder::tasks::monitor_task::{MonitorSettings, MonitorTask};
use tracing::warn;

#[derive(Parser)]
#[command(name = "lunch-reminder", about = "Reminders for upcoming lunch appointments")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reminder pass now.
    Run,
    /// Run reminder passes on a timer until Ctrl-C.
    Watch {
        /// Minutes between passes.
        #[arg(long)]
        every: Option<u64>,
    },
    Add {
        title: String,
        lunch_time: DateTime<FixedOffset>,
        #[arg(long)]
        location_name: Option<String>,
        #[arg(long)]
        location_address: Option<String>,
        #[arg(long = "guest")]
        guests: Vec<String>,
    },
    AddPrompt {},
    List,
    /// Open the lunch a toast points at, e.g. `show "?id=..."`.
    Show {
        launch_args: String,
    },
    ClearOld,
    Guests,
    Status,
    SetWindow {
        minutes: i64,
    },
}

pub async fn cli(host: HostConfig) {
    // Fine to exit on bad arguments here
    let cli = Cli::parse();
    let store = Arc::new(JsonFileStore::new(host.appointments_path()));
    let settings = match JsonSettingsStore::open(host.settings_path()) {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            println!("Failed to open settings: {}", e);
            return;
        }
    };
    if let Err(e) = execute(cli.command, &host, store, settings).await {
        println!("Command failed: {}", e);
    }
}

async fn execute(
    command: Commands,
    host: &HostConfig,
    store: Arc<JsonFileStore>,
    settings: Arc<JsonSettingsStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Run => {
            let task = MonitorTask::new(store, settings.clone(), Arc::new(ConsoleNotifier))
                .with_display_tz(host.display_tz);
            task.run(&ScheduledRun { tick: 0 }, Utc::now()).await;
            print_status(settings.as_ref());
        }
        Commands::Watch { every } => {
            let minutes = every.unwrap_or(host.run_frequency_minutes).max(1);
            let notifier = NotificationCenter::forwarding(Box::new(ConsoleNotifier));
            let task = MonitorTask::new(store, settings.clone(), Arc::new(notifier))
                .with_display_tz(host.display_tz);
            settings.set_bool(TASK_ENABLED_KEY, true)?;
            runtime::run_watch(Arc::new(task), Duration::from_secs(minutes * 60)).await;
            settings.set_bool(TASK_ENABLED_KEY, false)?;
        }
        Commands::Add {
            title,
            lunch_time,
            location_name,
            location_address,
            guests,
        } => {
            let location = Location {
                name: location_name.unwrap_or_default(),
                address: location_address.unwrap_or_default(),
            };
            let guests = guests.iter().map(|name| Guest::new(name.trim())).collect();
            let created =
                AppointmentService::create(store.as_ref(), &title, lunch_time, location, guests)
                    .await?;
            println!("Saved lunch {} ({})", created.title, created.id);
        }
        Commands::AddPrompt {} => {
            let created = create_appointment_from_prompt(store.as_ref()).await?;
            println!("Saved lunch {} ({})", created.title, created.id);
        }
        Commands::List => {
            let appointments = AppointmentService::load_or_empty(store.as_ref()).await?;
            if appointments.is_empty() {
                println!("No lunches scheduled.");
            }
            for appointment in &appointments {
                println!("{}", describe(appointment, host));
            }
        }
        Commands::Show { launch_args } => {
            let appointments = AppointmentService::load_or_empty(store.as_ref()).await?;
            match AppointmentService::find_by_launch_args(&appointments, &launch_args) {
                Some(appointment) => {
                    println!("{}", describe(appointment, host));
                    if !appointment.location.address.is_empty() {
                        println!("  address: {}", appointment.location.address);
                    }
                    for guest in &appointment.guests {
                        println!("  guest: {}", guest.full_name);
                        for phone in &guest.phone_numbers {
                            println!("    {}: {}", phone.description, phone.number);
                        }
                        for email in &guest.email_addresses {
                            println!("    {}: {}", email.description, email.address);
                        }
                    }
                }
                None => println!("No lunch found for {}", launch_args),
            }
        }
        Commands::ClearOld => {
            let removed = AppointmentService::clear_old(store.as_ref(), Utc::now()).await?;
            let remaining = AppointmentService::load_or_empty(store.as_ref()).await?;
            for thumbnail in AppointmentService::orphaned_thumbnails(&removed, &remaining) {
                delete_thumbnail(&host.data_dir, &thumbnail).await;
            }
            println!("Removed {} past lunch(es).", removed.len());
        }
        Commands::Guests => {
            let appointments = AppointmentService::load_or_empty(store.as_ref()).await?;
            for guest in AppointmentService::current_guests(&appointments) {
                println!("{}", guest.full_name);
            }
        }
        Commands::Status => print_status(settings.as_ref()),
        Commands::SetWindow { minutes } => {
            if minutes <= 0 {
                return Err("window must be at least one minute".into());
            }
            settings.set_int(MONITOR_TIME_WINDOW_KEY, minutes)?;
            println!("Reminders will cover the next {} minutes.", minutes);
        }
    }
    Ok(())
}

fn describe(appointment: &Appointment, host: &HostConfig) -> String {
    let mut line = format!(
        "{}  {} {}  {}",
        appointment.id,
        appointment.lunch_time.format("%Y-%m-%d"),
        format_lunch_time(&appointment.lunch_time, host.display_tz),
        appointment.title
    );
    if !appointment.location.name.is_empty() {
        line.push_str(&format!(" @ {}", appointment.location.name));
    }
    if !appointment.guests.is_empty() {
        line.push_str(&format!(" with {}", join_guest_names(&appointment.guests)));
    }
    line
}

fn print_status(settings: &JsonSettingsStore) {
    let window = MonitorSettings::from_settings(settings).lookahead.num_minutes();
    let enabled = settings.get_bool(TASK_ENABLED_KEY).unwrap_or(false);
    let status = settings
        .get_string(TASK_STATUS_KEY)
        .unwrap_or_else(|| "Never run".to_string());
    println!("Reminders enabled: {}", enabled);
    println!("Window: {} minutes", window);
    println!("Last status: {}", status);
}

async fn delete_thumbnail(data_dir: &Path, thumbnail: &str) {
    let path = Path::new(thumbnail);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete thumbnail"),
    }
}

async fn create_appointment_from_prompt(
    store: &JsonFileStore,
) -> Result<Appointment, Box<dyn std::error::Error>> {
    let title = Text::new("What's the lunch called?").prompt()?;
    let when = Text::new("When? (RFC 3339, e.g. 2026-02-10T12:30:00-05:00)").prompt()?;
    let lunch_time = DateTime::parse_from_rfc3339(when.trim())?;
    let location = Location {
        name: Text::new("Where?").prompt()?,
        address: Text::new("Address (optional)").prompt()?,
    };
    let guest_names = Text::new("Guests, comma separated (optional)").prompt()?;
    let guests = guest_names
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(Guest::new)
        .collect();
    Ok(AppointmentService::create(store, &title, lunch_time, location, guests).await?)
}
