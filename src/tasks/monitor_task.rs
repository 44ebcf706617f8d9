use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::clients::notifier::Notifier;
use crate::error::NotifyError;
use crate::models::appointment::Appointment;
use crate::service::notification_message_service::NotificationMessageService;
use crate::service::status::StatusLog;
use crate::store::appointments::AppointmentStore;
use crate::store::settings::{MONITOR_TIME_WINDOW_KEY, SettingsStore};
use crate::tasks::deferral::TaskInstance;

pub const DEFAULT_WINDOW_MINUTES: i64 = 30;

pub const NO_FILE_STATUS: &str =
    "No appointments file saved. Add appointments before enabling reminders.";
pub const NO_APPOINTMENTS_STATUS: &str = "No appointments found";

/// Inputs of one monitor pass, read once by the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorSettings {
    /// Appointments starting strictly inside this window get a reminder.
    pub lookahead: Duration,
    /// Zone used to render lunch times; `None` keeps each appointment's offset.
    pub display_tz: Option<Tz>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            lookahead: Duration::minutes(DEFAULT_WINDOW_MINUTES),
            display_tz: None,
        }
    }
}

impl MonitorSettings {
    /// Absent or non-positive windows fall back to 30 minutes.
    pub fn from_settings<S: SettingsStore + ?Sized>(settings: &S) -> Self {
        let minutes = match settings.get_int(MONITOR_TIME_WINDOW_KEY) {
            Some(minutes) if minutes > 0 => minutes,
            Some(minutes) => {
                warn!(minutes, "ignoring non-positive monitor window");
                DEFAULT_WINDOW_MINUTES
            }
            None => DEFAULT_WINDOW_MINUTES,
        };
        Self {
            lookahead: Duration::minutes(minutes),
            display_tz: None,
        }
    }

    pub fn with_display_tz(mut self, display_tz: Option<Tz>) -> Self {
        self.display_tz = display_tz;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// The appointments file has never been written.
    NoFile,
    NoAppointments,
    Completed { notified: u32, failures: Vec<String> },
    /// Loading the appointments failed; nothing was dispatched.
    Failed(String),
    /// Another pass held the run lock.
    Skipped,
}

pub fn is_due(appointment: &Appointment, now: DateTime<Utc>, lookahead: Duration) -> bool {
    let until = appointment.lunch_time.with_timezone(&Utc) - now;
    until > Duration::zero() && until < lookahead
}

pub fn due_appointments<'a>(
    appointments: &'a [Appointment],
    now: DateTime<Utc>,
    lookahead: Duration,
) -> impl Iterator<Item = &'a Appointment> {
    appointments
        .iter()
        .filter(move |appointment| is_due(appointment, now, lookahead))
}

fn dispatch<N: Notifier + ?Sized>(
    notifier: &N,
    appointment: &Appointment,
    now: DateTime<Utc>,
    display_tz: Option<Tz>,
) -> Result<(), NotifyError> {
    let toast = NotificationMessageService::build_toast_request(appointment, now, display_tz);
    notifier.show_toast(&toast)
}

/// One filter-and-notify pass over the stored appointments.
///
/// Never fails: every problem ends up in `status` and the returned outcome.
/// Notification failures are isolated per appointment and the remaining
/// appointments are still processed.
pub async fn monitor_tick<A, N>(
    store: &A,
    notifier: &N,
    settings: &MonitorSettings,
    now: DateTime<Utc>,
    status: &mut StatusLog,
) -> PassOutcome
where
    A: AppointmentStore + ?Sized,
    N: Notifier + ?Sized,
{
    let appointments = match store.load_appointments().await {
        Ok(appointments) => appointments,
        Err(e) if e.is_not_found() => {
            status.record(NO_FILE_STATUS);
            return PassOutcome::NoFile;
        }
        Err(e) => {
            error!(error = %e, "failed to load appointments");
            status.record(format!("Error: {}", e));
            return PassOutcome::Failed(e.to_string());
        }
    };

    if appointments.is_empty() {
        status.record(NO_APPOINTMENTS_STATUS);
        return PassOutcome::NoAppointments;
    }
    status.record(format!("{} appointments found", appointments.len()));

    let mut notified: u32 = 0;
    let mut failures: Vec<String> = Vec::new();
    for lunch in due_appointments(&appointments, now, settings.lookahead) {
        debug!(id = %lunch.id, title = %lunch.title, "creating toast");
        if let Err(e) = dispatch(notifier, lunch, now, settings.display_tz) {
            warn!(id = %lunch.id, error = %e, "failed to show toast");
            failures.push(format!("{}: {}", lunch.title, e));
            continue;
        }
        notified += 1;

        let tile = NotificationMessageService::build_tile_visual(lunch, settings.display_tz);
        if let Err(e) = notifier.update_tile(&tile) {
            warn!(id = %lunch.id, error = %e, "failed to update tile");
            failures.push(format!("{}: {}", lunch.title, e));
            continue;
        }
        status.record(format!("Sent toast and tile for {}", lunch.title));
    }

    if notified > 0 {
        if let Err(e) = notifier.update_badge(notified) {
            warn!(count = notified, error = %e, "failed to update badge");
            failures.push(format!("badge: {}", e));
        }
    }

    let last_run = now.format("%Y-%m-%d %H:%M:%S UTC");
    match failures.first() {
        None => status.record(format!("Successful, last run {}", last_run)),
        Some(first) => status.record(format!(
            "Completed with {} error(s): {}, last run {}",
            failures.len(),
            first,
            last_run
        )),
    }
    PassOutcome::Completed { notified, failures }
}

/// The background task the host invokes on every timer tick.
pub struct MonitorTask {
    store: Arc<dyn AppointmentStore>,
    settings: Arc<dyn SettingsStore>,
    notifier: Arc<dyn Notifier>,
    display_tz: Option<Tz>,
    run_lock: Mutex<()>,
}

impl MonitorTask {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        settings: Arc<dyn SettingsStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            settings,
            notifier,
            display_tz: None,
            run_lock: Mutex::new(()),
        }
    }

    pub fn with_display_tz(mut self, display_tz: Option<Tz>) -> Self {
        self.display_tz = display_tz;
        self
    }

    /// Runs one pass and completes the instance's deferral on every path.
    /// A pass that overlaps a running one is skipped without touching the
    /// stored status.
    pub async fn run(&self, instance: &dyn TaskInstance, now: DateTime<Utc>) -> PassOutcome {
        let deferral = instance.get_deferral();

        let Ok(_running) = self.run_lock.try_lock() else {
            warn!("monitor pass already running, skipping");
            deferral.complete();
            return PassOutcome::Skipped;
        };

        // Settings stores do synchronous file I/O.
        let settings_store = self.settings.clone();
        let settings =
            match tokio::task::spawn_blocking(move || MonitorSettings::from_settings(settings_store.as_ref()))
                .await
            {
                Ok(settings) => settings,
                Err(e) => {
                    error!(error = %e, "failed to read monitor settings");
                    MonitorSettings::default()
                }
            }
            .with_display_tz(self.display_tz);
        let mut status = StatusLog::new();
        let outcome = monitor_tick(
            self.store.as_ref(),
            self.notifier.as_ref(),
            &settings,
            now,
            &mut status,
        )
        .await;

        let settings_store = self.settings.clone();
        match tokio::task::spawn_blocking(move || status.persist(settings_store.as_ref())).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "failed to save task status"),
            Err(e) => error!(error = %e, "status write did not finish"),
        }
        deferral.complete();
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::settings::MemorySettingsStore;
    use chrono::TimeZone;

    fn at(now: DateTime<Utc>, offset: Duration) -> Appointment {
        Appointment::new("Lunch", (now + offset).fixed_offset())
    }

    #[test]
    fn window_is_strict_on_both_ends() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let window = Duration::minutes(30);

        assert!(!is_due(&at(now, Duration::zero()), now, window));
        assert!(is_due(&at(now, Duration::seconds(1)), now, window));
        assert!(is_due(&at(now, Duration::minutes(29)), now, window));
        assert!(!is_due(&at(now, Duration::minutes(30)), now, window));
        assert!(!is_due(&at(now, Duration::minutes(-5)), now, window));
        assert!(!is_due(&at(now, Duration::minutes(45)), now, window));
    }

    #[test]
    fn offsets_are_compared_as_instants() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let tokyo = chrono::FixedOffset::east_opt(9 * 3600).unwrap();
        let lunch = Appointment::new(
            "Lunch",
            tokyo.with_ymd_and_hms(2026, 2, 10, 21, 10, 0).unwrap(),
        );
        assert!(is_due(&lunch, now, Duration::minutes(30)));
    }

    #[test]
    fn due_appointments_keep_collection_order() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let list = vec![
            at(now, Duration::minutes(20)),
            at(now, Duration::minutes(90)),
            at(now, Duration::minutes(5)),
        ];
        let due: Vec<&str> = due_appointments(&list, now, Duration::minutes(30))
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(due, vec![list[0].id.as_str(), list[2].id.as_str()]);
    }

    #[test]
    fn settings_window_defaults_and_rejects_non_positive() {
        let settings = MemorySettingsStore::new();
        assert_eq!(
            MonitorSettings::from_settings(&settings).lookahead,
            Duration::minutes(30)
        );

        settings.set_int(MONITOR_TIME_WINDOW_KEY, 60).unwrap();
        assert_eq!(
            MonitorSettings::from_settings(&settings).lookahead,
            Duration::minutes(60)
        );

        settings.set_int(MONITOR_TIME_WINDOW_KEY, 0).unwrap();
        assert_eq!(
            MonitorSettings::from_settings(&settings).lookahead,
            Duration::minutes(30)
        );
    }
}
