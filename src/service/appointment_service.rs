use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::StoreError;
use crate::models::appointment::{Appointment, Guest, Location};
use crate::service::notification_message_service::parse_launch_args;
use crate::store::appointments::AppointmentStore;

pub struct AppointmentService;

impl AppointmentService {
    /// Loads appointments, treating a missing file as an empty list.
    pub async fn load_or_empty<A: AppointmentStore + ?Sized>(
        store: &A,
    ) -> Result<Vec<Appointment>, StoreError> {
        match store.load_appointments().await {
            Ok(appointments) => Ok(appointments),
            Err(e) if e.is_not_found() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub async fn create<A: AppointmentStore + ?Sized>(
        store: &A,
        title: &str,
        lunch_time: DateTime<FixedOffset>,
        location: Location,
        guests: Vec<Guest>,
    ) -> Result<Appointment, StoreError> {
        let mut appointments = Self::load_or_empty(store).await?;
        let mut appointment = Appointment::new(title, lunch_time);
        appointment.location = location;
        appointment.guests = guests;
        appointments.push(appointment.clone());
        store.save_appointments(&appointments).await?;
        Ok(appointment)
    }

    /// Resolves toast activation arguments (`?id=...`) to an appointment.
    pub fn find_by_launch_args<'a>(
        appointments: &'a [Appointment],
        args: &str,
    ) -> Option<&'a Appointment> {
        let id = parse_launch_args(args)?;
        appointments.iter().find(|appointment| appointment.id == id)
    }

    /// Removes appointments whose lunch time has passed and returns them.
    /// The file is only rewritten when something was removed.
    pub async fn clear_old<A: AppointmentStore + ?Sized>(
        store: &A,
        now: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let appointments = Self::load_or_empty(store).await?;
        let (old, upcoming): (Vec<Appointment>, Vec<Appointment>) = appointments
            .into_iter()
            .partition(|appointment| appointment.lunch_time.with_timezone(&Utc) < now);
        if !old.is_empty() {
            store.save_appointments(&upcoming).await?;
        }
        Ok(old)
    }

    /// Distinct guests across all appointments, by guest id, first seen wins.
    pub fn current_guests(appointments: &[Appointment]) -> Vec<Guest> {
        let mut seen = HashSet::new();
        appointments
            .iter()
            .flat_map(|appointment| appointment.guests.iter())
            .filter(|guest| seen.insert(guest.id.clone()))
            .cloned()
            .collect()
    }

    /// Thumbnails of removed appointments' guests that no remaining
    /// appointment refers to.
    pub fn orphaned_thumbnails(removed: &[Appointment], remaining: &[Appointment]) -> Vec<String> {
        let in_use: HashSet<&str> = remaining
            .iter()
            .flat_map(|appointment| appointment.guests.iter())
            .map(|guest| guest.thumbnail_uri.as_str())
            .collect();
        let mut orphaned: Vec<String> = Vec::new();
        for guest in removed.iter().flat_map(|appointment| appointment.guests.iter()) {
            let uri = guest.thumbnail_uri.as_str();
            if !uri.is_empty() && !in_use.contains(uri) && !orphaned.iter().any(|o| o == uri) {
                orphaned.push(uri.to_string());
            }
        }
        orphaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::appointments::MemoryAppointmentStore;
    use chrono::{Duration, TimeZone};

    fn guest(id: &str, name: &str, thumb: &str) -> Guest {
        Guest {
            id: id.to_string(),
            full_name: name.to_string(),
            thumbnail_uri: thumb.to_string(),
            ..Guest::default()
        }
    }

    #[tokio::test]
    async fn create_appends_to_a_missing_store() {
        let store = MemoryAppointmentStore::missing();
        let time = DateTime::parse_from_rfc3339("2026-02-10T12:30:00+01:00").unwrap();
        let location = Location {
            name: "Cafe A".to_string(),
            address: "1 Main St".to_string(),
        };

        let created = AppointmentService::create(&store, "Lunch", time, location, vec![])
            .await
            .expect("create should succeed");

        let stored = store.load_appointments().await.unwrap();
        assert_eq!(stored, vec![created.clone()]);
        assert_eq!(stored[0].location.name, "Cafe A");
    }

    #[tokio::test]
    async fn clear_old_removes_only_past_lunches() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 12, 0, 0).unwrap();
        let past = Appointment::new("past", (now - Duration::hours(1)).fixed_offset());
        let future = Appointment::new("future", (now + Duration::hours(1)).fixed_offset());
        let store = MemoryAppointmentStore::new(vec![past.clone(), future.clone()]);

        let removed = AppointmentService::clear_old(&store, now).await.unwrap();

        assert_eq!(removed, vec![past]);
        assert_eq!(store.load_appointments().await.unwrap(), vec![future]);
    }

    #[tokio::test]
    async fn clear_old_leaves_a_missing_file_missing() {
        let store = MemoryAppointmentStore::missing();
        let removed = AppointmentService::clear_old(&store, Utc::now()).await.unwrap();
        assert!(removed.is_empty());
        assert!(store.load_appointments().await.unwrap_err().is_not_found());
    }

    #[test]
    fn launch_args_resolve_to_the_matching_appointment() {
        let time = DateTime::parse_from_rfc3339("2026-02-10T12:30:00Z").unwrap();
        let list = vec![Appointment::new("a", time), Appointment::new("b", time)];
        let args = format!("?id={}", list[1].id);

        let found = AppointmentService::find_by_launch_args(&list, &args);
        assert_eq!(found.map(|a| a.title.as_str()), Some("b"));
        assert!(AppointmentService::find_by_launch_args(&list, "?id=missing").is_none());
    }

    #[test]
    fn current_guests_are_distinct_by_id() {
        let time = DateTime::parse_from_rfc3339("2026-02-10T12:30:00Z").unwrap();
        let mut first = Appointment::new("a", time);
        first.guests = vec![guest("g1", "Alice", ""), guest("g2", "Bob", "")];
        let mut second = Appointment::new("b", time);
        second.guests = vec![guest("g2", "Bob", ""), guest("g3", "Carol", "")];

        let names: Vec<String> = AppointmentService::current_guests(&[first, second])
            .into_iter()
            .map(|g| g.full_name)
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
    }

    #[test]
    fn thumbnails_still_in_use_are_kept() {
        let time = DateTime::parse_from_rfc3339("2026-02-10T12:30:00Z").unwrap();
        let mut removed = Appointment::new("old", time);
        removed.guests = vec![
            guest("g1", "Alice", "Alice_Thumb.jpg"),
            guest("g2", "Bob", "Bob_Thumb.jpg"),
            guest("g3", "Carol", ""),
        ];
        let mut remaining = Appointment::new("new", time);
        remaining.guests = vec![guest("g2", "Bob", "Bob_Thumb.jpg")];

        let orphaned = AppointmentService::orphaned_thumbnails(&[removed], &[remaining]);
        assert_eq!(orphaned, vec!["Alice_Thumb.jpg".to_string()]);
    }
}
