use chrono::{DateTime, Duration, FixedOffset, Utc};
use chrono_tz::Tz;

use crate::clients::notifier::{
    AdaptiveImage, ImageCrop, TileBinding, TileVisual, ToastRequest, ToastVisual,
};
use crate::models::appointment::{Appointment, Guest};

pub const HEADLINE: &str = "Lunch Time!";

/// Toast payloads must stay under the platform's size ceiling.
pub const TOAST_BODY_MAX_CHARS: usize = 80;
pub const TILE_MEDIUM_MAX_CHARS: usize = 62;
pub const TILE_WIDE_MAX_CHARS: usize = 133;
pub const TILE_LARGE_MAX_CHARS: usize = 81;

pub const TOAST_LIFETIME_MINUTES: i64 = 30;

const SHORT_TIME_FORMAT: &str = "%-I:%M %p";

/// Joins names as "Alice", "Alice and Bob", "Alice, Bob and Carol".
pub fn join_guest_names(guests: &[Guest]) -> String {
    let last = guests.len().saturating_sub(1);
    let mut joined = String::new();
    for (idx, guest) in guests.iter().enumerate() {
        if idx == 0 {
            // no separator before the first name
        } else if idx == last {
            joined.push_str(" and ");
        } else {
            joined.push_str(", ");
        }
        joined.push_str(&guest.full_name);
    }
    joined
}

/// Cuts `text` to at most `max` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

pub fn format_lunch_time(lunch_time: &DateTime<FixedOffset>, display_tz: Option<Tz>) -> String {
    match display_tz {
        Some(tz) => lunch_time.with_timezone(&tz).format(SHORT_TIME_FORMAT).to_string(),
        None => lunch_time.format(SHORT_TIME_FORMAT).to_string(),
    }
}

pub fn launch_args(appointment_id: &str) -> String {
    format!("?id={}", appointment_id)
}

/// Pulls the appointment id back out of toast activation arguments.
pub fn parse_launch_args(args: &str) -> Option<&str> {
    args.trim()
        .trim_start_matches('?')
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "id")
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

pub struct NotificationMessageService;

impl NotificationMessageService {
    /// Full reminder sentence before any size cap is applied.
    pub fn build_message(appointment: &Appointment, display_tz: Option<Tz>) -> String {
        let time = format_lunch_time(&appointment.lunch_time, display_tz);
        if appointment.guests.is_empty() {
            format!("You have lunch at {} at {}", time, appointment.location.name)
        } else {
            format!(
                "You have lunch at {} with {}",
                time,
                join_guest_names(&appointment.guests)
            )
        }
    }

    fn guest_image(appointment: &Appointment) -> Option<AdaptiveImage> {
        appointment
            .guests
            .first()
            .filter(|guest| !guest.thumbnail_uri.is_empty())
            .map(|guest| AdaptiveImage {
                source: guest.thumbnail_uri.clone(),
                crop: ImageCrop::Circle,
            })
    }

    pub fn build_toast_visual(appointment: &Appointment, display_tz: Option<Tz>) -> ToastVisual {
        let message = Self::build_message(appointment, display_tz);
        ToastVisual {
            headline: HEADLINE.to_string(),
            body: truncate_chars(&message, TOAST_BODY_MAX_CHARS),
            image: Self::guest_image(appointment),
        }
    }

    pub fn build_tile_visual(appointment: &Appointment, display_tz: Option<Tz>) -> TileVisual {
        let message = Self::build_message(appointment, display_tz);
        let image = Self::guest_image(appointment);
        let binding = |max: usize| TileBinding {
            headline: HEADLINE.to_string(),
            body: truncate_chars(&message, max),
            image: image.clone(),
        };
        TileVisual {
            medium: binding(TILE_MEDIUM_MAX_CHARS),
            wide: binding(TILE_WIDE_MAX_CHARS),
            large: binding(TILE_LARGE_MAX_CHARS),
        }
    }

    pub fn build_toast_request(
        appointment: &Appointment,
        now: DateTime<Utc>,
        display_tz: Option<Tz>,
    ) -> ToastRequest {
        ToastRequest {
            visual: Self::build_toast_visual(appointment, display_tz),
            tag: appointment.id.clone(),
            issued: now,
            expiration: now + Duration::minutes(TOAST_LIFETIME_MINUTES),
            launch: launch_args(&appointment.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn lunch_at_half_past_noon() -> Appointment {
        let time = DateTime::parse_from_rfc3339("2026-02-10T12:30:00-05:00").unwrap();
        let mut appointment = Appointment::new("Lunch", time);
        appointment.location.name = "Cafe A".to_string();
        appointment
    }

    fn guests(names: &[&str]) -> Vec<Guest> {
        names.iter().map(|name| Guest::new(name)).collect()
    }

    #[test]
    fn join_uses_commas_and_a_final_and() {
        assert_eq!(join_guest_names(&[]), "");
        assert_eq!(join_guest_names(&guests(&["Alice"])), "Alice");
        assert_eq!(join_guest_names(&guests(&["Alice", "Bob"])), "Alice and Bob");
        assert_eq!(
            join_guest_names(&guests(&["Alice", "Bob", "Carol"])),
            "Alice, Bob and Carol"
        );
        assert_eq!(
            join_guest_names(&guests(&["A", "B", "C", "D"])),
            "A, B, C and D"
        );
    }

    #[test]
    fn join_has_one_separator_per_extra_guest() {
        for n in 1..6 {
            let names: Vec<String> = (0..n).map(|i| format!("Guest{}", i)).collect();
            let list: Vec<Guest> = names.iter().map(|name| Guest::new(name)).collect();
            let joined = join_guest_names(&list);
            let separators = joined.matches(", ").count() + joined.matches(" and ").count();
            assert_eq!(separators, n - 1, "for {} guests", n);
            assert_eq!(joined.ends_with(&format!(" and Guest{}", n - 1)), n >= 2);
        }
    }

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_chars("short", 80), "short");
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        let long = "x".repeat(200);
        assert_eq!(truncate_chars(&long, 80).chars().count(), 80);
    }

    #[test]
    fn message_without_guests_names_the_location() {
        let appointment = lunch_at_half_past_noon();
        let visual = NotificationMessageService::build_toast_visual(&appointment, None);

        assert_eq!(visual.headline, "Lunch Time!");
        assert_eq!(visual.body, "You have lunch at 12:30 PM at Cafe A");
        assert!(!visual.body.contains(" with "));
        assert!(visual.image.is_none());
    }

    #[test]
    fn message_with_guests_lists_them_and_uses_first_photo() {
        let mut appointment = lunch_at_half_past_noon();
        appointment.guests = guests(&["Alice", "Bob", "Carol"]);
        appointment.guests[0].thumbnail_uri = "alice_Thumb.jpg".to_string();
        appointment.guests[1].thumbnail_uri = "bob_Thumb.jpg".to_string();

        let visual = NotificationMessageService::build_toast_visual(&appointment, None);

        assert_eq!(visual.body, "You have lunch at 12:30 PM with Alice, Bob and Carol");
        assert_eq!(
            visual.image,
            Some(AdaptiveImage {
                source: "alice_Thumb.jpg".to_string(),
                crop: ImageCrop::Circle,
            })
        );
    }

    #[test]
    fn long_guest_lists_are_capped() {
        let mut appointment = lunch_at_half_past_noon();
        appointment.guests = guests(&[
            "Bartholomew Fitzgerald",
            "Maximiliana Worthington",
            "Constantine Abernathy",
            "Evangeline Montgomery",
        ]);

        let visual = NotificationMessageService::build_toast_visual(&appointment, None);
        assert_eq!(visual.body.chars().count(), TOAST_BODY_MAX_CHARS);
        assert!(visual.body.starts_with("You have lunch at 12:30 PM with Bartholomew"));

        let tile = NotificationMessageService::build_tile_visual(&appointment, None);
        assert_eq!(tile.medium.body.chars().count(), TILE_MEDIUM_MAX_CHARS);
        assert_eq!(tile.large.body.chars().count(), TILE_LARGE_MAX_CHARS);
        assert!(tile.wide.body.ends_with("Evangeline Montgomery"));
    }

    #[test]
    fn display_timezone_overrides_the_stored_offset() {
        let appointment = lunch_at_half_past_noon();
        let body = NotificationMessageService::build_message(&appointment, Some(Tz::UTC));
        assert_eq!(body, "You have lunch at 5:30 PM at Cafe A");
    }

    #[test]
    fn toast_request_is_tagged_and_expires_in_thirty_minutes() {
        let appointment = lunch_at_half_past_noon();
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 17, 10, 0).unwrap();

        let request = NotificationMessageService::build_toast_request(&appointment, now, None);

        assert_eq!(request.tag, appointment.id);
        assert_eq!(request.launch, format!("?id={}", appointment.id));
        assert_eq!(request.expiration, now + Duration::minutes(30));
    }

    #[test]
    fn launch_args_round_trip_and_reject_garbage() {
        assert_eq!(parse_launch_args(&launch_args("abc123")), Some("abc123"));
        assert_eq!(parse_launch_args("?foo=1&id=xyz"), Some("xyz"));
        assert_eq!(parse_launch_args("?id="), None);
        assert_eq!(parse_launch_args(""), None);
        assert_eq!(parse_launch_args("nonsense"), None);
    }
}
