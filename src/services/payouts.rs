use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc, Weekday};

use crate::models::Event;

/// Hours after the event ends before sale proceeds can leave escrow. The
/// buyer's claim window lives inside this hold.
pub const POST_EVENT_HOLD_HOURS: i64 = 48;

/// Minimum hours a credit stays in escrow regardless of the event date,
/// counted from payment (or from dispute resolution when re-triggered).
pub const MIN_HOLD_HOURS: i64 = 24;

/// Assumed duration of an event with no published end time.
pub const DEFAULT_EVENT_DURATION_HOURS: i64 = 4;

/// When the event is considered over. Falls back to a fixed duration after
/// the start when the organizer published no end time.
pub fn event_end_estimate(event: &Event) -> DateTime<Utc> {
    event
        .ends_at
        .unwrap_or(event.starts_at + Duration::hours(DEFAULT_EVENT_DURATION_HOURS))
}

fn clearance(event: &Event, reference: DateTime<Utc>) -> DateTime<Utc> {
    let after_event = event_end_estimate(event) + Duration::hours(POST_EVENT_HOLD_HOURS);
    let after_reference = reference + Duration::hours(MIN_HOLD_HOURS);
    after_event.max(after_reference)
}

/// When the sale credit for an order paid at `paid_at` becomes releasable.
/// Late sales (paid close to or after the event) keep the full minimum hold.
pub fn available_from(event: &Event, paid_at: DateTime<Utc>) -> DateTime<Utc> {
    clearance(event, paid_at)
}

/// Re-triggered availability after a dispute is resolved in the seller's
/// favor. The post-event hold still applies when it is the later bound.
pub fn release_after_resolution(event: &Event, resolved_at: DateTime<Utc>) -> DateTime<Utc> {
    clearance(event, resolved_at)
}

/// The batch day on which an eligible credit is actually paid out: the
/// next Monday, Wednesday or Friday on or after the eligibility date.
/// Batch days never enter the eligibility rules themselves.
pub fn next_batch_day(eligible_at: DateTime<Utc>) -> NaiveDate {
    let base = eligible_at.date_naive();
    for offset in 0..7 {
        if let Some(date) = base.checked_add_days(Days::new(offset)) {
            if matches!(date.weekday(), Weekday::Mon | Weekday::Wed | Weekday::Fri) {
                return date;
            }
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn event_at(starts: DateTime<Utc>, ends: Option<DateTime<Utc>>) -> Event {
        Event {
            id: Uuid::new_v4(),
            name: "Test event".to_string(),
            venue: None,
            starts_at: starts,
            ends_at: ends,
            created_at: starts - Duration::days(30),
        }
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_uses_published_end_time_when_present() {
        let event = event_at(utc(2024, 6, 1, 20), Some(utc(2024, 6, 2, 1)));
        assert_eq!(event_end_estimate(&event), utc(2024, 6, 2, 1));
    }

    #[test]
    fn test_estimates_end_as_start_plus_four_hours() {
        let event = event_at(utc(2024, 6, 1, 20), None);
        assert_eq!(event_end_estimate(&event), utc(2024, 6, 2, 0));
    }

    #[test]
    fn test_early_sale_waits_for_the_post_event_hold() {
        let event = event_at(utc(2024, 6, 1, 20), Some(utc(2024, 6, 1, 23)));
        // Paid weeks before the event; the event side dominates.
        let from = available_from(&event, utc(2024, 5, 1, 10));
        assert_eq!(from, utc(2024, 6, 3, 23));
    }

    #[test]
    fn test_late_sale_keeps_the_minimum_hold() {
        let event = event_at(utc(2024, 6, 1, 20), Some(utc(2024, 6, 1, 23)));
        // Paid three days after the event already ended.
        let from = available_from(&event, utc(2024, 6, 4, 12));
        assert_eq!(from, utc(2024, 6, 5, 12));
    }

    #[test]
    fn test_resolution_re_triggers_the_minimum_hold() {
        let event = event_at(utc(2024, 6, 1, 20), Some(utc(2024, 6, 1, 23)));
        let from = release_after_resolution(&event, utc(2024, 6, 10, 9));
        assert_eq!(from, utc(2024, 6, 11, 9));
    }

    #[test]
    fn test_batch_day_is_the_same_date_on_a_batch_weekday() {
        // 2024-01-01 was a Monday.
        assert_eq!(
            next_batch_day(utc(2024, 1, 1, 15)),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
        assert_eq!(
            next_batch_day(utc(2024, 1, 3, 0)),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
        assert_eq!(
            next_batch_day(utc(2024, 1, 5, 23)),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }

    #[test]
    fn test_off_days_roll_forward_to_the_next_batch_day() {
        // Tue -> Wed, Thu -> Fri.
        assert_eq!(
            next_batch_day(utc(2024, 1, 2, 10)),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
        assert_eq!(
            next_batch_day(utc(2024, 1, 4, 10)),
            NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
        );
    }

    #[test]
    fn test_weekend_eligibility_pays_on_monday() {
        // Sat 2024-01-06 and Sun 2024-01-07 -> Mon 2024-01-08.
        assert_eq!(
            next_batch_day(utc(2024, 1, 6, 10)),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
        assert_eq!(
            next_batch_day(utc(2024, 1, 7, 10)),
            NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()
        );
    }
}
