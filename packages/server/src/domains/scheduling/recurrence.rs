//! Next-fire computation for publishing calendars. All times are UTC.

use chrono::{DateTime, Datelike, Duration, Months, Timelike, Utc};

use super::models::TimeSlot;
use crate::common::{Frequency, PipelineError};

/// Earliest instant strictly after `now` at which any slot fires.
///
/// For each slot the candidate is `now` with the slot's hour and minute
/// (seconds zeroed), then pushed forward:
/// - daily: one day if it is not after `now`;
/// - weekly: to the slot's weekday, or a full week when that is today and the
///   time has passed;
/// - monthly: one calendar month if it is not after `now`, clamped to the last
///   day of a shorter month.
pub fn next_scheduled_at(
    frequency: Frequency,
    slots: &[TimeSlot],
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, PipelineError> {
    if slots.is_empty() {
        return Err(PipelineError::data("a calendar needs at least one time slot"));
    }

    let mut earliest: Option<DateTime<Utc>> = None;
    for slot in slots {
        slot.validate()?;
        let candidate = next_for_slot(frequency, slot, now)?;
        earliest = Some(earliest.map_or(candidate, |e| e.min(candidate)));
    }

    earliest.ok_or_else(|| PipelineError::data("no time slot produced a fire time"))
}

fn next_for_slot(
    frequency: Frequency,
    slot: &TimeSlot,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, PipelineError> {
    let candidate = now
        .with_hour(slot.hour)
        .and_then(|t| t.with_minute(slot.minute))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .ok_or_else(|| PipelineError::data(format!("invalid time slot {:?}", slot)))?;

    let next = match frequency {
        Frequency::Daily => {
            if candidate <= now {
                candidate + Duration::days(1)
            } else {
                candidate
            }
        }
        Frequency::Weekly => {
            let today = now.weekday().num_days_from_sunday() as i64;
            let days_ahead = (slot.day_of_week as i64 - today + 7) % 7;
            if days_ahead == 0 && candidate <= now {
                candidate + Duration::days(7)
            } else {
                candidate + Duration::days(days_ahead)
            }
        }
        Frequency::Monthly => {
            if candidate <= now {
                candidate
                    .checked_add_months(Months::new(1))
                    .ok_or_else(|| PipelineError::data("monthly recurrence out of range"))?
            } else {
                candidate
            }
        }
    };

    Ok(next)
}

/// Instants for `count` consecutive posts starting at `start`, spaced by
/// `frequency`.
pub fn spaced_instants(start: DateTime<Utc>, frequency: Frequency, count: usize) -> Vec<DateTime<Utc>> {
    (0..count)
        .map(|i| match frequency {
            Frequency::Daily => start + Duration::days(i as i64),
            Frequency::Weekly => start + Duration::weeks(i as i64),
            Frequency::Monthly => start
                .checked_add_months(Months::new(i as u32))
                .unwrap_or(start),
        })
        .collect()
}
