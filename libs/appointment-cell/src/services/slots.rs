use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};

use doctor_cell::models::WorkingHours;

use crate::models::{AvailableSlot, BusyPeriod};

/// Splits each active working-hours block of `date` into fixed slots and drops
/// those that overlap a busy period or start before `not_before`.
///
/// Working hours are clinic-local wall-clock times; `offset` is the clinic's
/// UTC offset. A slot is only emitted when it ends at or before the block end.
pub fn compute_slots(
    date: NaiveDate,
    working_hours: &[WorkingHours],
    busy: &[BusyPeriod],
    slot_minutes: i64,
    offset: FixedOffset,
    not_before: Option<DateTime<Utc>>,
) -> Vec<AvailableSlot> {
    if slot_minutes <= 0 {
        return Vec::new();
    }
    let step = Duration::minutes(slot_minutes);
    let mut slots: Vec<AvailableSlot> = Vec::new();

    for block in working_hours.iter().filter(|h| h.active) {
        let (Some(block_start), Some(block_end)) = (
            offset.from_local_datetime(&date.and_time(block.start_time)).single(),
            offset.from_local_datetime(&date.and_time(block.end_time)).single(),
        ) else {
            continue;
        };

        let mut cursor = block_start;
        while cursor + step <= block_end {
            let slot_end = cursor + step;
            let start_utc = cursor.with_timezone(&Utc);
            let end_utc = slot_end.with_timezone(&Utc);

            let in_past = not_before.is_some_and(|limit| start_utc < limit);
            let taken = busy.iter().any(|period| period.overlaps(start_utc, end_utc));

            if !in_past && !taken {
                slots.push(AvailableSlot {
                    time: cursor.format("%H:%M").to_string(),
                    start: cursor,
                    end: slot_end,
                    available: true,
                });
            }
            cursor = slot_end;
        }
    }

    slots.sort_by_key(|slot| slot.start);
    slots.dedup_by_key(|slot| slot.start);
    slots
}

/// UTC bounds of a clinic-local calendar day.
pub fn local_day_bounds(date: NaiveDate, offset: FixedOffset) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = offset
        .from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .single()?
        .with_timezone(&Utc);
    Some((start, start + Duration::days(1)))
}
