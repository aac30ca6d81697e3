//! Calendar arithmetic shared by trainer bookings, monthly plans and
//! facility slots. Everything here is pure; callers load the inputs and
//! persist the outputs.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveTime};
use std::collections::HashMap;

use crate::models::{crosses_midnight, AvailabilityWindow, PlanScheduleRequest, TimeRange};

/// A concrete `[start, end)` on one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PlannedSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl PlannedSlot {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start, self.end)
    }
}

/// 0 = Monday .. 6 = Sunday
pub fn weekday_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_monday() as i16
}

/// Monday of the week containing `date`
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Calendar month arithmetic, clamped to the last day of the target month
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

/// Assign recurring plan slots over `[start, end)`.
///
/// Schedule entries are tried in start-time order on each matching day.
/// A proposed slot is skipped when it overlaps anything in `busy` for that
/// date or a slot already assigned in this pass. Assignment stops after
/// `sessions` slots.
pub fn assign_plan_slots(
    schedule: &[PlanScheduleRequest],
    duration_minutes: i32,
    sessions: u32,
    start: NaiveDate,
    end: NaiveDate,
    busy: &HashMap<NaiveDate, Vec<TimeRange>>,
) -> Vec<PlannedSlot> {
    let mut entries: Vec<PlanScheduleRequest> = schedule.to_vec();
    entries.sort_by_key(|entry| (entry.start_time, entry.day_of_week));

    let mut assigned = Vec::new();
    if duration_minutes <= 0 {
        return assigned;
    }
    let duration = Duration::minutes(duration_minutes as i64);

    let mut day = start;
    while day < end && assigned.len() < sessions as usize {
        let weekday = weekday_index(day);
        let mut taken = busy.get(&day).cloned().unwrap_or_default();

        for entry in entries.iter().filter(|entry| entry.day_of_week == weekday) {
            if assigned.len() >= sessions as usize {
                break;
            }
            if crosses_midnight(entry.start_time, duration_minutes) {
                continue;
            }

            let slot = PlannedSlot {
                date: day,
                start: entry.start_time,
                end: entry.start_time + duration,
            };
            if taken.iter().any(|range| range.overlaps(&slot.range())) {
                continue;
            }

            taken.push(slot.range());
            assigned.push(slot);
        }

        day = match day.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }

    assigned
}

/// Expand a weekly availability template into concrete slots for every
/// date in `[from, to]`. Partial trailing slots are dropped.
pub fn generate_facility_slots(
    windows: &[AvailabilityWindow],
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<PlannedSlot> {
    let mut sorted: Vec<AvailabilityWindow> = windows.to_vec();
    sorted.sort_by_key(|window| (window.day_of_week, window.open_time));

    let mut slots = Vec::new();
    for day in from.iter_days().take_while(|day| *day <= to) {
        let weekday = weekday_index(day);

        for window in sorted.iter().filter(|window| window.day_of_week == weekday) {
            if window.slot_duration_minutes <= 0 {
                continue;
            }
            let step = Duration::minutes(window.slot_duration_minutes as i64);

            let mut cursor = window.open_time;
            loop {
                let (slot_end, wrapped) = cursor.overflowing_add_signed(step);
                if wrapped != 0 || slot_end > window.close_time {
                    break;
                }
                slots.push(PlannedSlot {
                    date: day,
                    start: cursor,
                    end: slot_end,
                });
                cursor = slot_end;
            }
        }
    }

    slots.sort();
    slots
}

/// Availability windows minus booked intervals, in start order
pub fn free_intervals(windows: &[TimeRange], booked: &[TimeRange]) -> Vec<TimeRange> {
    let mut windows = windows.to_vec();
    windows.sort();
    let mut booked = booked.to_vec();
    booked.sort();

    let mut free = Vec::new();
    for window in windows {
        let mut cursor = window.start;

        for busy in booked.iter().filter(|busy| busy.overlaps(&window)) {
            if busy.start > cursor {
                free.push(TimeRange::new(cursor, busy.start.min(window.end)));
            }
            cursor = cursor.max(busy.end);
            if cursor >= window.end {
                break;
            }
        }

        if cursor < window.end {
            free.push(TimeRange::new(cursor, window.end));
        }
    }

    free
}

/// True if `candidate` lies entirely inside one of `windows`
pub fn fits_within(windows: &[TimeRange], candidate: &TimeRange) -> bool {
    windows.iter().any(|window| window.contains(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn entry(day: i16, h: u32, m: u32) -> PlanScheduleRequest {
        PlanScheduleRequest {
            day_of_week: day,
            start_time: t(h, m),
        }
    }

    #[test]
    fn test_weekday_and_week_start() {
        // 2024-01-01 was a Monday
        assert_eq!(weekday_index(d(2024, 1, 1)), 0);
        assert_eq!(weekday_index(d(2024, 1, 7)), 6);
        assert_eq!(week_start(d(2024, 1, 7)), d(2024, 1, 1));
        assert_eq!(week_start(d(2024, 1, 8)), d(2024, 1, 8));
        assert_eq!(week_start(d(2024, 1, 3)), d(2024, 1, 1));
    }

    #[test]
    fn test_add_months_clamps_to_month_end() {
        assert_eq!(add_months(d(2024, 1, 15), 1), d(2024, 2, 15));
        assert_eq!(add_months(d(2024, 1, 31), 1), d(2024, 2, 29));
        assert_eq!(add_months(d(2023, 1, 31), 1), d(2023, 2, 28));
        assert_eq!(add_months(d(2024, 11, 30), 3), d(2025, 2, 28));
    }

    #[test]
    fn test_assign_plan_slots_walks_matching_weekdays() {
        // Mon + Thu at 09:00, January 2024
        let schedule = vec![entry(0, 9, 0), entry(3, 9, 0)];
        let slots = assign_plan_slots(&schedule, 60, 4, d(2024, 1, 1), d(2024, 2, 1), &HashMap::new());

        let dates: Vec<NaiveDate> = slots.iter().map(|slot| slot.date).collect();
        assert_eq!(dates, vec![d(2024, 1, 1), d(2024, 1, 4), d(2024, 1, 8), d(2024, 1, 11)]);
        assert!(slots.iter().all(|slot| slot.start == t(9, 0) && slot.end == t(10, 0)));
    }

    #[test]
    fn test_assign_plan_slots_stops_at_term_end() {
        let schedule = vec![entry(0, 18, 0)];
        let slots = assign_plan_slots(&schedule, 45, 20, d(2024, 1, 1), d(2024, 2, 1), &HashMap::new());

        // Mondays in January 2024: 1, 8, 15, 22, 29
        assert_eq!(slots.len(), 5);
        assert_eq!(slots.last().unwrap().date, d(2024, 1, 29));
        assert_eq!(slots[0].end, t(18, 45));
    }

    #[test]
    fn test_assign_plan_slots_skips_busy_intervals() {
        let schedule = vec![entry(0, 9, 0), entry(0, 11, 0)];
        let mut busy = HashMap::new();
        busy.insert(d(2024, 1, 1), vec![TimeRange::new(t(9, 30), t(10, 30))]);

        let slots = assign_plan_slots(&schedule, 60, 3, d(2024, 1, 1), d(2024, 1, 9), &busy);

        assert_eq!(
            slots,
            vec![
                PlannedSlot { date: d(2024, 1, 1), start: t(11, 0), end: t(12, 0) },
                PlannedSlot { date: d(2024, 1, 8), start: t(9, 0), end: t(10, 0) },
                PlannedSlot { date: d(2024, 1, 8), start: t(11, 0), end: t(12, 0) },
            ]
        );
    }

    #[test]
    fn test_assign_plan_slots_does_not_double_book_itself() {
        let schedule = vec![entry(2, 9, 30), entry(2, 9, 0)];
        let slots = assign_plan_slots(&schedule, 60, 10, d(2024, 1, 3), d(2024, 1, 4), &HashMap::new());

        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, t(9, 0));
    }

    #[test]
    fn test_assign_plan_slots_with_empty_term() {
        let schedule = vec![entry(0, 9, 0)];
        assert!(assign_plan_slots(&schedule, 60, 4, d(2024, 1, 1), d(2024, 1, 1), &HashMap::new()).is_empty());
        assert!(assign_plan_slots(&schedule, 60, 0, d(2024, 1, 1), d(2024, 2, 1), &HashMap::new()).is_empty());
    }

    #[test]
    fn test_generate_facility_slots() {
        let windows = vec![AvailabilityWindow {
            day_of_week: 0,
            open_time: t(6, 0),
            close_time: t(8, 30),
            slot_duration_minutes: 60,
        }];

        // Monday 2024-01-01 through Monday 2024-01-08
        let slots = generate_facility_slots(&windows, d(2024, 1, 1), d(2024, 1, 8));

        assert_eq!(slots.len(), 4);
        assert_eq!(slots[0], PlannedSlot { date: d(2024, 1, 1), start: t(6, 0), end: t(7, 0) });
        assert_eq!(slots[1], PlannedSlot { date: d(2024, 1, 1), start: t(7, 0), end: t(8, 0) });
        assert_eq!(slots[2].date, d(2024, 1, 8));
    }

    #[test]
    fn test_generate_facility_slots_until_midnight() {
        let windows = vec![AvailabilityWindow {
            day_of_week: 6,
            open_time: t(22, 0),
            close_time: NaiveTime::from_hms_opt(23, 59, 59).unwrap(),
            slot_duration_minutes: 60,
        }];

        let slots = generate_facility_slots(&windows, d(2024, 1, 7), d(2024, 1, 7));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].start, t(22, 0));
    }

    #[test]
    fn test_generate_facility_slots_ignores_other_days() {
        let windows = vec![AvailabilityWindow {
            day_of_week: 5,
            open_time: t(9, 0),
            close_time: t(10, 0),
            slot_duration_minutes: 30,
        }];
        assert!(generate_facility_slots(&windows, d(2024, 1, 1), d(2024, 1, 5)).is_empty());
    }

    #[test]
    fn test_free_intervals() {
        let windows = vec![TimeRange::new(t(8, 0), t(12, 0)), TimeRange::new(t(14, 0), t(16, 0))];
        let booked = vec![
            TimeRange::new(t(9, 0), t(10, 0)),
            TimeRange::new(t(11, 30), t(12, 30)),
            TimeRange::new(t(14, 0), t(14, 30)),
        ];

        assert_eq!(
            free_intervals(&windows, &booked),
            vec![
                TimeRange::new(t(8, 0), t(9, 0)),
                TimeRange::new(t(10, 0), t(11, 30)),
                TimeRange::new(t(14, 30), t(16, 0)),
            ]
        );
    }

    #[test]
    fn test_free_intervals_fully_booked() {
        let windows = vec![TimeRange::new(t(8, 0), t(9, 0))];
        let booked = vec![TimeRange::new(t(7, 0), t(9, 30))];
        assert!(free_intervals(&windows, &booked).is_empty());
    }

    #[test]
    fn test_fits_within() {
        let windows = vec![TimeRange::new(t(8, 0), t(12, 0))];
        assert!(fits_within(&windows, &TimeRange::new(t(8, 0), t(9, 0))));
        assert!(!fits_within(&windows, &TimeRange::new(t(11, 30), t(12, 30))));
        assert!(!fits_within(&[], &TimeRange::new(t(8, 0), t(9, 0))));
    }
}
