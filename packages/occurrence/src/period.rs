//! Reporting-period filter.
//!
//! A [`PeriodSpec`] is resolved into a half-open [`PeriodWindow`] against an
//! explicit "today", then applied to a record slice. Resolution rules:
//!
//! * `last_days = N` wins over everything else and selects
//!   `[today - (N - 1), today]`, both days inclusive.
//! * otherwise `start` selects from midnight of that day and `end` selects up
//!   to (but excluding) midnight of the day after, so the end date itself is
//!   included. Either may be given alone.
//! * with no parameters the window is unbounded and records pass through.

use aedes_map_occurrence_models::{Occurrence, PeriodSpec, PeriodWindow};
use chrono::{Days, NaiveDate, NaiveDateTime, NaiveTime};

use crate::PeriodError;
use crate::parsing::parse_iso_date;

/// Command-line name of the start parameter, used in error messages.
pub const START_PARAMETER: &str = "--inicio";
/// Command-line name of the end parameter, used in error messages.
pub const END_PARAMETER: &str = "--fim";

/// Resolves `spec` into a concrete window relative to `today`.
///
/// # Errors
///
/// Returns [`PeriodError::InvalidDateFormat`] if `start` or `end` is not a
/// valid `YYYY-MM-DD` date (only checked when `last_days` is absent), or
/// [`PeriodError::NonPositiveLastDays`] if `last_days` is zero.
pub fn resolve_window(spec: &PeriodSpec, today: NaiveDate) -> Result<PeriodWindow, PeriodError> {
    if spec.is_empty() {
        return Ok(PeriodWindow::unbounded());
    }

    if let Some(last_days) = spec.last_days {
        if spec.start.is_some() || spec.end.is_some() {
            log::warn!("--ultimos_dias given; ignoring --inicio/--fim");
        }
        return last_days_window(last_days, today);
    }

    let start = spec
        .start
        .as_deref()
        .map(|s| parse_param(START_PARAMETER, s))
        .transpose()?
        .map(midnight);

    let end = spec
        .end
        .as_deref()
        .map(|s| parse_param(END_PARAMETER, s))
        .transpose()?
        .map(day_after);

    Ok(PeriodWindow { start, end })
}

/// Window covering the `last_days` calendar days ending with `today`.
///
/// # Errors
///
/// Returns [`PeriodError::NonPositiveLastDays`] if `last_days` is zero.
pub fn last_days_window(last_days: u32, today: NaiveDate) -> Result<PeriodWindow, PeriodError> {
    if last_days == 0 {
        return Err(PeriodError::NonPositiveLastDays);
    }

    let first = today
        .checked_sub_days(Days::new(u64::from(last_days - 1)))
        .unwrap_or(NaiveDate::MIN);

    Ok(PeriodWindow {
        start: Some(midnight(first)),
        end: Some(day_after(today)),
    })
}

/// Returns the records whose timestamp falls inside `window`.
///
/// The input is left untouched. An unbounded window returns every record.
#[must_use]
pub fn filter_records(records: &[Occurrence], window: &PeriodWindow) -> Vec<Occurrence> {
    if window.is_unbounded() {
        return records.to_vec();
    }

    records
        .iter()
        .filter(|r| window.contains(&r.timestamp))
        .cloned()
        .collect()
}

/// Resolves `spec` and filters `records` in one step.
///
/// # Errors
///
/// Returns [`PeriodError`] if the spec cannot be resolved.
pub fn filter_period(
    records: &[Occurrence],
    spec: &PeriodSpec,
    today: NaiveDate,
) -> Result<Vec<Occurrence>, PeriodError> {
    let window = resolve_window(spec, today)?;
    let filtered = filter_records(records, &window);
    log::info!(
        "Period filter kept {} of {} record(s)",
        filtered.len(),
        records.len()
    );
    Ok(filtered)
}

fn parse_param(parameter: &'static str, value: &str) -> Result<NaiveDate, PeriodError> {
    parse_iso_date(value).ok_or_else(|| PeriodError::InvalidDateFormat {
        parameter,
        value: value.to_string(),
    })
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn day_after(date: NaiveDate) -> NaiveDateTime {
    midnight(date.succ_opt().unwrap_or(NaiveDate::MAX))
}

#[cfg(test)]
mod tests {
    use aedes_map_occurrence_models::Coordinates;

    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn record(ts: &str, lat: f64, lon: f64) -> Occurrence {
        Occurrence {
            timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
            coordinates: Some(Coordinates::new(lat, lon)),
            disease: "Dengue".to_string(),
            address: None,
        }
    }

    fn spec(start: Option<&str>, end: Option<&str>, last_days: Option<u32>) -> PeriodSpec {
        PeriodSpec {
            start: start.map(String::from),
            end: end.map(String::from),
            last_days,
        }
    }

    #[test]
    fn end_date_is_included_and_next_day_excluded() {
        let records = vec![
            record("2024-01-05 00:00:00", -23.57, -46.63),
            record("2024-01-10 12:00:00", -23.58, -46.62),
        ];
        let kept = filter_period(
            &records,
            &spec(Some("2024-01-01"), Some("2024-01-05"), None),
            date("2024-06-01"),
        )
        .unwrap();
        assert_eq!(kept, vec![records[0].clone()]);
    }

    #[test]
    fn record_late_on_end_date_is_included() {
        let records = vec![
            record("2024-01-05 23:59:59", 0.0, 0.0),
            record("2024-01-06 00:00:00", 0.0, 0.0),
        ];
        let kept = filter_period(
            &records,
            &spec(None, Some("2024-01-05"), None),
            date("2024-06-01"),
        )
        .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].timestamp, records[0].timestamp);
    }

    #[test]
    fn start_alone_is_inclusive_at_midnight() {
        let records = vec![
            record("2024-01-04 23:59:59", 0.0, 0.0),
            record("2024-01-05 00:00:00", 0.0, 0.0),
        ];
        let kept = filter_period(
            &records,
            &spec(Some("2024-01-05"), None, None),
            date("2024-06-01"),
        )
        .unwrap();
        assert_eq!(kept, vec![records[1].clone()]);
    }

    #[test]
    fn last_days_window_spans_inclusive_days() {
        let window = last_days_window(3, date("2024-02-10")).unwrap();
        assert_eq!(window.start, Some(midnight(date("2024-02-08"))));
        assert_eq!(window.end, Some(midnight(date("2024-02-11"))));
    }

    #[test]
    fn last_days_matches_equivalent_start_end() {
        let today = date("2024-02-10");
        let via_last_days = resolve_window(&spec(None, None, Some(3)), today).unwrap();
        let via_range =
            resolve_window(&spec(Some("2024-02-08"), Some("2024-02-10"), None), today).unwrap();
        assert_eq!(via_last_days, via_range);
    }

    #[test]
    fn last_days_ignores_start_and_end_entirely() {
        let today = date("2024-02-10");
        let window =
            resolve_window(&spec(Some("garbage"), Some("2020-01-01"), Some(1)), today).unwrap();
        assert_eq!(window, last_days_window(1, today).unwrap());
    }

    #[test]
    fn zero_last_days_is_rejected() {
        assert_eq!(
            last_days_window(0, date("2024-02-10")),
            Err(PeriodError::NonPositiveLastDays)
        );
    }

    #[test]
    fn malformed_dates_name_the_parameter() {
        let today = date("2024-02-10");
        assert_eq!(
            resolve_window(&spec(Some("10/02/2024"), None, None), today),
            Err(PeriodError::InvalidDateFormat {
                parameter: START_PARAMETER,
                value: "10/02/2024".to_string(),
            })
        );
        assert_eq!(
            resolve_window(&spec(None, Some("2024-02-30"), None), today),
            Err(PeriodError::InvalidDateFormat {
                parameter: END_PARAMETER,
                value: "2024-02-30".to_string(),
            })
        );
    }

    #[test]
    fn no_parameters_pass_everything_through() {
        let records = vec![
            record("1999-01-01 00:00:00", 0.0, 0.0),
            record("2099-01-01 00:00:00", 0.0, 0.0),
        ];
        let kept = filter_period(&records, &PeriodSpec::default(), date("2024-02-10")).unwrap();
        assert_eq!(kept, records);
        assert_eq!(
            resolve_window(&PeriodSpec::default(), date("2024-02-10")),
            Ok(PeriodWindow::unbounded())
        );
    }

    #[test]
    fn filtering_is_idempotent() {
        let records: Vec<Occurrence> = (1..=20)
            .map(|d| record(&format!("2024-03-{d:02} 08:00:00"), 0.0, 0.0))
            .collect();
        let window = resolve_window(
            &spec(Some("2024-03-05"), Some("2024-03-12"), None),
            date("2024-06-01"),
        )
        .unwrap();
        let once = filter_records(&records, &window);
        let twice = filter_records(&once, &window);
        assert_eq!(once.len(), 8);
        assert_eq!(once, twice);
    }

    #[test]
    fn inverted_range_yields_nothing() {
        let records = vec![record("2024-01-05 10:00:00", 0.0, 0.0)];
        let kept = filter_period(
            &records,
            &spec(Some("2024-01-10"), Some("2024-01-01"), None),
            date("2024-06-01"),
        )
        .unwrap();
        assert!(kept.is_empty());
    }
}
