// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

//! Timezone-aware clock helpers.
//!
//! All calendar decisions (day labels, midnight boundaries) are made in the
//! configured site timezone, never in UTC.

use chrono::{DateTime, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::time::Duration;

/// Calendar day label used for sheet titles and snapshot validity.
pub const DAY_LABEL_FORMAT: &str = "%m-%d-%Y";

/// Local time-of-day label written next to each measurement.
pub const TIME_LABEL_FORMAT: &str = "%-I:%M:%S %p";

/// `MM-DD-YYYY` label of the local day containing `at`.
pub fn day_label(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format(DAY_LABEL_FORMAT).to_string()
}

/// `MM-DD-YYYY` label of the current local day.
pub fn today_label(tz: Tz) -> String {
    day_label(Utc::now(), tz)
}

/// Local time-of-day label (`h:mm:ss AM`) for an epoch-millisecond timestamp.
///
/// Returns an empty string for timestamps outside chrono's range.
pub fn time_label(timestamp_ms: i64, tz: Tz) -> String {
    DateTime::from_timestamp_millis(timestamp_ms)
        .map(|at| at.with_timezone(&tz).format(TIME_LABEL_FORMAT).to_string())
        .unwrap_or_default()
}

/// First instant of the local day following the one containing `at`.
///
/// When local midnight does not exist (a DST gap at 00:00) the first valid
/// instant of the following hour is used.
pub fn next_midnight(at: DateTime<Utc>, tz: Tz) -> DateTime<Utc> {
    let Some(tomorrow) = at.with_timezone(&tz).date_naive().succ_opt() else {
        return at + TimeDelta::days(1);
    };
    let naive = tomorrow.and_time(NaiveTime::MIN);

    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| {
            tz.from_local_datetime(&(naive + TimeDelta::hours(1)))
                .earliest()
        })
        .map_or_else(|| at + TimeDelta::days(1), |t| t.with_timezone(&Utc))
}

/// Time left from `at` until the next local midnight.
pub fn until_midnight(at: DateTime<Utc>, tz: Tz) -> TimeDelta {
    next_midnight(at, tz) - at
}

/// Restrict `value` to the optional `lower` and `upper` bounds.
pub fn clamp<T: PartialOrd>(value: T, lower: Option<T>, upper: Option<T>) -> T {
    let value = match lower {
        Some(lower) if value < lower => lower,
        _ => value,
    };
    match upper {
        Some(upper) if value > upper => upper,
        _ => value,
    }
}

/// Convert a signed delay into a sleepable duration; negative delays become zero.
pub fn delay_from(delta: TimeDelta) -> Duration {
    delta.to_std().unwrap_or(Duration::ZERO)
}

/// Same as [`delay_from`] for a raw millisecond count.
pub fn delay_from_millis(ms: i64) -> Duration {
    Duration::from_millis(u64::try_from(clamp(ms, Some(0), None)).unwrap_or(0))
}
