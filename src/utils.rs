use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Europe::London;

/// Rounds half away from zero to `decimals` places.
///
/// The scaled value is first snapped to 1e-6 so that binary noise such as
/// `1.005 * 100 = 100.49999999999999` still rounds the way a bill would.
pub fn round_half_away(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    let scaled = ((value * factor) * 1e6).round() / 1e6;
    scaled.round() / factor
}

/// Converts a pence amount to pounds rounded to the penny.
pub fn pence_to_pounds(pence: f64) -> f64 {
    round_half_away(pence / 100.0, 2)
}

/// Calendar day of an instant in UK local time.
pub fn london_day(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&London).date_naive()
}

/// The instant UK local midnight starts on `day`.
pub fn london_midnight(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(chrono::NaiveTime::MIN);
    London
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Billing month label of an instant, e.g. `Jan-24`.
pub fn month_label(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&London).format("%b-%y").to_string()
}

/// Linear extrapolation factor from `actual` samples up to `expected`.
/// Never scales down, and an empty series is left alone.
pub fn extrapolation_factor(expected: usize, actual: usize) -> f64 {
    if actual == 0 || actual >= expected {
        1.0
    } else {
        expected as f64 / actual as f64
    }
}
