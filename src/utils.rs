use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;

/// Calendar date of `now` in the operating timezone.
pub fn today_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

pub fn yesterday_in(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    let today = today_in(tz, now);
    today.pred_opt().unwrap_or(today)
}

/// Strict `YYYY-MM-DD`; rejects short forms like `2024-1-5` that chrono would accept.
pub fn parse_ymd(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    let well_shaped = s.len() == 10
        && s.bytes()
            .enumerate()
            .all(|(i, b)| if i == 4 || i == 7 { b == b'-' } else { b.is_ascii_digit() });
    if !well_shaped {
        return Err(format!("{:?} is not a YYYY-MM-DD date", s));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("{:?} is not a calendar date: {}", s, e))
}

/// Every date in `[start, end]`; empty when `start > end`.
pub fn dates_inclusive(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}
