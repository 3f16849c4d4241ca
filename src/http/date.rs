//! RFC 1123 dates for `Last-Modified`.
//!
//! `Sun, 06 Nov 1994 08:49:37 GMT` is the only layout produced.

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::http::response::ResponseBuffer;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

/// Appends `secs` (seconds since the Unix epoch) as an RFC 1123 date.
///
/// Instants chrono cannot represent are written as the epoch.
pub fn append_http_date(response: &mut ResponseBuffer, secs: i64) {
    let t = DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default();

    response.append_str(WEEKDAYS[t.weekday().num_days_from_sunday() as usize]);
    response.append_str(", ");
    response.append_uint_padded(u64::from(t.day()), 2);
    response.append_str(" ");
    response.append_str(MONTHS[t.month0() as usize]);
    response.append_str(" ");
    response.append_uint_padded(t.year().max(0) as u64, 4);
    response.append_str(" ");
    response.append_uint_padded(u64::from(t.hour()), 2);
    response.append_str(":");
    response.append_uint_padded(u64::from(t.minute()), 2);
    response.append_str(":");
    response.append_uint_padded(u64::from(t.second()), 2);
    response.append_str(" GMT");
}
