use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

/// Format a timestamp as an RFC 1123 HTTP date, e.g.
/// `Fri, 29 Nov 2019 21:01:01 GMT`.
pub fn format_http_date(time: DateTime<Utc>) -> Bytes {
    Bytes::from(time.format("%a, %d %b %Y %H:%M:%S GMT").to_string())
}

/// Format a unix timestamp (seconds) as an RFC 1123 HTTP date.
pub fn format_http_date_from_unix(secs: i64) -> Bytes {
    match Utc.timestamp_opt(secs, 0).single() {
        Some(time) => format_http_date(time),
        None => Bytes::new(),
    }
}

/// The current time as an RFC 1123 HTTP date, for the `Date` header.
pub fn http_date_now() -> Bytes {
    format_http_date(Utc::now())
}
