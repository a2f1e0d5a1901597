use std::fmt::Display;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// A committer identity with a resolved UTC offset.
#[derive(Debug, Clone)]
pub struct Identity {
    name: String,
    email: String,
    when: i64,
    offset: String,
}

impl Identity {
    /// Constructs an identity whose timestamp renders in `zone`.
    ///
    /// `zone` may be a fixed `±HHMM` offset or an IANA zone name, which is
    /// resolved at the commit instant (so DST comes out right). A missing
    /// or unrecognized zone falls back to UTC.
    pub fn new(name: &str, email: &str, when: i64, zone: Option<&str>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
            offset: zone
                .map(|zone| utc_offset(zone, when))
                .unwrap_or_else(|| String::from("+0000")),
        }
    }
}

impl Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} <{}> {} {}",
            self.name, self.email, self.when, self.offset
        )
    }
}

fn utc_offset(zone: &str, when: i64) -> String {
    if is_fixed_offset(zone) {
        return zone.to_string();
    }
    if let Ok(tz) = zone.parse::<Tz>() {
        if let Some(time) = DateTime::<Utc>::from_timestamp(when, 0) {
            return time.with_timezone(&tz).format("%z").to_string();
        }
    }
    String::from("+0000")
}

fn is_fixed_offset(zone: &str) -> bool {
    let bytes = zone.as_bytes();
    bytes.len() == 5
        && (bytes[0] == b'+' || bytes[0] == b'-')
        && bytes[1..].iter().all(u8::is_ascii_digit)
}
