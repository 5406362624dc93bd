//! Timestamps for validity windows.

use std::time::{Duration, SystemTime};

use der::asn1::{GeneralizedTime, UtcTime};
use der::DateTime;
use x509_cert::time::Time;

use crate::infra::error::{ForgeError, ForgeResult};

const SECONDS_PER_DAY: u64 = 86_400;

/// Current time truncated to whole seconds.
pub fn now() -> ForgeResult<DateTime> {
    DateTime::from_system_time(SystemTime::now())
        .map_err(|e| ForgeError::InvalidInput(format!("system time out of range: {e}")))
}

pub fn add_days(time: DateTime, days: u32) -> ForgeResult<DateTime> {
    let offset = Duration::from_secs(u64::from(days) * SECONDS_PER_DAY);
    DateTime::from_unix_duration(time.unix_duration() + offset)
        .map_err(|e| ForgeError::InvalidInput(format!("{time} + {days} days: {e}")))
}

/// RFC 5280 time: UTCTime through 2049, GeneralizedTime from 2050.
pub fn x509_time(time: DateTime) -> ForgeResult<Time> {
    if time.year() < 2050 {
        Ok(Time::UtcTime(
            UtcTime::from_date_time(time).map_err(ForgeError::encode)?,
        ))
    } else {
        Ok(Time::GeneralTime(GeneralizedTime::from_date_time(time)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utc_time_switches_at_2050() {
        let t = DateTime::new(2049, 12, 31, 23, 59, 59).unwrap();
        assert!(matches!(x509_time(t).unwrap(), Time::UtcTime(_)));
        let t = add_days(t, 1).unwrap();
        assert_eq!(t.year(), 2050);
        assert!(matches!(x509_time(t).unwrap(), Time::GeneralTime(_)));
    }
}
