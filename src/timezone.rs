//! Resolves "today" for the configured timezone.

use time::{Date, OffsetDateTime, UtcOffset};
use time_tz::{Offset, TimeZone};

use crate::Error;

/// The current UTC offset of `canonical_timezone`, e.g. "America/Argentina/Buenos_Aires",
/// or `None` if the name is not known.
pub fn get_local_offset(canonical_timezone: &str) -> Option<UtcOffset> {
    offset_at(canonical_timezone, OffsetDateTime::now_utc())
}

/// The UTC offset of `canonical_timezone` at the instant `at`.
pub fn offset_at(canonical_timezone: &str, at: OffsetDateTime) -> Option<UtcOffset> {
    time_tz::timezones::get_by_name(canonical_timezone)
        .map(|tz| tz.get_offset_utc(&at).to_utc())
}

/// Resolve an optional timezone name to its current UTC offset. No timezone
/// means UTC.
///
/// # Errors
/// Returns an [Error::InvalidTimezoneError] if the name is not a canonical
/// timezone.
pub fn resolve_offset(timezone: Option<&str>, at: OffsetDateTime) -> Result<UtcOffset, Error> {
    match timezone {
        None => Ok(UtcOffset::UTC),
        Some(name) => {
            offset_at(name, at).ok_or_else(|| Error::InvalidTimezoneError(name.to_owned()))
        }
    }
}

/// Today's date in `timezone`, or in UTC if no timezone is given.
///
/// # Errors
/// Returns an [Error::InvalidTimezoneError] if the name is not a canonical
/// timezone.
pub fn local_today(timezone: Option<&str>) -> Result<Date, Error> {
    let now = OffsetDateTime::now_utc();
    let offset = resolve_offset(timezone, now)?;

    Ok(now.to_offset(offset).date())
}

#[cfg(test)]
mod timezone_tests {
    use time::{UtcOffset, macros::datetime};

    use crate::Error;

    use super::{get_local_offset, local_today, offset_at, resolve_offset};

    #[test]
    fn known_timezone_has_offset() {
        assert!(get_local_offset("Pacific/Auckland").is_some());
        assert_eq!(get_local_offset("Etc/UTC"), Some(UtcOffset::UTC));
    }

    #[test]
    fn unknown_timezone_has_no_offset() {
        assert_eq!(get_local_offset("Mars/Olympus_Mons"), None);
    }

    #[test]
    fn offset_follows_daylight_saving() {
        let winter = offset_at("Europe/Berlin", datetime!(2024-01-15 12:00 UTC));
        let summer = offset_at("Europe/Berlin", datetime!(2024-07-15 12:00 UTC));

        assert_eq!(winter, UtcOffset::from_hms(1, 0, 0).ok());
        assert_eq!(summer, UtcOffset::from_hms(2, 0, 0).ok());
    }

    #[test]
    fn missing_timezone_is_utc() {
        assert_eq!(
            resolve_offset(None, datetime!(2024-01-15 12:00 UTC)),
            Ok(UtcOffset::UTC)
        );
    }

    #[test]
    fn local_today_rejects_unknown_timezone() {
        assert_eq!(
            local_today(Some("Not/AZone")),
            Err(Error::InvalidTimezoneError("Not/AZone".to_owned()))
        );
    }

    #[test]
    fn local_today_in_utc_matches_clock() {
        let want = time::OffsetDateTime::now_utc().date();

        let got = local_today(None).unwrap();

        // The date may roll over between the two calls.
        assert!(got == want || got == want.next_day().unwrap());
    }
}
