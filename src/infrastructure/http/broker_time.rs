//! Broker-local (EET/EEST) to UTC conversion (§6, §9). The wire format is
//! naive wall-clock broker time; every inbound timestamp is converted
//! exactly once, here, at ingress, before it ever reaches a domain type.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::EET;

/// Converts a naive broker-local timestamp to UTC using the IANA EET/EEST
/// rules (fixed UTC+2 would be wrong half the year, under EEST). DST-gap
/// times fall back to the post-gap instant; ambiguous fold-back times pick
/// the earlier (standard) offset — both are rare and neither is round-trip
/// critical for tick/trade timestamps.
pub fn to_utc(broker_local: NaiveDateTime) -> DateTime<Utc> {
    match EET.from_local_datetime(&broker_local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        LocalResult::None => Utc.from_utc_datetime(&broker_local),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn winter_time_converts_at_utc_plus_2() {
        let local = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let utc = to_utc(local);
        assert_eq!(utc.naive_utc(), NaiveDate::from_ymd_opt(2026, 1, 15).unwrap().and_hms_opt(10, 0, 0).unwrap());
    }

    #[test]
    fn summer_time_converts_at_utc_plus_3() {
        let local = NaiveDate::from_ymd_opt(2026, 7, 15).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let utc = to_utc(local);
        assert_eq!(utc.naive_utc(), NaiveDate::from_ymd_opt(2026, 7, 15).unwrap().and_hms_opt(9, 0, 0).unwrap());
    }
}
