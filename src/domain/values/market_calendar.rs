//! Korea Exchange session boundaries and business-day arithmetic.
//!
//! All wall-clock reasoning happens in KST (UTC+9, no daylight saving).

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Offset, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

const KST_OFFSET_SECS: i32 = 9 * 3600;

const PRE_MARKET_START: u32 = 8 * 60 + 30;
const MARKET_OPEN: u32 = 9 * 60;
const MARKET_CLOSE: u32 = 15 * 60 + 30;
const POST_MARKET_END: u32 = 18 * 60;

/// KRX closures for 2025 (besides weekends).
const HOLIDAYS_2025: &[(u32, u32)] = &[
    (1, 1),
    (1, 28),
    (1, 29),
    (1, 30),
    (3, 1),
    (3, 3),
    (5, 5),
    (5, 6),
    (6, 6),
    (8, 15),
    (9, 6),
    (9, 7),
    (9, 8),
    (9, 9),
    (10, 3),
    (10, 9),
    (12, 25),
];

/// KRX closures for 2026, substitute holidays and the local election day included.
const HOLIDAYS_2026: &[(u32, u32)] = &[
    (1, 1),
    (2, 16),
    (2, 17),
    (2, 18),
    (3, 2),
    (5, 1),
    (5, 5),
    (5, 25),
    (6, 3),
    (8, 17),
    (9, 24),
    (9, 25),
    (10, 5),
    (10, 9),
    (12, 25),
    (12, 31),
];

fn holidays_for(year: i32) -> &'static [(u32, u32)] {
    match year {
        2025 => HOLIDAYS_2025,
        2026 => HOLIDAYS_2026,
        _ => &[],
    }
}

pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

pub fn to_kst(dt: DateTime<Utc>) -> DateTime<FixedOffset> {
    dt.with_timezone(&kst())
}

pub fn kst_now() -> DateTime<FixedOffset> {
    to_kst(Utc::now())
}

/// Calendar date in KST of a UTC instant.
pub fn kst_date(dt: DateTime<Utc>) -> NaiveDate {
    to_kst(dt).date_naive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketStatus {
    PreMarket,
    Market,
    PostMarket,
    Closed,
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketStatus::PreMarket => write!(f, "pre_market"),
            MarketStatus::Market => write!(f, "market"),
            MarketStatus::PostMarket => write!(f, "post_market"),
            MarketStatus::Closed => write!(f, "closed"),
        }
    }
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Session for a KST time of day. Boundaries are half-open: `[08:30, 09:00)` is
/// pre-market, `[09:00, 15:30)` market, `[15:30, 18:00)` post-market.
pub fn market_status(time: NaiveTime) -> MarketStatus {
    let m = minute_of_day(time);
    if (MARKET_OPEN..MARKET_CLOSE).contains(&m) {
        MarketStatus::Market
    } else if (PRE_MARKET_START..MARKET_OPEN).contains(&m) {
        MarketStatus::PreMarket
    } else if (MARKET_CLOSE..POST_MARKET_END).contains(&m) {
        MarketStatus::PostMarket
    } else {
        MarketStatus::Closed
    }
}

/// Session for a UTC instant; weekends and holidays are always closed.
pub fn session_at(now: DateTime<Utc>) -> MarketStatus {
    let local = to_kst(now);
    if !is_trading_day(local.date_naive()) {
        return MarketStatus::Closed;
    }
    market_status(local.time())
}

pub fn is_holiday(date: NaiveDate) -> bool {
    holidays_for(date.year()).contains(&(date.month(), date.day()))
}

pub fn is_trading_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !is_holiday(date)
}

/// Regular session only: trading day and `[09:00, 15:30)` KST.
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    session_at(now) == MarketStatus::Market
}

/// Moves `days` business days from `date` (negative moves backwards).
/// `date` itself does not need to be a business day.
pub fn add_business_days(date: NaiveDate, days: i64) -> NaiveDate {
    let step = if days >= 0 { 1 } else { -1 };
    let mut remaining = days.abs();
    let mut current = date;
    while remaining > 0 {
        current += Duration::days(step);
        if is_trading_day(current) {
            remaining -= 1;
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_status_boundaries() {
        assert_eq!(market_status(t(8, 0)), MarketStatus::Closed);
        assert_eq!(market_status(t(8, 30)), MarketStatus::PreMarket);
        assert_eq!(market_status(t(8, 45)), MarketStatus::PreMarket);
        assert_eq!(market_status(t(9, 0)), MarketStatus::Market);
        assert_eq!(market_status(t(15, 29)), MarketStatus::Market);
        assert_eq!(market_status(t(15, 30)), MarketStatus::PostMarket);
        assert_eq!(market_status(t(17, 59)), MarketStatus::PostMarket);
        assert_eq!(market_status(t(18, 0)), MarketStatus::Closed);
        assert_eq!(market_status(t(23, 0)), MarketStatus::Closed);
    }

    #[test]
    fn test_weekend_is_closed() {
        // 2025-11-01 is a Saturday; 10:00 KST == 01:00 UTC
        let sat = DateTime::parse_from_rfc3339("2025-11-01T10:00:00+09:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(session_at(sat), MarketStatus::Closed);
        let mon = DateTime::parse_from_rfc3339("2025-11-03T10:00:00+09:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(session_at(mon), MarketStatus::Market);
        assert!(is_market_open(mon));
    }

    #[test]
    fn test_business_days_skip_weekend_and_holiday() {
        let fri = NaiveDate::from_ymd_opt(2025, 10, 31).unwrap();
        assert_eq!(add_business_days(fri, 1), NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
        // 2025-10-03 (Fri) is a holiday: Thu 10-02 + 1 => Mon 10-06
        let thu = NaiveDate::from_ymd_opt(2025, 10, 2).unwrap();
        assert_eq!(add_business_days(thu, 1), NaiveDate::from_ymd_opt(2025, 10, 6).unwrap());
        assert_eq!(add_business_days(fri, -5), NaiveDate::from_ymd_opt(2025, 10, 24).unwrap());
        assert_eq!(add_business_days(fri, 0), fri);
    }

    #[test]
    fn test_2026_chuseok_is_closed() {
        let chuseok = DateTime::parse_from_rfc3339("2026-09-25T10:00:00+09:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(session_at(chuseok), MarketStatus::Closed);
        assert!(!is_market_open(chuseok));
        // Wed 09-23 + 1 skips Thu/Fri Chuseok and the weekend
        let wed = NaiveDate::from_ymd_opt(2026, 9, 23).unwrap();
        assert_eq!(add_business_days(wed, 1), NaiveDate::from_ymd_opt(2026, 9, 28).unwrap());
        assert!(!is_trading_day(NaiveDate::from_ymd_opt(2026, 10, 5).unwrap()));
    }

    #[test]
    fn test_kst_date_crosses_midnight() {
        let utc = DateTime::parse_from_rfc3339("2025-11-02T16:30:00Z").unwrap().with_timezone(&Utc);
        assert_eq!(kst_date(utc), NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
    }
}
