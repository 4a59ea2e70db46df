//! Datong 5-byte bitpacked timestamp codec.
//!
//! Bit layout (confirmed against the reference encoder/decoder):
//!
//! ```text
//! byte 0: DDDDD MMM   (day: 5 bits, high 3 bits of month)
//! byte 1: M YYYYYYY   (low bit of month, year offset from 1980: 7 bits)
//! byte 2: HHHHH MMM   (hour: 5 bits, high 3 bits of minute)
//! byte 3: MMM SSSSS   (low 3 bits of minute, high 5 bits of second)
//! byte 4: S xxxxxxx   (low bit of second, 7 unused bits)
//! ```
//!
//! Decoding an invalid date (month/day/hour/minute/second combination that
//! does not form a real calendar date) degrades to the epoch
//! (1980-01-01T00:00:00Z) rather than failing the parse, matching the
//! reference behavior exactly.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};

/// The fallback timestamp used when a Datong field decodes to an invalid
/// calendar date.
#[must_use]
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(1980, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_nanos(0))
}

/// Decodes a 5-byte Datong timestamp.
///
/// Never fails: an out-of-range date degrades to [`epoch`].
#[must_use]
pub fn decode(ts: &[u8; 5]) -> DateTime<Utc> {
    let day = u32::from((ts[0] >> 3) & 0x1F);
    let month = u32::from(((ts[0] & 0x07) << 1) | ((ts[1] >> 7) & 0x01));
    let year = i32::from(ts[1] & 0x7F) + 1980;

    let hour = u32::from((ts[2] >> 3) & 0x1F);
    let minute = u32::from(((ts[2] & 0x07) << 3) | ((ts[3] >> 5) & 0x07));
    let second = u32::from(((ts[3] & 0x1F) << 1) | ((ts[4] >> 7) & 0x01));

    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
        .unwrap_or_else(epoch)
}

/// Encodes a timestamp into its 5-byte Datong representation.
///
/// Only the year, month, day, hour, minute and second components are
/// encoded; sub-second precision is discarded. Years before 1980 or after
/// 2107 (the 7-bit year offset's range) saturate at the nearest representable
/// boundary rather than panicking or wrapping silently into an unrelated
/// date.
#[must_use]
pub fn encode(dt: DateTime<Utc>) -> [u8; 5] {
    let year_offset = (dt.year() - 1980).clamp(0, 0x7F) as u8;
    let month = dt.month() as u8;
    let day = dt.day() as u8;
    let hour = dt.hour() as u8;
    let minute = dt.minute() as u8;
    let second = dt.second().min(59) as u8;

    let mut ts = [0u8; 5];
    ts[0] = (day << 3) | ((month >> 1) & 0x07);
    ts[1] = year_offset | ((month & 0x01) << 7);
    ts[2] = (hour << 3) | ((minute >> 3) & 0x07);
    ts[3] = ((minute & 0x07) << 5) | ((second >> 1) & 0x1F);
    ts[4] = (second & 0x01) << 7;
    ts
}
