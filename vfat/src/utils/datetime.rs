//! FAT timestamp encoding
//!
//! FAT packs timestamps into 16-bit words: a time word with 2-second
//! resolution and a date word counting years from 1980. Modification
//! times are encoded in local time because guest applications interpret
//! them that way; access dates carry no time-of-day field and are
//! encoded from UTC. The asymmetry is inherited behavior and is kept
//! as observed.

/// Broken-down time fields as (time word, date word)
fn fat_fields(stamp: i64, utc: bool) -> (u16, u16) {
    let stamp = stamp as libc::time_t;
    let mut parts: libc::tm = unsafe { core::mem::zeroed() };
    unsafe {
        if utc {
            libc::gmtime_r(&stamp, &mut parts);
        } else {
            libc::localtime_r(&stamp, &mut parts);
        }
    }

    let time = (parts.tm_sec as u16 / 2)
        | ((parts.tm_min as u16) << 5)
        | ((parts.tm_hour as u16) << 11);
    // tm years count from 1900, FAT dates from 1980. FAT cannot
    // represent earlier dates, so those saturate at 1980.
    let year = (parts.tm_year - 80).max(0) as u16;
    let date = (parts.tm_mday as u16) | ((parts.tm_mon as u16 + 1) << 5) | (year << 9);
    (time, date)
}

/// Encode `stamp` as a little-endian FAT time and date pair, in local
/// time (4 bytes).
pub fn encode_datetime(buf: &mut [u8], stamp: i64) {
    let (time, date) = fat_fields(stamp, false);
    buf[0..2].copy_from_slice(&time.to_le_bytes());
    buf[2..4].copy_from_slice(&date.to_le_bytes());
}

/// Encode the date part of `stamp` in UTC (2 bytes). Access dates store
/// no time of day.
pub fn encode_date(buf: &mut [u8], stamp: i64) {
    let (_, date) = fat_fields(stamp, true);
    buf[0..2].copy_from_slice(&date.to_le_bytes());
}
