//! Calendar formatting of epoch timestamps for the menu.

use core::fmt;

/// Broken-down civil time, no leap seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub year: u32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DateTime {
    /// Convert epoch seconds shifted by `utc_offset_s` into local civil time.
    ///
    /// Instants before 1970 after applying the offset clamp to the epoch.
    pub fn from_epoch(epoch_s: u64, utc_offset_s: i32) -> Self {
        let secs = (epoch_s as i64 + i64::from(utc_offset_s)).max(0) as u64;

        let second = (secs % 60) as u8;
        let minute = (secs / 60 % 60) as u8;
        let hour = (secs / 3600 % 24) as u8;

        let mut days = secs / 86_400;
        let mut year = 1970u32;
        loop {
            let days_in_year = if is_leap(year) { 366 } else { 365 };
            if days < days_in_year {
                break;
            }
            days -= days_in_year;
            year += 1;
        }

        let month_days: [u64; 12] = if is_leap(year) {
            [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
        } else {
            [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31]
        };
        let mut month = 1u8;
        for &length in &month_days {
            if days < length {
                break;
            }
            days -= length;
            month += 1;
        }

        Self {
            year,
            month,
            day: days as u8 + 1,
            hour,
            minute,
            second,
        }
    }
}

/// `YYYY/MM/DD hh:mm:ss`
impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}/{:02}/{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

fn is_leap(year: u32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
