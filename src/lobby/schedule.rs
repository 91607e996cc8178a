//! Start-time parsing and resolution
//!
//! A lobby starts either "now" or at a 12-hour wall-clock time. Wall-clock
//! times resolve to their next occurrence: a time at or before the current
//! instant moves to tomorrow, never further.

use crate::error::CommandError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::fmt;

/// Requested start, before resolution against the clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartSpec {
    Now,
    /// 24-hour clock time of day
    At { hour: u32, minute: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
}

impl StartSpec {
    /// Parse `now` (any case) or `h:mm AM|PM`, with or without the space
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("now") {
            return Ok(StartSpec::Now);
        }

        let (hour_part, rest) = input.split_once(':').ok_or(CommandError::InvalidTime)?;
        let minute_len = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        let (minute_part, meridiem_part) = rest.split_at(minute_len);

        if hour_part.is_empty()
            || !hour_part.chars().all(|c| c.is_ascii_digit())
            || minute_part.len() != 2
        {
            return Err(CommandError::InvalidTime);
        }

        let hour: u32 = hour_part.parse().map_err(|_| CommandError::InvalidTime)?;
        let minute: u32 = minute_part.parse().map_err(|_| CommandError::InvalidTime)?;

        let meridiem = match meridiem_part.trim_start().to_ascii_uppercase().as_str() {
            "AM" => Meridiem::Am,
            "PM" => Meridiem::Pm,
            _ => return Err(CommandError::InvalidTime),
        };

        if !(1..=12).contains(&hour) || minute > 59 {
            return Err(CommandError::InvalidTime);
        }

        let hour = match (meridiem, hour) {
            (Meridiem::Am, 12) => 0,
            (Meridiem::Am, h) => h,
            (Meridiem::Pm, 12) => 12,
            (Meridiem::Pm, h) => h + 12,
        };

        Ok(StartSpec::At { hour, minute })
    }

    /// Resolve to a concrete instant relative to `now`
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<Utc>, CommandError> {
        match *self {
            StartSpec::Now => Ok(now.with_timezone(&Utc)),
            StartSpec::At { hour, minute } => {
                let today = now.date_naive();
                let candidate = localize(&now.timezone(), at(today, hour, minute)?)
                    .ok_or(CommandError::InvalidTime)?;

                if candidate > *now {
                    return Ok(candidate.with_timezone(&Utc));
                }

                let tomorrow = today.succ_opt().ok_or(CommandError::InvalidTime)?;
                localize(&now.timezone(), at(tomorrow, hour, minute)?)
                    .map(|dt| dt.with_timezone(&Utc))
                    .ok_or(CommandError::InvalidTime)
            }
        }
    }
}

impl fmt::Display for StartSpec {
    /// Announcement wording: `now` or `at 3:05 PM`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StartSpec::Now => write!(f, "now"),
            StartSpec::At { hour, minute } => {
                let period = if hour < 12 { "AM" } else { "PM" };
                let display_hour = match hour % 12 {
                    0 => 12,
                    h => h,
                };
                write!(f, "at {}:{:02} {}", display_hour, minute, period)
            }
        }
    }
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Result<NaiveDateTime, CommandError> {
    date.and_hms_opt(hour, minute, 0)
        .ok_or(CommandError::InvalidTime)
}

/// Map a wall-clock time into the zone; times skipped by a DST jump move forward an hour
fn localize<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Timelike};
    use proptest::prelude::*;

    fn local(h: u32, m: u32) -> DateTime<FixedOffset> {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 14, h, m, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_now_any_case() {
        assert_eq!(StartSpec::parse("now").unwrap(), StartSpec::Now);
        assert_eq!(StartSpec::parse("NoW").unwrap(), StartSpec::Now);
    }

    #[test]
    fn test_parse_meridiem_mapping() {
        assert_eq!(
            StartSpec::parse("12:00 AM").unwrap(),
            StartSpec::At { hour: 0, minute: 0 }
        );
        assert_eq!(
            StartSpec::parse("12:30PM").unwrap(),
            StartSpec::At {
                hour: 12,
                minute: 30
            }
        );
        assert_eq!(
            StartSpec::parse("3:05 pm").unwrap(),
            StartSpec::At {
                hour: 15,
                minute: 5
            }
        );
        assert_eq!(
            StartSpec::parse("11:59am").unwrap(),
            StartSpec::At {
                hour: 11,
                minute: 59
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for input in [
            "", "later", "3pm", "3:00", "13:00 PM", "0:30 AM", "3:60 PM", "3:5 PM", ":30 PM",
            "3:00 XM", "3:00 PM extra",
        ] {
            assert_eq!(
                StartSpec::parse(input),
                Err(CommandError::InvalidTime),
                "input {:?}",
                input
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(StartSpec::Now.to_string(), "now");
        assert_eq!(StartSpec::parse("12:00 PM").unwrap().to_string(), "at 12:00 PM");
        assert_eq!(StartSpec::parse("12:07 AM").unwrap().to_string(), "at 12:07 AM");
        assert_eq!(StartSpec::parse("9:30 pm").unwrap().to_string(), "at 9:30 PM");
    }

    #[test]
    fn test_now_resolves_to_current_instant() {
        let now = local(14, 0);
        assert_eq!(
            StartSpec::Now.resolve(&now).unwrap(),
            now.with_timezone(&Utc)
        );
    }

    #[test]
    fn test_past_time_rolls_to_tomorrow() {
        // 1:00 AM requested at 2:00 AM
        let now = local(2, 0);
        let resolved = StartSpec::parse("1:00 AM").unwrap().resolve(&now).unwrap();
        assert_eq!(resolved, (local(1, 0) + Duration::days(1)).with_timezone(&Utc));
    }

    #[test]
    fn test_future_time_stays_today() {
        // 3:00 PM requested at 1:00 PM
        let now = local(13, 0);
        let resolved = StartSpec::parse("3:00 PM").unwrap().resolve(&now).unwrap();
        assert_eq!(resolved, local(15, 0).with_timezone(&Utc));
    }

    #[test]
    fn test_exact_current_time_rolls_to_tomorrow() {
        let now = local(15, 0);
        let resolved = StartSpec::parse("3:00 PM").unwrap().resolve(&now).unwrap();
        assert_eq!(resolved, (local(15, 0) + Duration::days(1)).with_timezone(&Utc));
    }

    proptest! {
        #[test]
        fn prop_resolution_is_within_one_day(
            now_h in 0u32..24,
            now_m in 0u32..60,
            hour in 1u32..=12,
            minute in 0u32..60,
            pm in any::<bool>(),
        ) {
            let now = local(now_h, now_m);
            let input = format!("{}:{:02} {}", hour, minute, if pm { "PM" } else { "AM" });
            let resolved = StartSpec::parse(&input).unwrap().resolve(&now).unwrap();
            let now_utc = now.with_timezone(&Utc);

            prop_assert!(resolved > now_utc);
            prop_assert!(resolved <= now_utc + Duration::days(1));

            let resolved_local = resolved.with_timezone(now.offset());
            prop_assert_eq!(resolved_local.minute(), minute);
            prop_assert_eq!(resolved_local.hour() % 12, hour % 12);
        }
    }
}
