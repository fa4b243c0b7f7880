//! Interlayer periods
//!
//! A git artifact is split into an archive layer and incremental patch layers.
//! The interlayer period is how old the archive may get before it is rebuilt
//! from scratch instead of stacking another patch on top.

use std::fmt;
use std::str::FromStr;

const SECONDS_PER_DAY: u64 = 60 * 60 * 24;

/// Symbolic rebuild cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Day,
    Week,
    /// Seven weeks, not a calendar month.
    Month,
}

impl Period {
    /// Length of the period in seconds.
    pub fn seconds(self) -> u64 {
        match self {
            Period::Day => SECONDS_PER_DAY,
            Period::Week => Period::Day.seconds() * 7,
            Period::Month => Period::Week.seconds() * 7,
        }
    }
}

impl FromStr for Period {
    type Err = UnknownPeriod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Period::Day),
            "week" => Ok(Period::Week),
            "month" => Ok(Period::Month),
            other => Err(UnknownPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        };
        f.write_str(name)
    }
}

/// Symbol that does not name a [`Period`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown interlayer period '{0}'")]
pub struct UnknownPeriod(pub String);

/// Seconds for a symbolic period, `None` when the symbol is not recognised.
///
/// `None` means no throttling applies.
pub fn interlayer_period(symbol: &str) -> Option<u64> {
    symbol.parse::<Period>().ok().map(Period::seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_is_86400_seconds() {
        assert_eq!(interlayer_period("day"), Some(86_400));
    }

    #[test]
    fn periods_compose() {
        let day = interlayer_period("day").unwrap();
        let week = interlayer_period("week").unwrap();
        let month = interlayer_period("month").unwrap();

        assert_eq!(week, day * 7);
        assert_eq!(month, week * 7);
        assert_eq!(month, 49 * 86_400);
    }

    #[test]
    fn unknown_symbol_is_absent() {
        assert_eq!(interlayer_period("fortnight"), None);
        assert_eq!(interlayer_period(""), None);
        assert_eq!(interlayer_period("Week"), None);
    }

    #[test]
    fn parse_and_display() {
        assert_eq!("month".parse::<Period>().unwrap(), Period::Month);
        assert_eq!(Period::Week.to_string(), "week");
        assert_eq!(
            "year".parse::<Period>(),
            Err(UnknownPeriod("year".to_string()))
        );
    }
}
