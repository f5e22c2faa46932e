use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MS_PER_HOUR: i64 = 3_600_000;

/// Sampling frequency of a price frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frequency {
    OneHour,
    OneDay,
    OneWeek,
}

impl Frequency {
    /// Duration of one bar in milliseconds
    pub fn to_millis(&self) -> i64 {
        match self {
            Frequency::OneHour => MS_PER_HOUR,
            Frequency::OneDay => 24 * MS_PER_HOUR,
            Frequency::OneWeek => 7 * 24 * MS_PER_HOUR,
        }
    }

    /// Converts to Binance API interval string
    pub fn to_binance_string(&self) -> &'static str {
        match self {
            Frequency::OneHour => "1h",
            Frequency::OneDay => "1d",
            Frequency::OneWeek => "1w",
        }
    }

    /// Timestamp (ms) at which the bar opened at `open_ms` has closed.
    pub fn close_time(&self, open_ms: i64) -> i64 {
        open_ms + self.to_millis()
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_binance_string())
    }
}

impl FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "1h" | "hourly" => Ok(Frequency::OneHour),
            "1d" | "daily" => Ok(Frequency::OneDay),
            "1w" | "1wk" | "weekly" => Ok(Frequency::OneWeek),
            _ => Err(anyhow!(
                "Invalid frequency: {}. Must be one of: 1h, 1d, 1w",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str() {
        assert_eq!(Frequency::from_str("1d").unwrap(), Frequency::OneDay);
        assert_eq!(Frequency::from_str("1wk").unwrap(), Frequency::OneWeek);
        assert_eq!(Frequency::from_str("HOURLY").unwrap(), Frequency::OneHour);
        assert!(Frequency::from_str("5m").is_err());
    }

    #[test]
    fn test_close_time() {
        assert_eq!(Frequency::OneDay.close_time(0), 86_400_000);
    }
}
