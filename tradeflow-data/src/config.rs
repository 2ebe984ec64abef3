//! Environment-driven service configuration.
//!
//! Mandatory notifier credentials fail fast at startup; everything else has
//! a production default that an environment variable overrides.

use crate::error::ConfigError;
use chrono::{Duration as ChronoDuration, NaiveTime};
use chrono_tz::Tz;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

/// Which source the aggregation pass reads from. Selected once at startup,
/// never mixed mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSource {
    Memory,
    Store,
}

impl FromStr for ReportSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(ReportSource::Memory),
            "store" => Ok(ReportSource::Store),
            other => Err(format!("unknown report source: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub sender: String,
    pub recipients: Vec<String>,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub symbol: String,
    pub ws_url: String,
    pub timezone: Tz,
    pub report_times: Vec<NaiveTime>,
    pub retention: ChronoDuration,
    pub stall_threshold: Duration,
    pub watchdog_tick: Duration,
    pub heartbeat_tick: Duration,
    pub reconnect_delay: Duration,
    pub ping_interval: Duration,
    pub health_port: u16,
    pub smtp: SmtpConfig,
    pub db_path: Option<PathBuf>,
    pub report_source: ReportSource,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let smtp = SmtpConfig {
            host: optional("SMTP_HOST", "smtp.gmail.com".to_string())?,
            sender: required("EMAIL_SENDER")?,
            recipients: parse_recipients(&required("EMAIL_RECIPIENTS")?)?,
            password: required("EMAIL_PASSWORD")?,
        };

        let db_path = env::var("TRADE_DB_PATH").ok().map(PathBuf::from);
        let report_source: ReportSource = optional("REPORT_SOURCE", ReportSource::Memory)?;
        if report_source == ReportSource::Store && db_path.is_none() {
            return Err(ConfigError::Invalid {
                name: "REPORT_SOURCE",
                value: "store requires TRADE_DB_PATH".to_string(),
            });
        }

        Ok(Self {
            symbol: optional("SYMBOL", "MONUSDT".to_string())?,
            ws_url: optional("WS_URL", "wss://stream.bybit.com/v5/public/spot".to_string())?,
            timezone: optional("TIMEZONE", chrono_tz::Asia::Kuala_Lumpur)?,
            report_times: parse_report_times(&optional("REPORT_TIMES", "06:00,18:00".to_string())?)?,
            retention: ChronoDuration::hours(optional("RETENTION_HOURS", 24i64)?),
            stall_threshold: Duration::from_secs(optional("STALL_THRESHOLD_SECS", 300u64)?),
            watchdog_tick: Duration::from_secs(optional("WATCHDOG_TICK_SECS", 60u64)?),
            heartbeat_tick: Duration::from_secs(optional("HEARTBEAT_TICK_SECS", 60u64)?),
            reconnect_delay: Duration::from_secs(optional("RECONNECT_DELAY_SECS", 5u64)?),
            ping_interval: Duration::from_secs(optional("PING_INTERVAL_SECS", 20u64)?),
            health_port: optional("PORT", 8080u16)?,
            smtp,
            db_path,
            report_source,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// Unset falls back to the default; a set-but-unparseable value is a startup
/// error rather than a silent fallback.
fn optional<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.parse::<T>().map_err(|_| ConfigError::Invalid {
            name,
            value,
        }),
        Err(_) => Ok(default),
    }
}

pub fn parse_recipients(raw: &str) -> Result<Vec<String>, ConfigError> {
    let recipients: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    if recipients.is_empty() {
        return Err(ConfigError::Invalid {
            name: "EMAIL_RECIPIENTS",
            value: raw.to_string(),
        });
    }
    Ok(recipients)
}

pub fn parse_report_times(raw: &str) -> Result<Vec<NaiveTime>, ConfigError> {
    let times: Vec<NaiveTime> = raw
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            NaiveTime::parse_from_str(t, "%H:%M").map_err(|_| ConfigError::Invalid {
                name: "REPORT_TIMES",
                value: t.to_string(),
            })
        })
        .collect::<Result<_, _>>()?;
    if times.is_empty() {
        return Err(ConfigError::Invalid {
            name: "REPORT_TIMES",
            value: raw.to_string(),
        });
    }
    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients_list() {
        let recipients = parse_recipients("a@example.com, b@example.com,c@example.com").unwrap();
        assert_eq!(
            recipients,
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }

    #[test]
    fn test_parse_recipients_rejects_empty() {
        assert!(parse_recipients("").is_err());
        assert!(parse_recipients(" , ").is_err());
    }

    #[test]
    fn test_parse_report_times() {
        let times = parse_report_times("06:00,18:00").unwrap();
        assert_eq!(
            times,
            vec![
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            ]
        );
    }

    #[test]
    fn test_parse_report_times_rejects_garbage() {
        assert!(parse_report_times("6pm").is_err());
        assert!(parse_report_times("").is_err());
    }

    #[test]
    fn test_report_source_parsing() {
        assert_eq!("memory".parse::<ReportSource>().unwrap(), ReportSource::Memory);
        assert_eq!("Store".parse::<ReportSource>().unwrap(), ReportSource::Store);
        assert!("both".parse::<ReportSource>().is_err());
    }
}
