use std::env;
use std::str::FromStr;
use std::time::Duration;

use mission::{MissionParams, TerminalAction};

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_EVENTS_URL: &str = "ws://127.0.0.1:8000/ws/ai_analysis";

/// Station settings, read from `GCS_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub backend_url: String,
    pub events_url: String,
    pub poll_interval: Duration,
    pub event_feed_cap: usize,
    pub cruise_speed_m_s: f64,
    pub terminal_action: TerminalAction,
    pub sensor_width_m: f64,
    pub overlap: f64,
    pub coverage_altitude_m: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            events_url: DEFAULT_EVENTS_URL.to_string(),
            poll_interval: Duration::from_millis(1000),
            event_feed_cap: 200,
            cruise_speed_m_s: mission::DEFAULT_CRUISE_SPEED_M_S,
            terminal_action: TerminalAction::Rtl,
            sensor_width_m: 30.0,
            overlap: 0.2,
            coverage_altitude_m: 30.0,
        }
    }
}

impl StationConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unset or unparsable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let d = Self::default();
        Self {
            backend_url: lookup("GCS_BACKEND_URL").unwrap_or(d.backend_url),
            events_url: lookup("GCS_EVENTS_URL").unwrap_or(d.events_url),
            poll_interval: Duration::from_millis(env_var_u64(
                &lookup,
                "GCS_POLL_INTERVAL_MS",
                d.poll_interval.as_millis() as u64,
            )),
            event_feed_cap: env_var_usize(&lookup, "GCS_EVENT_FEED_CAP", d.event_feed_cap),
            cruise_speed_m_s: env_var_f64(&lookup, "GCS_CRUISE_SPEED", d.cruise_speed_m_s),
            terminal_action: env_var_parsed(&lookup, "GCS_TERMINAL_ACTION", d.terminal_action),
            sensor_width_m: env_var_f64(&lookup, "GCS_SENSOR_WIDTH_M", d.sensor_width_m),
            overlap: env_var_f64(&lookup, "GCS_OVERLAP", d.overlap),
            coverage_altitude_m: env_var_f64(
                &lookup,
                "GCS_COVERAGE_ALTITUDE_M",
                d.coverage_altitude_m,
            ),
        }
    }

    pub fn mission_params(&self) -> MissionParams {
        MissionParams {
            cruise_speed_m_s: self.cruise_speed_m_s,
            terminal_action: self.terminal_action,
            ..MissionParams::default()
        }
    }
}

fn env_var_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn env_var_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    env_var_parsed(lookup, key, default)
}

fn env_var_usize(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    env_var_parsed(lookup, key, default)
}

fn env_var_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::StationConfig;
    use mission::TerminalAction;
    use std::collections::HashMap;
    use std::time::Duration;

    fn from(vars: &[(&str, &str)]) -> StationConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        StationConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(from(&[]), StationConfig::default());
    }

    #[test]
    fn overrides_and_bad_values() {
        let cfg = from(&[
            ("GCS_POLL_INTERVAL_MS", "250"),
            ("GCS_TERMINAL_ACTION", "land"),
            ("GCS_OVERLAP", "not-a-number"),
            ("GCS_SENSOR_WIDTH_M", "NaN"),
            ("GCS_BACKEND_URL", "http://10.0.0.5:8000"),
        ]);
        assert_eq!(cfg.poll_interval, Duration::from_millis(250));
        assert_eq!(cfg.terminal_action, TerminalAction::Land);
        assert_eq!(cfg.overlap, 0.2);
        assert_eq!(cfg.sensor_width_m, 30.0);
        assert_eq!(cfg.backend_url, "http://10.0.0.5:8000");
        assert_eq!(cfg.mission_params().terminal_action, TerminalAction::Land);
    }
}
