use std::{env, fs, path::Path, time::Duration};

use crate::{
    collector::{CollectorOptions, Matcher, DEFAULT_TIME},
    errors::Error,
    Result,
};

/// Typed configuration for SDK binaries.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    // Collector defaults
    pub collector_time: Option<Duration>,
    pub collector_max: Option<usize>,
    pub collector_max_processed: Option<usize>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let collector_time = match env_str("COLLECTOR_TIME_MS") {
            Some(raw) => parse_time_ms(&raw).ok_or_else(|| {
                Error::Config(format!("COLLECTOR_TIME_MS is not a duration: {raw}"))
            })?,
            None => Some(DEFAULT_TIME),
        };
        let collector_max = env_limit("COLLECTOR_MAX")?;
        let collector_max_processed = env_limit("COLLECTOR_MAX_PROCESSED")?;

        Ok(Self {
            telegram_bot_token,
            collector_time,
            collector_max,
            collector_max_processed,
        })
    }

    /// Collector options seeded from the configured defaults.
    pub fn collector_defaults<M: Matcher>(&self) -> CollectorOptions<M> {
        CollectorOptions {
            filter: None,
            time: self.collector_time,
            max: self.collector_max,
            max_processed: self.collector_max_processed,
        }
    }
}

/// Milliseconds; `0`, `inf`, `infinity` and `none` disable the deadline.
/// Returns `None` when `raw` is not understood.
fn parse_time_ms(raw: &str) -> Option<Option<Duration>> {
    let v = raw.trim().to_lowercase();
    if matches!(v.as_str(), "0" | "inf" | "infinity" | "none") {
        return Some(None);
    }
    v.parse::<u64>().ok().map(|ms| Some(Duration::from_millis(ms)))
}

fn env_limit(key: &str) -> Result<Option<usize>> {
    let Some(raw) = env_str(key).and_then(non_empty) else {
        return Ok(None);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(Error::Config(format!("{key} must be at least 1"))),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(Error::Config(format!("{key} is not a number: {raw}"))),
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
