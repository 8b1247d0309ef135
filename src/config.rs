use std::{path::PathBuf, time::Duration};

use chrono::NaiveTime;
use chrono_tz::Tz;
use url::Url;

const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_MODEL: &str = "openai/gpt-3.5-turbo";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Wall-clock time at which the daily quiz goes out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailySchedule {
    pub at: NaiveTime,
    pub timezone: Tz,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_token: String,
    pub api_key: String,
    pub api_url: Url,
    pub model: String,
    pub request_timeout: Duration,
    pub topic_file: PathBuf,
    pub subscribers_file: PathBuf,
    pub daily: DailySchedule,
    pub keep_alive: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(ConfigError::Missing(name))
        };
        let optional = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let api_url = optional("OPENROUTER_API_URL", DEFAULT_API_URL);
        let api_url = Url::parse(&api_url).map_err(|e| invalid("OPENROUTER_API_URL", &api_url, e))?;

        let timeout = optional("LLM_TIMEOUT_SECS", "30");
        let timeout = timeout
            .parse::<u64>()
            .map_err(|e| invalid("LLM_TIMEOUT_SECS", &timeout, e))?;

        let at = optional("DAILY_QUIZ_TIME", "09:30");
        let at = NaiveTime::parse_from_str(&at, "%H:%M").map_err(|e| invalid("DAILY_QUIZ_TIME", &at, e))?;

        let timezone = optional("DAILY_QUIZ_TIMEZONE", "Asia/Kolkata");
        let timezone = timezone
            .parse::<Tz>()
            .map_err(|e| invalid("DAILY_QUIZ_TIMEZONE", &timezone, e))?;

        let keep_alive = optional("KEEP_ALIVE_SECS", "600");
        let keep_alive = match keep_alive.parse::<u64>() {
            Ok(secs) if secs > 0 => secs,
            Ok(_) => return Err(invalid("KEEP_ALIVE_SECS", &keep_alive, "must be positive")),
            Err(e) => return Err(invalid("KEEP_ALIVE_SECS", &keep_alive, e)),
        };

        Ok(Self {
            telegram_token: required("TELEGRAM_TOKEN")?,
            api_key: required("OPENROUTER_API_KEY")?,
            api_url,
            model: optional("QUIZ_MODEL", DEFAULT_MODEL),
            request_timeout: Duration::from_secs(timeout),
            topic_file: optional("TOPIC_FILE", "topic_store.json").into(),
            subscribers_file: optional("SUBSCRIBERS_FILE", "subscribers.json").into(),
            daily: DailySchedule { at, timezone },
            keep_alive: Duration::from_secs(keep_alive),
        })
    }
}

fn invalid(name: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
