use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use crate::{
    catalog::Catalog,
    deletion::SchedulerConfig,
    errors::Error,
    menu::DEFAULT_LINK_HOST,
    Result,
};

pub const DEFAULT_RETENTION_SECONDS: u64 = 86_400;
pub const DEFAULT_PERSISTENCE_PATH: &str = "bot_persistence.jsonl";

/// Typed runtime configuration, read from the environment.
#[derive(Clone)]
pub struct Config {
    pub telegram_bot_token: String,

    // Deletion
    pub retention: Duration,
    pub persistence_path: PathBuf,
    pub scheduler_poll: Duration,
    pub delete_timeout: Duration,

    // Content
    pub catalog_path: Option<PathBuf>,
    pub link_host: String,

    // Transport
    pub throttle_outbound: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("retention", &self.retention)
            .field("persistence_path", &self.persistence_path)
            .field("scheduler_poll", &self.scheduler_poll)
            .field("delete_timeout", &self.delete_timeout)
            .field("catalog_path", &self.catalog_path)
            .field("link_host", &self.link_host)
            .field("throttle_outbound", &self.throttle_outbound)
            .finish()
    }
}

impl Config {
    /// Process environment, after folding in `./.env` if present.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let retention_secs: u64 =
            parse_or("RETENTION_SECONDS", get("RETENTION_SECONDS"), DEFAULT_RETENTION_SECONDS)?;
        if retention_secs == 0 {
            return Err(Error::Config(
                "RETENTION_SECONDS must be greater than zero".to_string(),
            ));
        }
        // chrono::Duration must be able to hold it.
        if retention_secs > i64::MAX as u64 / 1000 {
            return Err(Error::Config(format!(
                "RETENTION_SECONDS is too large: {retention_secs}"
            )));
        }

        let persistence_path = PathBuf::from(
            get("PERSISTENCE_PATH").unwrap_or_else(|| DEFAULT_PERSISTENCE_PATH.to_string()),
        );
        let catalog_path = get("CATALOG_PATH").map(PathBuf::from);
        let link_host = get("LINK_HOST").unwrap_or_else(|| DEFAULT_LINK_HOST.to_string());

        let scheduler_poll_ms: u64 = parse_or("SCHEDULER_POLL_MS", get("SCHEDULER_POLL_MS"), 5_000)?;
        let delete_timeout_ms: u64 =
            parse_or("DELETE_TIMEOUT_MS", get("DELETE_TIMEOUT_MS"), 10_000)?;
        if scheduler_poll_ms == 0 || delete_timeout_ms == 0 {
            return Err(Error::Config(
                "SCHEDULER_POLL_MS and DELETE_TIMEOUT_MS must be greater than zero".to_string(),
            ));
        }

        let throttle_outbound = match get("THROTTLE_OUTBOUND") {
            None => false,
            Some(v) => parse_bool(&v).ok_or_else(|| {
                Error::Config(format!("THROTTLE_OUTBOUND is not a boolean: {v:?}"))
            })?,
        };

        Ok(Self {
            telegram_bot_token,
            retention: Duration::from_secs(retention_secs),
            persistence_path,
            scheduler_poll: Duration::from_millis(scheduler_poll_ms),
            delete_timeout: Duration::from_millis(delete_timeout_ms),
            catalog_path,
            link_host,
            throttle_outbound,
        })
    }

    pub fn retention_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.retention.as_secs() as i64)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_sleep: self.scheduler_poll,
            delete_timeout: self.delete_timeout,
        }
    }

    /// `CATALOG_PATH` when set, otherwise the built-in catalog.
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::load(path).map_err(|e| {
                Error::Config(format!("failed to load catalog {}: {e}", path.display()))
            }),
            None => Catalog::builtin(),
        }
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{key} is not a valid number: {v:?}"))),
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
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
        let line = line.strip_prefix("export ").unwrap_or(line);

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };
        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = &val[1..val.len() - 1];
        }
        out.push((key.to_string(), val.to_string()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn cfg_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = cfg_from(&[("TELEGRAM_BOT_TOKEN", "123:abc")]).unwrap();
        assert_eq!(cfg.retention, Duration::from_secs(86_400));
        assert_eq!(cfg.retention_window(), chrono::Duration::hours(24));
        assert_eq!(cfg.persistence_path, PathBuf::from("bot_persistence.jsonl"));
        assert_eq!(cfg.link_host, "t.me");
        assert!(cfg.catalog_path.is_none());
        assert!(!cfg.throttle_outbound);

        let sched = cfg.scheduler_config();
        assert_eq!(sched.max_sleep, Duration::from_secs(5));
        assert_eq!(sched.delete_timeout, Duration::from_secs(10));
    }

    #[test]
    fn token_is_required() {
        let err = cfg_from(&[("TELEGRAM_BOT_TOKEN", "   ")]).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("TELEGRAM_BOT_TOKEN")));
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = cfg_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("RETENTION_SECONDS", "60"),
            ("PERSISTENCE_PATH", "/var/lib/evb/tasks.jsonl"),
            ("LINK_HOST", "telegram.me"),
            ("SCHEDULER_POLL_MS", "250"),
            ("THROTTLE_OUTBOUND", "yes"),
        ])
        .unwrap();
        assert_eq!(cfg.retention, Duration::from_secs(60));
        assert_eq!(
            cfg.persistence_path,
            PathBuf::from("/var/lib/evb/tasks.jsonl")
        );
        assert_eq!(cfg.link_host, "telegram.me");
        assert_eq!(cfg.scheduler_poll, Duration::from_millis(250));
        assert!(cfg.throttle_outbound);
    }

    #[test]
    fn bad_numbers_are_rejected() {
        for (key, val) in [
            ("RETENTION_SECONDS", "a day"),
            ("RETENTION_SECONDS", "0"),
            ("RETENTION_SECONDS", "-5"),
            ("DELETE_TIMEOUT_MS", "0"),
            ("THROTTLE_OUTBOUND", "maybe"),
        ] {
            let res = cfg_from(&[("TELEGRAM_BOT_TOKEN", "t"), (key, val)]);
            assert!(matches!(res, Err(Error::Config(_))), "{key}={val} accepted");
        }
    }

    #[test]
    fn debug_redacts_token() {
        let cfg = cfg_from(&[("TELEGRAM_BOT_TOKEN", "123:secret")]).unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn builtin_catalog_when_unset() {
        let cfg = cfg_from(&[("TELEGRAM_BOT_TOKEN", "t")]).unwrap();
        let catalog = cfg.load_catalog().unwrap();
        assert_eq!(catalog.series_prefix, "onepiece");
    }

    #[test]
    fn missing_catalog_file_is_config_error() {
        let cfg = cfg_from(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("CATALOG_PATH", "/nonexistent/catalog.json"),
        ])
        .unwrap();
        assert!(matches!(cfg.load_catalog(), Err(Error::Config(_))));
    }

    #[test]
    fn dotenv_lines() {
        let parsed = parse_dotenv(
            "# comment\n\nTELEGRAM_BOT_TOKEN=\"abc\"\nexport LINK_HOST='t.me'\nbroken line\n=novalue\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TELEGRAM_BOT_TOKEN".to_string(), "abc".to_string()),
                ("LINK_HOST".to_string(), "t.me".to_string()),
            ]
        );
    }
}
