//! Configuration module
//!
//! Client configuration is read from the environment (a `.env` file is
//! honoured). Unset values fall back to the defaults below.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::models::{AuthContext, Role};

const DEFAULT_API_URL: &str = "http://localhost:8000";
const HTTP_TIMEOUT_SECS: u64 = 30;
const SCAN_FPS: u32 = 10;
const SCAN_TIMEOUT_SECS: u64 = 120;

/// Output format for the tracing subscriber.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!(
                "Invalid log format '{}'. Must be: text or json",
                other
            )),
        }
    }
}

/// Client configuration
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub http_timeout_secs: u64,
    /// Frames per second pulled from the capture device while scanning.
    pub scan_fps: u32,
    /// How long a camera scan waits for a readable code before giving up.
    pub scan_timeout_secs: u64,
    /// Directory a capture device drops frames into.
    pub camera_dir: Option<PathBuf>,
    pub log_format: LogFormat,
    pub token: Option<String>,
    pub role: Option<String>,
    pub user_name: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            scan_fps: SCAN_FPS,
            scan_timeout_secs: SCAN_TIMEOUT_SECS,
            camera_dir: None,
            log_format: LogFormat::Text,
            token: None,
            role: None,
            user_name: None,
        }
    }
}

fn env_number<T: FromStr>(name: &str, default: T) -> Result<T, anyhow::Error> {
    parse_number(name, env::var(name).ok().as_deref(), default)
}

fn parse_number<T: FromStr>(name: &str, raw: Option<&str>, default: T) -> Result<T, anyhow::Error> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", name, value)),
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let config = Self {
            api_url: env::var("ECOTRACE_API_URL")
                .or_else(|_| env::var("API_URL"))
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http_timeout_secs: env_number("ECOTRACE_HTTP_TIMEOUT_SECS", HTTP_TIMEOUT_SECS)?,
            scan_fps: env_number("ECOTRACE_SCAN_FPS", SCAN_FPS)?,
            scan_timeout_secs: env_number("ECOTRACE_SCAN_TIMEOUT_SECS", SCAN_TIMEOUT_SECS)?,
            camera_dir: env::var("ECOTRACE_CAMERA_DIR").ok().map(PathBuf::from),
            log_format: env::var("ECOTRACE_LOG_FORMAT")
                .ok()
                .map(|s| s.parse::<LogFormat>())
                .transpose()?
                .unwrap_or_default(),
            token: env::var("ECOTRACE_TOKEN").ok().filter(|t| !t.is_empty()),
            role: env::var("ECOTRACE_ROLE").ok().filter(|r| !r.is_empty()),
            user_name: env::var("ECOTRACE_USER").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "ECOTRACE_API_URL must start with http:// or https://, got '{}'",
                self.api_url
            ));
        }
        if self.scan_fps == 0 || self.scan_fps > 60 {
            return Err(anyhow::anyhow!(
                "ECOTRACE_SCAN_FPS must be between 1 and 60, got {}",
                self.scan_fps
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow::anyhow!("ECOTRACE_HTTP_TIMEOUT_SECS must be positive"));
        }
        if self.scan_timeout_secs == 0 {
            return Err(anyhow::anyhow!("ECOTRACE_SCAN_TIMEOUT_SECS must be positive"));
        }
        Ok(())
    }

    /// The signed-in user's auth context, if a token and role are configured.
    pub fn auth_context(&self) -> Result<Option<AuthContext>, anyhow::Error> {
        let (Some(token), Some(role)) = (&self.token, &self.role) else {
            return Ok(None);
        };
        let role: Role = role
            .parse()
            .map_err(|e| anyhow::anyhow!("ECOTRACE_ROLE: {}", e))?;
        let mut auth = AuthContext::new(role, token.clone());
        if let Some(name) = &self.user_name {
            auth = auth.with_display_name(name.clone());
        }
        Ok(Some(auth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ClientConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_url_and_fps() {
        let config = ClientConfig {
            api_url: "localhost:8000".to_string(),
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            scan_fps: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn numeric_settings_reject_garbage() {
        assert_eq!(parse_number("ECOTRACE_SCAN_TIMEOUT_SECS", None, 60u64).unwrap(), 60);
        assert_eq!(parse_number("ECOTRACE_SCAN_TIMEOUT_SECS", Some(" 15 "), 60u64).unwrap(), 15);
        let err = parse_number("ECOTRACE_SCAN_TIMEOUT_SECS", Some("soon"), 60u64).unwrap_err();
        assert!(err.to_string().contains("ECOTRACE_SCAN_TIMEOUT_SECS"));

        let config = ClientConfig {
            scan_timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn auth_context_requires_token_and_role() {
        let config = ClientConfig {
            token: Some("tok".to_string()),
            ..ClientConfig::default()
        };
        assert!(config.auth_context().unwrap().is_none());

        let config = ClientConfig {
            token: Some("tok".to_string()),
            role: Some("transporter".to_string()),
            user_name: Some("Ana".to_string()),
            ..ClientConfig::default()
        };
        let auth = config.auth_context().unwrap().unwrap();
        assert_eq!(auth.role, Role::Transporter);
        assert_eq!(auth.token(), "tok");
        assert_eq!(auth.display_name, "Ana");

        let config = ClientConfig {
            token: Some("tok".to_string()),
            role: Some("pilot".to_string()),
            ..ClientConfig::default()
        };
        assert!(config.auth_context().is_err());
    }
}
