//! Configuration schema definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use otpgate_framework::Mode;
use otpgate_otp::{DialPlan, OtpPolicy};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Session identifier handed out by a pairing site. The structural
    /// prefix selects the retrieval strategy.
    pub session_id: String,

    /// Command prefix for chat commands.
    pub prefix: String,

    /// Operating mode gate.
    pub mode: Mode,

    /// Owner phone numbers (bare digits).
    pub owner_numbers: Vec<String>,

    /// Additional operator numbers.
    pub sudo_numbers: Vec<String>,

    /// Mark status-channel posts read and react to them.
    pub auto_view_status: bool,

    /// Emoji used for status reactions.
    pub status_react_emoji: String,

    /// Delay before a reconnect attempt, in seconds.
    pub reconnect_delay_secs: u64,

    /// Session retrieval endpoints.
    pub session: SessionConfig,

    /// OTP lifecycle settings.
    pub otp: OtpConfig,

    /// HTTP control surface settings.
    pub http: HttpConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            session_id: String::new(),
            prefix: ".".to_string(),
            mode: Mode::Private,
            owner_numbers: Vec::new(),
            sudo_numbers: Vec::new(),
            auto_view_status: true,
            status_react_emoji: "🤧".to_string(),
            reconnect_delay_secs: 5,
            session: SessionConfig::default(),
            otp: OtpConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Reconnect delay as a [`Duration`].
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Session retrieval endpoints and the local credential directory.
///
/// Defaults mirror the public pairing services the gateway was originally
/// deployed against; self-hosted deployments override them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the persisted credential document.
    pub dir: String,

    /// Direct-JSON session server.
    pub direct_base_url: String,

    /// Legacy session server (plain or compressed responses).
    pub legacy_base_url: String,

    /// Object-store API base.
    pub object_store_api_base: String,

    /// Object-store owner segment.
    pub object_store_owner: String,

    /// Object-store repository segment.
    pub object_store_repo: String,

    /// Keyed-API session server.
    pub keyed_base_url: String,

    /// API key sent to the keyed session server.
    pub keyed_api_key: String,

    /// File-store base URL for ids with no recognized prefix. Empty
    /// disables the fallback strategy.
    pub file_store_base_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dir: "session".to_string(),
            direct_base_url: "https://pair.subzero.gleeze.com".to_string(),
            legacy_base_url: "https://sessions.subzero.gleeze.com".to_string(),
            object_store_api_base: "https://api.github.com".to_string(),
            object_store_owner: "mrfr8nk".to_string(),
            object_store_repo: "sb-sessions".to_string(),
            keyed_base_url: "https://subzero-md.koyeb.app".to_string(),
            keyed_api_key: "subzero-md".to_string(),
            file_store_base_url: String::new(),
        }
    }
}

/// OTP lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OtpConfig {
    /// Code validity window in seconds.
    pub ttl_secs: u64,

    /// Wrong submissions allowed per code.
    pub max_attempts: u32,

    /// Whether resend requests bypass the rate limiter.
    pub resend_exempt_from_limit: bool,

    /// Per-number request limiting.
    pub rate_limit: RateLimitConfig,

    /// Country-code completion rules.
    pub dial_plan: DialPlan,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            max_attempts: 5,
            resend_exempt_from_limit: true,
            rate_limit: RateLimitConfig::default(),
            dial_plan: DialPlan::default(),
        }
    }
}

impl OtpConfig {
    /// Converts to the engine policy.
    pub fn to_policy(&self) -> OtpPolicy {
        OtpPolicy {
            ttl: Duration::from_secs(self.ttl_secs),
            max_attempts: self.max_attempts,
            resend_exempt_from_limit: self.resend_exempt_from_limit,
            rate_window: Duration::from_secs(self.rate_limit.window_secs),
            rate_max_requests: self.rate_limit.max_requests,
            dial_plan: self.dial_plan.clone(),
        }
    }
}

/// Sliding-window rate-limit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Window length in seconds.
    pub window_secs: u64,

    /// Requests admitted per window per number.
    pub max_requests: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_requests: 5,
        }
    }
}

/// HTTP control surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7860,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter
    /// directive string.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Default human-readable output.
    #[default]
    Full,
    /// Single-line compact output.
    Compact,
    /// Multi-line verbose output.
    Pretty,
}
