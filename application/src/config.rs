//! [`Config`]-related definitions.

use std::time;

use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use serde::Deserialize;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Paystack configuration.
    pub paystack: Paystack,

    /// [`Professional`] directory configuration.
    ///
    /// [`Professional`]: service::domain::Professional
    pub directory: Directory,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Creates a new [`Config`] by:
    /// - loading it from the provided `path` (if any);
    /// - merging it with the environment variables (if any);
    /// - using default values for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// Server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host to bind the server to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port to bind the server to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// [JWT] secret signing client tokens.
    ///
    /// [JWT]: https://wikipedia.org/wiki/JSON_Web_Token
    #[default("secret".to_owned())]
    pub jwt_secret: String,

    /// Time a paid booking stays engageable before it's withdrawn.
    #[default(time::Duration::from_secs(60 * 60 * 24))]
    #[serde(with = "humantime_serde")]
    pub booking_timeout: time::Duration,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Service {
            jwt_secret,
            booking_timeout,
            tasks: Tasks { sweep_sessions },
        } = value;
        Self {
            jwt_encoding_key: jsonwebtoken::EncodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            jwt_decoding_key: jsonwebtoken::DecodingKey::from_secret(
                jwt_secret.as_bytes(),
            ),
            booking_timeout,
            sweep_sessions: service::task::sweep_sessions::Config {
                interval: sweep_sessions.interval,
            },
        }
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `SweepSessions` task configuration.
    pub sweep_sessions: Task,
}

/// Service task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Task {
    /// Task execution interval.
    ///
    /// Sub-minute, so expiry converges well within the minute granularity
    /// reported to the parties.
    #[default(time::Duration::from_secs(30))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,
}

/// Paystack configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Paystack {
    /// Base URL of the Paystack API.
    #[default("https://api.paystack.co".to_owned())]
    pub base_url: String,

    /// Secret API key.
    pub secret_key: String,

    /// Timeout of a single API request.
    #[default(time::Duration::from_secs(10))]
    #[serde(with = "humantime_serde")]
    pub timeout: time::Duration,
}

impl From<Paystack> for service::infra::payments::paystack::Config {
    fn from(value: Paystack) -> Self {
        let Paystack {
            base_url,
            secret_key,
            timeout,
        } = value;

        Self {
            base_url,
            secret_key: secrecy::SecretString::from(secret_key),
            timeout,
        }
    }
}

/// [`Professional`] directory configuration.
///
/// The bookable roster is provisioned from here, standing in for the
/// upstream account system owning the [`Professional`] accounts.
///
/// [`Professional`]: service::domain::Professional
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Directory {
    /// Listed [`Professional`]s.
    ///
    /// [`Professional`]: service::domain::Professional
    pub professionals: Vec<Professional>,
}

/// Single listed [`Professional`].
///
/// [`Professional`]: service::domain::Professional
#[derive(Clone, Debug, Deserialize)]
pub struct Professional {
    /// ID of the [`Professional`].
    ///
    /// [`Professional`]: service::domain::Professional
    pub id: service::domain::professional::Id,

    /// Per-hour consultation rate.
    pub price_per_hour: common::Money,

    /// Whether the [`Professional`] passed verification and may be booked.
    ///
    /// [`Professional`]: service::domain::Professional
    #[serde(default)]
    pub is_verified: bool,
}

impl From<Professional> for service::domain::Professional {
    fn from(value: Professional) -> Self {
        let Professional {
            id,
            price_per_hour,
            is_verified,
        } = value;

        Self {
            id,
            price_per_hour,
            is_verified,
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
