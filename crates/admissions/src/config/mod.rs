use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

pub const DEFAULT_INSTITUTION: &str = "Wadeh Medical College and Hospital";
pub const DEFAULT_ID_PREFIX: &str = "WMCH";
pub const DEFAULT_DRIVE_FOLDER: &str = "Wadeh Applications";
pub const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;
pub const DEFAULT_APPLICATION_FEE: u32 = 500;

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub intake: IntakeConfig,
    pub mail: MailConfig,
    pub apply: ApplyConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = var_or("APP_HOST", "127.0.0.1");
        let port = var_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = var_or("APP_LOG_LEVEL", "info");
        let institution = var_or("INTAKE_INSTITUTION", DEFAULT_INSTITUTION);

        let storage = match var_or("INTAKE_STORAGE", "local")
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "local" => StorageConfig::Local {
                upload_dir: PathBuf::from(var_or("INTAKE_UPLOAD_DIR", "data/uploads")),
                public_url: var_or("INTAKE_PUBLIC_URL", &format!("http://{host}:{port}")),
            },
            "drive" => StorageConfig::Drive {
                folder_name: var_or("INTAKE_DRIVE_FOLDER", DEFAULT_DRIVE_FOLDER),
                folder_id: optional_var("INTAKE_DRIVE_FOLDER_ID"),
                service_account_key: optional_var("GOOGLE_SERVICE_ACCOUNT_KEY")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing {
                        key: "GOOGLE_SERVICE_ACCOUNT_KEY",
                    })?,
            },
            _ => {
                return Err(ConfigError::Invalid {
                    key: "INTAKE_STORAGE",
                })
            }
        };

        let transport = match var_or("MAIL_TRANSPORT", "log")
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "log" => MailTransport::Log,
            "smtp" => MailTransport::Smtp {
                relay: optional_var("SMTP_RELAY").ok_or(ConfigError::Missing { key: "SMTP_RELAY" })?,
                username: optional_var("SMTP_USERNAME"),
                password: optional_var("SMTP_PASSWORD"),
            },
            _ => {
                return Err(ConfigError::Invalid {
                    key: "MAIL_TRANSPORT",
                })
            }
        };

        let intake = IntakeConfig {
            institution: institution.clone(),
            id_prefix: var_or("INTAKE_ID_PREFIX", DEFAULT_ID_PREFIX),
            sheet_path: PathBuf::from(var_or("INTAKE_SHEET_PATH", "data/applications.csv")),
            storage,
        };

        let mail = MailConfig {
            transport,
            from_name: institution,
            from_address: var_or("MAIL_FROM_ADDRESS", "admissions@localhost"),
            admissions_cc: optional_var("MAIL_ADMISSIONS_CC"),
        };

        let apply = ApplyConfig {
            endpoint: var_or(
                "APPLY_ENDPOINT",
                &format!("http://{host}:{port}/api/v1/applications"),
            ),
            application_fee: parse_var("APPLY_FEE", DEFAULT_APPLICATION_FEE)?,
            checkout_key: optional_var("CHECKOUT_KEY"),
            max_file_bytes: parse_var("APPLY_MAX_FILE_BYTES", DEFAULT_MAX_FILE_BYTES)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            intake,
            mail,
            apply,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(key) {
        Some(raw) => raw.parse::<T>().map_err(|_| ConfigError::Invalid { key }),
        None => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Intake handler settings: where rows and documents land.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub institution: String,
    pub id_prefix: String,
    pub sheet_path: PathBuf,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local {
        upload_dir: PathBuf,
        public_url: String,
    },
    Drive {
        folder_name: String,
        folder_id: Option<String>,
        service_account_key: PathBuf,
    },
}

/// Outbound confirmation mail settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub transport: MailTransport,
    pub from_name: String,
    pub from_address: String,
    pub admissions_cc: Option<String>,
}

#[derive(Clone, PartialEq, Eq)]
pub enum MailTransport {
    Log,
    Smtp {
        relay: String,
        username: Option<String>,
        password: Option<String>,
    },
}

impl fmt::Debug for MailTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MailTransport::Log => f.write_str("Log"),
            MailTransport::Smtp {
                relay, username, ..
            } => f
                .debug_struct("Smtp")
                .field("relay", relay)
                .field("username", username)
                .finish_non_exhaustive(),
        }
    }
}

/// Client-side submission flow settings.
#[derive(Debug, Clone)]
pub struct ApplyConfig {
    pub endpoint: String,
    pub application_fee: u32,
    pub checkout_key: Option<String>,
    pub max_file_bytes: u64,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    Invalid { key: &'static str },
    Missing { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::Invalid { key } => write!(f, "{key} has an unsupported value"),
            ConfigError::Missing { key } => write!(f, "{key} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::Invalid { .. }
            | ConfigError::Missing { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "INTAKE_INSTITUTION",
            "INTAKE_ID_PREFIX",
            "INTAKE_SHEET_PATH",
            "INTAKE_STORAGE",
            "INTAKE_UPLOAD_DIR",
            "INTAKE_PUBLIC_URL",
            "GOOGLE_SERVICE_ACCOUNT_KEY",
            "MAIL_TRANSPORT",
            "SMTP_RELAY",
            "MAIL_ADMISSIONS_CC",
            "APPLY_ENDPOINT",
            "APPLY_FEE",
            "CHECKOUT_KEY",
            "APPLY_MAX_FILE_BYTES",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.intake.id_prefix, "WMCH");
        assert_eq!(config.mail.transport, MailTransport::Log);
        assert_eq!(config.apply.max_file_bytes, 2 * 1024 * 1024);
        assert_eq!(config.apply.application_fee, 500);
        assert!(config.apply.checkout_key.is_none());
        assert_eq!(
            config.apply.endpoint,
            "http://127.0.0.1:3000/api/v1/applications"
        );
        assert!(matches!(config.intake.storage, StorageConfig::Local { .. }));
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn drive_storage_requires_service_account_key() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("INTAKE_STORAGE", "drive");
        match AppConfig::load() {
            Err(ConfigError::Missing { key }) => assert_eq!(key, "GOOGLE_SERVICE_ACCOUNT_KEY"),
            other => panic!("expected missing key error, got {other:?}"),
        }
        reset_env();
    }

    #[test]
    fn rejects_non_numeric_fee() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APPLY_FEE", "five hundred");
        match AppConfig::load() {
            Err(ConfigError::Invalid { key }) => assert_eq!(key, "APPLY_FEE"),
            other => panic!("expected invalid fee error, got {other:?}"),
        }
        reset_env();
    }
}
