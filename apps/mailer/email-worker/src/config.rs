//! Email worker configuration, loaded from the process environment.

use core_config::{ConfigError, FromEnv, env_first_or_default, env_or_default, env_parse_or_default};
use email::{DEFAULT_SEND_TIMEOUT, MailtrapConfig, MailtrapSender};
use std::path::PathBuf;
use std::time::Duration;
use stream_worker::{
    DEFAULT_BLOCK_TIMEOUT, DEFAULT_CONSUMER, DEFAULT_GROUP, DEFAULT_STREAM, WorkerConfig,
};

const DEFAULT_REDIS_ADDR: &str = "redis://127.0.0.1:6379";
const DEFAULT_HEALTH_PORT: u16 = 8081;

/// Everything the email worker needs to boot
#[derive(Clone)]
pub struct Config {
    pub redis_url: String,
    pub health_port: u16,
    pub mailtrap: MailtrapConfig,
    pub worker: WorkerConfig,
    pub send_timeout: Duration,
    pub log_file: Option<PathBuf>,
}

impl FromEnv for Config {
    fn from_env() -> Result<Self, ConfigError> {
        let redis_url = normalize_redis_url(&env_first_or_default(
            &["REDIS_ADDR", "REDIS_URL"],
            DEFAULT_REDIS_ADDR,
        ));

        // Do NOT fall back to PORT; that one belongs to whatever API shares the pod
        let health_port = match std::env::var("SERVER_PORT") {
            Ok(_) => env_parse_or_default("SERVER_PORT", DEFAULT_HEALTH_PORT)?,
            Err(_) => env_parse_or_default("HEALTH_PORT", DEFAULT_HEALTH_PORT)?,
        };

        let defaults = MailtrapConfig::default();
        let mailtrap = MailtrapConfig {
            api_url: env_or_default("MAILTRAP_URL", &defaults.api_url),
            api_key: env_or_default("MAILTRAP_API_KEY", ""),
            from_email: env_or_default("EMAIL_FROM_ADDRESS", &defaults.from_email),
            from_name: env_or_default("EMAIL_FROM_NAME", &defaults.from_name),
        };

        let worker = WorkerConfig::new(
            env_or_default("EMAIL_STREAM", DEFAULT_STREAM),
            env_or_default("EMAIL_GROUP", DEFAULT_GROUP),
            env_or_default("EMAIL_CONSUMER", DEFAULT_CONSUMER),
        )
        .with_batch_size(env_parse_or_default("EMAIL_BATCH_SIZE", 1)?)
        .with_block_timeout(Duration::from_millis(env_parse_or_default(
            "EMAIL_BLOCK_TIMEOUT_MS",
            DEFAULT_BLOCK_TIMEOUT.as_millis() as u64,
        )?))
        .with_pending_recovery(env_parse_or_default("EMAIL_RECOVER_PENDING", false)?);

        let send_timeout = Duration::from_millis(env_parse_or_default(
            "EMAIL_SEND_TIMEOUT_MS",
            DEFAULT_SEND_TIMEOUT.as_millis() as u64,
        )?);

        let log_file = std::env::var("LOG_FILE")
            .ok()
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            redis_url,
            health_port,
            mailtrap,
            worker,
            send_timeout,
            log_file,
        })
    }
}

impl Config {
    /// Build the Mailtrap sender for this configuration
    pub fn mail_sender(&self) -> MailtrapSender {
        MailtrapSender::new(self.mailtrap.clone())
    }
}

/// Accept a bare `host:port` as well as a full `redis://` URL
fn normalize_redis_url(addr: &str) -> String {
    let addr = addr.trim();
    if addr.contains("://") {
        addr.to_string()
    } else {
        format!("redis://{addr}")
    }
}
