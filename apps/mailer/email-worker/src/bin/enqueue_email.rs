//! Push one email job onto the stream
//!
//! Run with: cargo run -p mailer_email_worker --bin enqueue_email -- <to> [subject] [body]

use core_config::FromEnv;
use email::MailJob;
use eyre::{Result, WrapErr, eyre};
use mailer_email_worker::config::Config;
use stream_worker::{RedisStreamStore, StreamStore};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let mut args = std::env::args().skip(1);
    let to = args
        .next()
        .ok_or_else(|| eyre!("usage: enqueue_email <to> [subject] [body]"))?;
    let subject = args.next().unwrap_or_else(|| "Test email".to_string());
    let body = args
        .next()
        .unwrap_or_else(|| "Hello! This is a test email sent via Redis Streams.".to_string());

    core_config::load_env_file().wrap_err("Failed to load .env file")?;
    let config = Config::from_env().wrap_err("Failed to load configuration")?;
    println!("Connecting to Redis at {}", config.redis_url);

    let store = RedisStreamStore::connect(&config.redis_url, config.worker.block_timeout)
        .await
        .wrap_err("Failed to connect to Redis")?;

    let job = MailJob::new(to, subject, body);
    let id = store
        .append(&config.worker.stream_name, &job.to_fields())
        .await
        .wrap_err("Failed to enqueue email job")?;

    println!("Queued email to {} on {}", job.recipient, config.worker.stream_name);
    println!("Stream ID: {}", id);

    store.close().await?;
    Ok(())
}
