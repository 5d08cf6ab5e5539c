//! Materializer settings.

use std::time::Duration;

use clap::Args;
use kafka_source::ConsumerConfig;
use object_storage::S3Config;

/// Arguments for `cdc-demo materialize`.
///
/// Every setting defaults to the demo environment (docker-compose service
/// names and MinIO credentials) and can be overridden by flag or environment.
#[derive(Args, Clone, Debug)]
pub struct MaterializerConfig {
    /// Kafka bootstrap servers (comma-separated)
    #[arg(long, env = "KAFKA_BOOTSTRAP_SERVERS", default_value = "kafka1:19092")]
    pub bootstrap_servers: String,

    /// Topic carrying the product change events
    #[arg(long, env = "KAFKA_TOPIC", default_value = "postgres-db.public.products")]
    pub topic: String,

    /// Consumer group id; partitions are assigned manually and never committed
    #[arg(long, env = "KAFKA_GROUP_ID", default_value = "cdc-demo-materializer")]
    pub group_id: String,

    /// S3-compatible endpoint URL
    #[arg(long, env = "S3_ENDPOINT", default_value = "http://minio:9000")]
    pub s3_endpoint: String,

    #[arg(long, env = "S3_ACCESS_KEY", default_value = "admin")]
    pub s3_access_key: String,

    #[arg(long, env = "S3_SECRET_KEY", default_value = "admin123456", hide_env_values = true)]
    pub s3_secret_key: String,

    #[arg(long, env = "S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,

    /// Bucket holding both the table and the checkpoint
    #[arg(long, env = "S3_BUCKET", default_value = "spark-products-bucket")]
    pub bucket: String,

    /// Delta table location inside the bucket
    #[arg(long, env = "DELTA_TABLE_PATH", default_value = "products_delta")]
    pub table_path: String,

    /// Checkpoint location inside the bucket
    #[arg(long, env = "CHECKPOINT_PATH", default_value = "_checkpoints/products_console")]
    pub checkpoint_path: String,

    /// Maximum messages per micro-batch
    #[arg(
        long,
        default_value_t = 500,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub max_batch_size: usize,

    /// How long one micro-batch waits for messages, in milliseconds
    #[arg(
        long = "trigger-interval-ms",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub trigger_interval_ms: u64,

    #[arg(long = "s3-connect-timeout-ms", default_value_t = 60_000)]
    pub s3_connect_timeout_ms: u64,

    /// Attempts per S3 request, including the first
    #[arg(long, default_value_t = 3)]
    pub s3_max_attempts: u32,

    /// Initial backoff between S3 attempts, in milliseconds
    #[arg(long = "s3-retry-interval-ms", default_value_t = 500)]
    pub s3_retry_interval_ms: u64,
}

impl MaterializerConfig {
    pub fn trigger_interval(&self) -> Duration {
        Duration::from_millis(self.trigger_interval_ms)
    }

    pub fn s3_config(&self) -> S3Config {
        S3Config {
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            access_key: self.s3_access_key.clone(),
            secret_key: self.s3_secret_key.clone(),
            bucket: self.bucket.clone(),
            connect_timeout: Duration::from_millis(self.s3_connect_timeout_ms),
            max_attempts: self.s3_max_attempts,
            retry_interval: Duration::from_millis(self.s3_retry_interval_ms),
        }
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            brokers: self.bootstrap_servers.clone(),
            group_id: self.group_id.clone(),
            topic: self.topic.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: MaterializerConfig,
    }

    #[test]
    fn test_defaults_match_demo_environment() {
        let cli = TestCli::try_parse_from(["materialize"]).unwrap();
        let config = cli.config;
        assert_eq!(config.topic, "postgres-db.public.products");
        assert_eq!(config.table_path, "products_delta");
        assert_eq!(config.checkpoint_path, "_checkpoints/products_console");
        assert_eq!(config.max_batch_size, 500);
        assert_eq!(config.trigger_interval(), Duration::from_secs(1));

        let s3 = config.s3_config();
        assert_eq!(s3.bucket, "spark-products-bucket");
        assert_eq!(s3.connect_timeout, Duration::from_secs(60));
        assert_eq!(s3.max_attempts, 3);
        assert_eq!(s3.retry_interval, Duration::from_millis(500));

        let consumer = config.consumer_config();
        assert_eq!(consumer.topic, "postgres-db.public.products");
        assert_eq!(consumer.group_id, "cdc-demo-materializer");
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::try_parse_from([
            "materialize",
            "--bootstrap-servers",
            "localhost:9092",
            "--bucket",
            "other",
            "--max-batch-size",
            "10",
            "--trigger-interval-ms",
            "250",
        ])
        .unwrap();
        assert_eq!(cli.config.consumer_config().brokers, "localhost:9092");
        assert_eq!(cli.config.s3_config().bucket, "other");
        assert_eq!(cli.config.max_batch_size, 10);
        assert_eq!(cli.config.trigger_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_zero_batch_size_and_interval_are_rejected() {
        let err = TestCli::try_parse_from(["materialize", "--max-batch-size", "0"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let err = TestCli::try_parse_from(["materialize", "--trigger-interval-ms", "0"])
            .err()
            .unwrap();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli = TestCli::try_parse_from([
            "materialize",
            "--max-batch-size",
            "1",
            "--trigger-interval-ms",
            "1",
        ])
        .unwrap();
        assert_eq!(cli.config.max_batch_size, 1);
        assert_eq!(cli.config.trigger_interval(), Duration::from_millis(1));
    }
}
