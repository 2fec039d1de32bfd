//! Configuration management
//!
//! Settings are read once at startup from an INI file (default `dwh.cfg`)
//! and then passed by reference to every component:
//!
//! ```ini
//! [CLUSTER]
//! HOST = example.us-west-2.redshift.amazonaws.com
//! DB_NAME = dwh
//! DB_USER = etl
//! DB_PASSWORD = secret
//! DB_PORT = 5439
//!
//! [IAM_ROLE]
//! ARN = arn:aws:iam::123456789012:role/dwhRole
//!
//! [S3]
//! BUCKET = my-capstone-bucket
//! ```
//!
//! Any key can be overridden from the environment as
//! `DWH_<SECTION>__<KEY>`, e.g. `DWH_CLUSTER__DB_PASSWORD`.

use config::{Environment, File, FileFormat};
use serde::Deserialize;
use sqlx::postgres::PgSslMode;
use std::fmt;
use std::path::Path;

use crate::error::{EtlError, Result};

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default settings file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dwh.cfg";

/// Default Redshift port.
pub const DEFAULT_DB_PORT: u16 = 5439;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default region for the raw-data bucket.
pub const DEFAULT_S3_REGION: &str = "us-west-2";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "DWH";

/// Pipeline configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EtlConfig {
    #[serde(alias = "CLUSTER")]
    pub cluster: ClusterConfig,
    #[serde(alias = "IAM_ROLE")]
    pub iam_role: IamRoleConfig,
    #[serde(alias = "S3")]
    pub s3: S3Config,
    /// Static credentials for the uploader; the default AWS chain is used when absent
    #[serde(default, alias = "AWS")]
    pub aws: Option<AwsCredentialsConfig>,
}

/// Warehouse connection settings
#[derive(Clone, Deserialize)]
pub struct ClusterConfig {
    #[serde(alias = "HOST")]
    pub host: String,
    #[serde(alias = "DB_NAME")]
    pub db_name: String,
    #[serde(alias = "DB_USER")]
    pub db_user: String,
    #[serde(alias = "DB_PASSWORD")]
    pub db_password: String,
    #[serde(default = "default_db_port", alias = "DB_PORT")]
    pub db_port: u16,
    #[serde(default, alias = "SSL_MODE")]
    pub ssl_mode: SslMode,
    #[serde(default = "default_connect_timeout", alias = "CONNECT_TIMEOUT_SECS")]
    pub connect_timeout_secs: u64,
}

impl fmt::Debug for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterConfig")
            .field("host", &self.host)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"***")
            .field("db_port", &self.db_port)
            .field("ssl_mode", &self.ssl_mode)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

/// TLS negotiation with the warehouse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

impl From<SslMode> for PgSslMode {
    fn from(mode: SslMode) -> Self {
        match mode {
            SslMode::Disable => PgSslMode::Disable,
            SslMode::Prefer => PgSslMode::Prefer,
            SslMode::Require => PgSslMode::Require,
        }
    }
}

/// Role the warehouse assumes to read from object storage
#[derive(Debug, Clone, Deserialize)]
pub struct IamRoleConfig {
    #[serde(alias = "ARN")]
    pub arn: String,
}

/// Object storage layout
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    #[serde(alias = "BUCKET")]
    pub bucket: String,
    #[serde(default = "default_region", alias = "REGION")]
    pub region: String,
    /// Custom endpoint (MinIO or localstack) for the uploader
    #[serde(default, alias = "ENDPOINT")]
    pub endpoint: Option<String>,
}

/// Static access keys for the uploader
#[derive(Clone, Deserialize)]
pub struct AwsCredentialsConfig {
    #[serde(alias = "KEY")]
    pub key: String,
    #[serde(alias = "SECRET")]
    pub secret: String,
}

impl fmt::Debug for AwsCredentialsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentialsConfig")
            .field("key", &self.key)
            .field("secret", &"***")
            .finish()
    }
}

fn default_db_port() -> u16 {
    DEFAULT_DB_PORT
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_region() -> String {
    DEFAULT_S3_REGION.to_string()
}

impl EtlConfig {
    /// Load configuration from the settings file and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        if !path.exists() {
            return Err(EtlError::config(format!(
                "settings file '{}' not found",
                path.display()
            )));
        }

        let settings = config::Config::builder()
            .add_source(File::from(path).format(FileFormat::Ini).required(true))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let config: EtlConfig = settings.try_deserialize()?;
        config.validate()?;

        tracing::debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("CLUSTER.HOST", &self.cluster.host),
            ("CLUSTER.DB_NAME", &self.cluster.db_name),
            ("CLUSTER.DB_USER", &self.cluster.db_user),
            ("IAM_ROLE.ARN", &self.iam_role.arn),
            ("S3.BUCKET", &self.s3.bucket),
        ];

        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(EtlError::config(format!("{} cannot be empty", key)));
            }
        }

        if self.cluster.db_port == 0 {
            return Err(EtlError::config("CLUSTER.DB_PORT must be greater than 0"));
        }

        if self.s3.bucket.contains('/') {
            return Err(EtlError::config(format!(
                "S3.BUCKET must be a bucket name, not a path: '{}'",
                self.s3.bucket
            )));
        }

        Ok(())
    }

    /// Role identifier with any quoting from the settings file removed
    pub fn iam_role_arn(&self) -> &str {
        self.iam_role.arn.trim().trim_matches('\'').trim_matches('"')
    }

    /// `s3://<bucket>/raw`
    pub fn raw_data_uri(&self) -> String {
        format!("s3://{}/raw", self.s3.bucket)
    }

    /// `s3://<bucket>/lookup`
    pub fn lookup_data_uri(&self) -> String {
        format!("s3://{}/lookup", self.s3.bucket)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    /// Configuration used by unit tests across the crate
    pub(crate) fn test_config() -> EtlConfig {
        EtlConfig {
            cluster: ClusterConfig {
                host: "localhost".to_string(),
                db_name: "dwh".to_string(),
                db_user: "etl".to_string(),
                db_password: "secret".to_string(),
                db_port: DEFAULT_DB_PORT,
                ssl_mode: SslMode::Disable,
                connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            },
            iam_role: IamRoleConfig {
                arn: "arn:aws:iam::123456789012:role/dwhRole".to_string(),
            },
            s3: S3Config {
                bucket: "capstone".to_string(),
                region: DEFAULT_S3_REGION.to_string(),
                endpoint: None,
            },
            aws: None,
        }
    }

    fn write_settings(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".cfg").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const SETTINGS: &str = r#"
[CLUSTER]
HOST = cluster.example.com
DB_NAME = dwh
DB_USER = etl
DB_PASSWORD = hunter2
DB_PORT = 5439

[IAM_ROLE]
ARN = 'arn:aws:iam::123456789012:role/dwhRole'

[S3]
BUCKET = capstone
"#;

    #[test]
    #[serial]
    fn test_load_from_ini() {
        let file = write_settings(SETTINGS);
        let config = EtlConfig::load(file.path()).unwrap();

        assert_eq!(config.cluster.host, "cluster.example.com");
        assert_eq!(config.cluster.db_port, 5439);
        assert_eq!(config.s3.region, DEFAULT_S3_REGION);
        assert_eq!(config.iam_role_arn(), "arn:aws:iam::123456789012:role/dwhRole");
        assert!(config.aws.is_none());
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let file = write_settings(SETTINGS);
        std::env::set_var("DWH_CLUSTER__DB_PASSWORD", "from-env");
        let config = EtlConfig::load(file.path());
        std::env::remove_var("DWH_CLUSTER__DB_PASSWORD");

        assert_eq!(config.unwrap().cluster.db_password, "from-env");
    }

    #[test]
    #[serial]
    fn test_missing_file_is_config_error() {
        let err = EtlConfig::load("/nonexistent/dwh.cfg").unwrap_err();
        assert!(matches!(err, EtlError::Config(_)));
    }

    #[test]
    fn test_validate_rejects_empty_bucket() {
        let mut config = test_config();
        config.s3.bucket = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_uris() {
        let config = test_config();
        assert_eq!(config.raw_data_uri(), "s3://capstone/raw");
        assert_eq!(config.lookup_data_uri(), "s3://capstone/lookup");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", test_config());
        assert!(!rendered.contains("secret\""));
        assert!(rendered.contains("***"));
    }
}
