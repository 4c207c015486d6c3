//! Command implementations
//!
//! Each command parses its own arguments, builds an engine from the global
//! connection flags and reports through the shared [`Formatter`].

pub mod cleanup;
pub mod du;
pub mod get;
pub mod ls;
pub mod profiles;
pub mod rm;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use s3tree_core::config::{DEFAULT_CONCURRENCY, DEFAULT_DELIMITER, parse_key_value};
use s3tree_core::{
    ConfigManager, Error, OperationConfig, Profile, Reporter, Result, RetryBuilder, RetryConfig,
    TransferEngine,
};
use s3tree_s3::S3Client;
use tokio_util::sync::CancellationToken;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List objects and common prefixes
    Ls(ls::LsArgs),
    /// Remove an object or everything below a prefix
    Rm(rm::RmArgs),
    /// Download an object or everything below a prefix
    Get(get::GetArgs),
    /// Delete every object version and/or abort every multipart upload
    Cleanup(cleanup::CleanupArgs),
    /// Show storage used by current versions, old versions and multipart uploads
    Du(du::DuArgs),
    /// List configured profiles
    Profiles,
}

/// Connection flags, overriding the selected profile when set
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Configuration file (default: ~/.config/s3tree/config.toml)
    #[arg(long, global = true, env = "S3TREE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Profile to use from the configuration file
    #[arg(long, global = true, env = "S3TREE_PROFILE", default_value = "default")]
    pub profile: String,

    /// Bucket to operate on
    #[arg(short, long, global = true, env = "S3TREE_BUCKET")]
    pub bucket: Option<String>,

    /// S3 endpoint URL
    #[arg(long, global = true, env = "S3TREE_ENDPOINT")]
    pub endpoint: Option<String>,

    #[arg(long, global = true, env = "S3TREE_REGION")]
    pub region: Option<String>,

    #[arg(long, global = true, env = "S3TREE_ACCESS_KEY")]
    pub access_key: Option<String>,

    #[arg(long, global = true, env = "S3TREE_SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, global = true)]
    pub path_style: bool,

    /// Refuse every request that is not HEAD, GET, OPTIONS or TRACE
    #[arg(long, global = true)]
    pub read_only: bool,

    /// Bandwidth limit for transfers, e.g. "10 MiB"
    #[arg(long, global = true)]
    pub bandwidth: Option<String>,

    /// Extra header sent with every request (key=value, repeatable)
    #[arg(long = "header", global = true, value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Extra query parameter sent with every request (key=value, repeatable)
    #[arg(long = "param", global = true, value_parser = parse_key_value)]
    pub params: Vec<(String, String)>,
}

impl GlobalArgs {
    /// Profile fields given on the command line
    fn overrides(&self) -> Profile {
        Profile {
            endpoint: self.endpoint.clone().unwrap_or_default(),
            region: self.region.clone().unwrap_or_default(),
            access_key: self.access_key.clone().unwrap_or_default(),
            secret_key: self.secret_key.clone().unwrap_or_default(),
            path_style: self.path_style,
            read_only: self.read_only,
            bandwidth: self.bandwidth.clone().unwrap_or_default(),
            headers: self.headers.iter().cloned().collect(),
            params: self.params.iter().cloned().collect(),
        }
    }

    /// Load the selected profile and apply command line overrides
    pub fn resolve_profile(&self) -> Result<Profile> {
        let manager = match &self.config {
            Some(path) => ConfigManager::with_path(path),
            None => ConfigManager::new()?,
        };
        let mut profile = manager.load()?.profile(&self.profile)?;
        profile.apply_overrides(&self.overrides());
        Ok(profile)
    }

    pub fn bucket(&self) -> String {
        self.bucket.clone().unwrap_or_default()
    }
}

/// Flags shared by the tree operations
#[derive(Args, Debug, Clone)]
pub struct TreeArgs {
    /// Key delimiter of the virtual hierarchy
    #[arg(long, default_value = DEFAULT_DELIMITER)]
    pub delimiter: String,

    /// Maximum number of objects processed at once
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Report what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Everything a command needs besides its own arguments
pub struct CommandContext {
    pub global: GlobalArgs,
    pub output: OutputConfig,
    pub cancel: CancellationToken,
}

impl CommandContext {
    pub fn formatter(&self) -> Arc<Formatter> {
        Arc::new(Formatter::new(self.output))
    }

    /// Operation settings for the selected bucket
    pub fn operation(&self, tree: &TreeArgs) -> OperationConfig {
        OperationConfig {
            delimiter: tree.delimiter.clone(),
            concurrency: tree.concurrency,
            dry_run: tree.dry_run,
            ..OperationConfig::new(self.global.bucket())
        }
    }

    /// Connect to the store and build an engine reporting to `formatter`
    pub async fn engine(&self, formatter: Arc<Formatter>, dry_run: bool) -> Result<TransferEngine> {
        let profile = self.global.resolve_profile()?;
        let transport = profile.transport_config(dry_run)?;
        let client = S3Client::new(&profile, transport, self.cancel.clone()).await?;

        let reporter: Arc<dyn Reporter> = formatter;
        Ok(TransferEngine::new(Arc::new(client), reporter)
            .with_cancellation(self.cancel.clone())
            .with_retry(retry_config())
            .with_verbosity(self.output.progress_verbosity()))
    }
}

/// Retry policy with a jitter seed drawn once per invocation, so separate
/// processes do not retry a throttled endpoint in lockstep
fn retry_config() -> RetryConfig {
    RetryBuilder::new().seed(rand::random()).build()
}

/// Print `error` and map it to an exit code
pub fn fail(formatter: &Formatter, context: &str, error: &Error) -> ExitCode {
    formatter.error(&format!("{context}: {error}"));
    ExitCode::from_error(error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_override_profile() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[profiles.default]
endpoint = "http://localhost:9000"
region = "eu-west-1"
read_only = false
headers = {{ x-tenant = "acme" }}
"#
        )
        .unwrap();

        let global = GlobalArgs {
            config: Some(file.path().to_path_buf()),
            profile: "default".into(),
            region: Some("us-east-2".into()),
            read_only: true,
            headers: vec![("x-trace".into(), "1".into())],
            ..Default::default()
        };

        let profile = global.resolve_profile().unwrap();
        assert_eq!(profile.endpoint, "http://localhost:9000");
        assert_eq!(profile.region, "us-east-2");
        assert!(profile.read_only);
        assert_eq!(profile.headers.len(), 2);
    }

    #[test]
    fn test_unknown_profile_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        let global = GlobalArgs {
            config: Some(file.path().to_path_buf()),
            profile: "missing".into(),
            ..Default::default()
        };
        assert!(matches!(global.resolve_profile(), Err(Error::Config(_))));
    }

    #[test]
    fn test_operation_uses_tree_flags() {
        let ctx = CommandContext {
            global: GlobalArgs {
                bucket: Some("photos".into()),
                ..Default::default()
            },
            output: OutputConfig::default(),
            cancel: CancellationToken::new(),
        };
        let cfg = ctx.operation(&TreeArgs {
            delimiter: "|".into(),
            concurrency: 2,
            dry_run: true,
        });
        assert_eq!(cfg.bucket, "photos");
        assert_eq!(cfg.delimiter, "|");
        assert_eq!(cfg.concurrency, 2);
        assert!(cfg.dry_run);
        assert!(!cfg.force);
    }

    #[test]
    fn test_retry_seed_differs_per_invocation() {
        let first = retry_config();
        let second = retry_config();

        assert_ne!(first.seed, second.seed);
        assert_eq!(first.max_attempts, RetryConfig::default().max_attempts);
    }
}
