use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File as ConfigFile};
use salescast_forecast_core::artifacts::{
    DEFAULT_ARTIFACTS_DIR, DEFAULT_ENCODING_MAPS_FILE, DEFAULT_MODEL_FILE,
    DEFAULT_STORE_ATTRIBUTES_FILE,
};
use salescast_forecast_core::service::DEFAULT_MAX_BATCH_SIZE;
use salescast_forecast_core::{
    ArtifactPaths, JoinMissPolicy, ServiceConfig, TransformPolicy, UnknownCategoryPolicy,
};
use salescast_rpc::DEFAULT_MAX_BODY_BYTES;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_CONFIG_PATH: &str = "config/salescast.toml";
pub const ENV_PREFIX: &str = "SALESCAST";

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 8000;
const DEFAULT_UNKNOWN_CATEGORY_CODE: f64 = -1.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub config_path: Option<PathBuf>,

    // Network
    pub rpc_host: String,
    pub rpc_port: u16,
    pub max_body_bytes: usize,

    // Artifacts; unset files resolve inside `artifacts_dir`
    pub artifacts_dir: PathBuf,
    pub encoding_maps_file: Option<PathBuf>,
    pub store_attributes_file: Option<PathBuf>,
    pub model_file: Option<PathBuf>,

    // Prediction
    pub max_batch_size: usize,
    pub join_miss_policy: JoinMissPolicy,
    pub unknown_category_policy: UnknownCategoryPolicy,

    // Observability
    pub log_level: String,
    pub log_format: String,
    pub prometheus_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_path: None,
            rpc_host: DEFAULT_RPC_HOST.to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            encoding_maps_file: None,
            store_attributes_file: None,
            model_file: None,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            join_miss_policy: JoinMissPolicy::default(),
            unknown_category_policy: UnknownCategoryPolicy::default(),
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            prometheus_enabled: true,
        }
    }
}

impl AppConfig {
    /// Layer the optional config file under `SALESCAST_*` environment variables.
    pub fn load(config_path_override: Option<&str>) -> Result<Self> {
        let resolved_path = if let Some(path) = config_path_override {
            let path = PathBuf::from(path);
            if !path.exists() {
                anyhow::bail!(
                    "Configuration file {} not found (specified via --config)",
                    path.display()
                );
            }
            Some(path)
        } else {
            let path = PathBuf::from(DEFAULT_CONFIG_PATH);
            path.exists().then_some(path)
        };

        let mut builder = Config::builder();
        if let Some(path) = &resolved_path {
            builder = builder.add_source(ConfigFile::from(path.as_path()));
        }
        builder = builder.add_source(Environment::with_prefix(ENV_PREFIX));

        let config = builder.build().context("failed to assemble configuration")?;
        let mut app = Self::from_config(&config)?;
        app.config_path = resolved_path;
        Ok(app)
    }

    fn from_config(config: &Config) -> Result<Self> {
        let defaults = Self::default();

        let unknown_category_mode = get_string_value(
            config,
            &["unknown_category_policy", "UNKNOWN_CATEGORY_POLICY", "prediction.unknown_category_policy"],
        )
        .unwrap_or_else(|| "passthrough".to_string());
        let unknown_category_code = get_parsed(
            config,
            &["unknown_category_code", "UNKNOWN_CATEGORY_CODE", "prediction.unknown_category_code"],
            DEFAULT_UNKNOWN_CATEGORY_CODE,
        )?;

        Ok(Self {
            config_path: None,
            rpc_host: get_string_value(config, &["rpc_host", "RPC_HOST", "rpc.host"])
                .unwrap_or(defaults.rpc_host),
            rpc_port: get_parsed(config, &["rpc_port", "RPC_PORT", "rpc.port"], defaults.rpc_port)?,
            max_body_bytes: get_parsed(
                config,
                &["max_body_bytes", "MAX_BODY_BYTES", "rpc.max_body_bytes"],
                defaults.max_body_bytes,
            )?,
            artifacts_dir: get_string_value(
                config,
                &["artifacts_dir", "ARTIFACTS_DIR", "artifacts.dir"],
            )
            .map(PathBuf::from)
            .unwrap_or(defaults.artifacts_dir),
            encoding_maps_file: get_string_value(
                config,
                &["encoding_maps_file", "ENCODING_MAPS_FILE", "artifacts.encoding_maps_file"],
            )
            .map(PathBuf::from),
            store_attributes_file: get_string_value(
                config,
                &[
                    "store_attributes_file",
                    "STORE_ATTRIBUTES_FILE",
                    "artifacts.store_attributes_file",
                ],
            )
            .map(PathBuf::from),
            model_file: get_string_value(config, &["model_file", "MODEL_FILE", "artifacts.model_file"])
                .map(PathBuf::from),
            max_batch_size: get_parsed(
                config,
                &["max_batch_size", "MAX_BATCH_SIZE", "prediction.max_batch_size"],
                defaults.max_batch_size,
            )?,
            join_miss_policy: get_parsed(
                config,
                &["join_miss_policy", "JOIN_MISS_POLICY", "prediction.join_miss_policy"],
                defaults.join_miss_policy,
            )?,
            unknown_category_policy: UnknownCategoryPolicy::parse(
                &unknown_category_mode,
                unknown_category_code,
            )
            .map_err(|err| anyhow!(err))?,
            log_level: get_string_value(config, &["log_level", "LOG_LEVEL", "log.level"])
                .unwrap_or(defaults.log_level),
            log_format: get_string_value(config, &["log_format", "LOG_FORMAT", "log.format"])
                .unwrap_or(defaults.log_format),
            prometheus_enabled: get_bool_value(
                config,
                &["prometheus_enabled", "PROMETHEUS_ENABLED", "metrics.prometheus_enabled"],
                defaults.prometheus_enabled,
            ),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_host.trim().is_empty() {
            anyhow::bail!("RPC_HOST must not be empty");
        }
        if self.rpc_port == 0 {
            anyhow::bail!("RPC_PORT must be greater than zero");
        }
        if self.artifacts_dir.as_os_str().is_empty() {
            anyhow::bail!("ARTIFACTS_DIR must not be empty");
        }
        if self.max_batch_size == 0 {
            anyhow::bail!("MAX_BATCH_SIZE must be greater than zero");
        }
        if self.max_body_bytes == 0 {
            anyhow::bail!("MAX_BODY_BYTES must be greater than zero");
        }
        if self.log_format != "pretty" && self.log_format != "json" {
            anyhow::bail!(
                "Invalid LOG_FORMAT '{}'; expected 'pretty' or 'json'",
                self.log_format
            );
        }
        if let UnknownCategoryPolicy::Sentinel(code) = self.unknown_category_policy {
            if !code.is_finite() {
                anyhow::bail!("UNKNOWN_CATEGORY_CODE must be a finite number");
            }
        }
        Ok(())
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        let resolve = |file: &Option<PathBuf>, default: &str| -> PathBuf {
            match file {
                Some(path) => self.artifacts_dir.join(path),
                None => self.artifacts_dir.join(default),
            }
        };
        ArtifactPaths {
            encoding_maps: resolve(&self.encoding_maps_file, DEFAULT_ENCODING_MAPS_FILE),
            store_attributes: resolve(&self.store_attributes_file, DEFAULT_STORE_ATTRIBUTES_FILE),
            model: resolve(&self.model_file, DEFAULT_MODEL_FILE),
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            max_batch_size: self.max_batch_size,
            policy: TransformPolicy {
                join_miss: self.join_miss_policy,
                unknown_category: self.unknown_category_policy,
            },
        }
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}

fn get_string_value(config: &Config, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        config
            .get_string(key)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn get_bool_value(config: &Config, keys: &[&str], default: bool) -> bool {
    for key in keys {
        if let Ok(value) = config.get_bool(key) {
            return value;
        }
        if let Ok(raw) = config.get_string(key) {
            if let Ok(parsed) = raw.parse::<bool>() {
                return parsed;
            }
        }
    }
    default
}

fn get_parsed<T>(config: &Config, keys: &[&str], default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    for key in keys {
        if let Some(raw) = get_string_value(config, &[key]) {
            return raw
                .parse()
                .map_err(|err| anyhow!("invalid value {raw:?} for {key}: {err}"));
        }
    }
    Ok(default)
}
