use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use salescast_forecast_core::PredictionService;
use salescast_rpc::{describe_metrics, start_server, AppState};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod settings;
mod version;

use settings::AppConfig;
use version::{git_commit_hash, SALESCAST_VERSION};

fn cli() -> Command {
    Command::new("salescast")
        .version(SALESCAST_VERSION)
        .about("Store sales prediction service")
        .disable_version_flag(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path (default: config/salescast.toml if present)"),
        )
        .arg(
            Arg::new("version_flag")
                .short('V')
                .long("version")
                .action(ArgAction::SetTrue)
                .help("Print detailed version information and exit"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Load configuration and artifacts, report, then exit"),
        )
        .arg(
            Arg::new("rpc-host")
                .long("rpc-host")
                .value_name("HOST")
                .help("Override HTTP bind host"),
        )
        .arg(
            Arg::new("rpc-port")
                .long("rpc-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Override HTTP port"),
        )
        .arg(
            Arg::new("artifacts-dir")
                .long("artifacts-dir")
                .value_name("DIR")
                .help("Directory holding the encoding maps, store attributes and model"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format"),
        )
        .arg(
            Arg::new("disable-metrics")
                .long("disable-metrics")
                .action(ArgAction::SetTrue)
                .help("Disable the Prometheus metrics recorder"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    run(cli().get_matches()).await
}

async fn run(matches: clap::ArgMatches) -> Result<()> {
    if matches.get_flag("version_flag") {
        print_version_info();
        return Ok(());
    }

    let config = load_config_with_overrides(&matches)?;

    init_logging(&config)?;

    if matches.get_flag("check") {
        return run_self_check(&config);
    }

    let prometheus_handle = init_metrics(&config);

    info!("Starting salescast {}", SALESCAST_VERSION);
    if let Some(path) = config.config_path() {
        info!("Configuration file: {}", path.display());
    }
    info!("Artifacts directory: {}", config.artifacts_dir.display());

    let service =
        PredictionService::from_artifacts(&config.artifact_paths(), config.service_config());
    if let Some(reason) = service.unready_reason() {
        warn!(
            "Serving in unready state; /predict answers 503 until restarted with valid artifacts: {}",
            reason
        );
    }

    let mut state = AppState::new(service);
    state.metrics = prometheus_handle;
    state.max_body_bytes = config.max_body_bytes;

    start_server(state, &config.rpc_addr(), shutdown_signal()).await?;

    info!("salescast shutdown complete");
    Ok(())
}

fn load_config_with_overrides(matches: &clap::ArgMatches) -> Result<AppConfig> {
    let config_path = matches
        .get_one::<String>("config")
        .map(|value| value.as_str());
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(matches, &mut config);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if let Some(rpc_host) = matches.get_one::<String>("rpc-host") {
        config.rpc_host = rpc_host.clone();
    }

    if let Some(rpc_port) = matches.get_one::<u16>("rpc-port") {
        config.rpc_port = *rpc_port;
    }

    if let Some(dir) = matches.get_one::<String>("artifacts-dir") {
        config.artifacts_dir = PathBuf::from(dir);
    }

    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    if matches.get_flag("disable-metrics") {
        config.prometheus_enabled = false;
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down salescast"),
        Err(err) => {
            error!("Failed to listen for Ctrl-C: {}", err);
            std::future::pending::<()>().await;
        }
    }
}

fn print_version_info() {
    println!("salescast {} (commit {})", SALESCAST_VERSION, git_commit_hash());
}

/// Load everything the server would load and report; fails when unready.
fn run_self_check(config: &AppConfig) -> Result<()> {
    println!("Running salescast self-check...");
    let paths = config.artifact_paths();
    println!("  encoding maps:    {}", paths.encoding_maps.display());
    println!("  store attributes: {}", paths.store_attributes.display());
    println!("  model:            {}", paths.model.display());

    let service = PredictionService::from_artifacts(&paths, config.service_config());
    match service.context() {
        Some(context) => {
            println!("  stores loaded:    {}", context.store_count());
            let maps = context.transformer().maps();
            println!(
                "  encoded columns:  {} ({})",
                maps.len(),
                maps.column_names().collect::<Vec<_>>().join(", ")
            );
            println!("  model hash:       {}", context.model_hash());
            println!("Self-check passed; listening address would be {}", config.rpc_addr());
            Ok(())
        }
        None => {
            let reason = service.unready_reason().unwrap_or("unknown");
            anyhow::bail!("Self-check failed: {reason}")
        }
    }
}

fn init_metrics(config: &AppConfig) -> Option<PrometheusHandle> {
    if !config.prometheus_enabled {
        info!("Prometheus metrics exporter disabled via configuration");
        return None;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics exporter registered");
            describe_metrics();
            Some(handle)
        }
        Err(err) => {
            warn!("Failed to install Prometheus metrics exporter: {}", err);
            None
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn cli_overrides_take_precedence() {
        let matches = cli()
            .try_get_matches_from([
                "salescast",
                "--rpc-port",
                "9100",
                "--artifacts-dir",
                "/tmp/artifacts",
                "--log-format",
                "json",
                "--disable-metrics",
            ])
            .unwrap();
        let mut config = AppConfig::default();
        apply_overrides(&matches, &mut config);

        assert_eq!(config.rpc_port, 9100);
        assert_eq!(config.artifacts_dir, PathBuf::from("/tmp/artifacts"));
        assert_eq!(config.log_format, "json");
        assert!(!config.prometheus_enabled);
        assert_eq!(config.rpc_host, "127.0.0.1");
    }

    #[test]
    fn cli_rejects_unknown_log_format() {
        assert!(cli()
            .try_get_matches_from(["salescast", "--log-format", "xml"])
            .is_err());
    }

    #[tokio::test]
    async fn version_flag_does_not_need_valid_config() {
        let matches = cli()
            .try_get_matches_from([
                "salescast",
                "--version",
                "--config",
                "/nonexistent/salescast.toml",
            ])
            .unwrap();
        run(matches).await.unwrap();
    }

    #[test]
    fn self_check_passes_with_sample_artifacts() {
        let config = AppConfig {
            artifacts_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../artifacts"),
            ..AppConfig::default()
        };
        run_self_check(&config).unwrap();
    }

    #[test]
    fn self_check_fails_without_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            artifacts_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        let err = run_self_check(&config).unwrap_err();
        assert!(err.to_string().starts_with("Self-check failed"));
    }
}
