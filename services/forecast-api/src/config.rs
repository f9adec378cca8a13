//! Service configuration from command-line flags and environment variables.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use grid_processor::StepPolicy;

/// Forecast API server
#[derive(Parser, Debug, Clone)]
#[command(name = "forecast-api")]
#[command(about = "Nearest-point and bounding-box lookups over GRIB2 forecast files")]
pub struct Args {
    /// Listen address
    #[arg(long, default_value = "0.0.0.0", env = "FORECAST_LISTEN_ADDR")]
    pub listen: String,

    /// Listen port
    #[arg(short, long, default_value_t = 6000, env = "FORECAST_PORT")]
    pub port: u16,

    /// Root directory searched recursively for .grib/.grib2 files
    #[arg(long, default_value = "./forecasts", env = "FORECASTS_DIR")]
    pub forecasts_dir: PathBuf,

    /// Directory for the on-disk grid store (disabled when unset)
    #[arg(long, env = "FORECAST_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Files decoded in parallel
    #[arg(long, default_value_t = 2, env = "FORECAST_DECODE_WORKERS")]
    pub decode_workers: usize,

    /// Number of runtime worker threads
    #[arg(long, env = "FORECAST_WORKER_THREADS")]
    pub worker_threads: Option<usize>,

    /// In-memory grid cache budget in MiB
    #[arg(long, default_value_t = 512, env = "FORECAST_GRID_CACHE_MB")]
    pub grid_cache_mb: usize,

    /// Seconds between full cache clears
    #[arg(long, default_value_t = 3600, env = "FORECAST_CACHE_CLEAR_INTERVAL_SECS")]
    pub cache_clear_interval_secs: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 300, env = "FORECAST_REQUEST_TIMEOUT_SECS")]
    pub request_timeout_secs: u64,

    /// Forecast time adjustment for accumulated fields (unit-aware or legacy)
    #[arg(long, default_value_t = StepPolicy::UnitAware, env = "FORECAST_STEP_POLICY")]
    pub step_policy: StepPolicy,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,
}

/// Validated settings the service runs with.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen_addr: SocketAddr,
    pub forecasts_dir: PathBuf,
    pub cache_dir: Option<PathBuf>,
    pub decode_workers: usize,
    pub grid_cache_bytes: usize,
    /// Also the lifetime of a file listing.
    pub cache_clear_interval: Duration,
    pub request_timeout: Duration,
    pub step_policy: StepPolicy,
}

impl ServiceConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let ip: IpAddr = args
            .listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", args.listen))?;

        if args.decode_workers == 0 {
            bail!("decode workers must be at least 1");
        }
        if args.cache_clear_interval_secs == 0 {
            bail!("cache clear interval must be at least 1 second");
        }
        if args.request_timeout_secs == 0 {
            bail!("request timeout must be at least 1 second");
        }
        if args.worker_threads == Some(0) {
            bail!("worker threads must be at least 1");
        }

        Ok(Self {
            listen_addr: SocketAddr::new(ip, args.port),
            forecasts_dir: args.forecasts_dir.clone(),
            cache_dir: args.cache_dir.clone(),
            decode_workers: args.decode_workers,
            grid_cache_bytes: args.grid_cache_mb.saturating_mul(1024 * 1024),
            cache_clear_interval: Duration::from_secs(args.cache_clear_interval_secs),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            step_policy: args.step_policy,
        })
    }

    /// Defaults for serving `forecasts_dir`, without a disk store.
    pub fn for_forecasts_dir(forecasts_dir: impl Into<PathBuf>) -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 6000)),
            forecasts_dir: forecasts_dir.into(),
            cache_dir: None,
            decode_workers: 2,
            grid_cache_bytes: 512 * 1024 * 1024,
            cache_clear_interval: Duration::from_secs(3600),
            request_timeout: Duration::from_secs(300),
            step_policy: StepPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["forecast-api"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_explicit_flags() {
        let args = parse(&[
            "--listen",
            "127.0.0.1",
            "--port",
            "8080",
            "--forecasts-dir",
            "/data/forecasts",
            "--cache-dir",
            "/var/cache/forecast",
            "--grid-cache-mb",
            "64",
            "--step-policy",
            "legacy",
        ]);
        let config = ServiceConfig::from_args(&args).unwrap();

        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.forecasts_dir, PathBuf::from("/data/forecasts"));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/var/cache/forecast")));
        assert_eq!(config.grid_cache_bytes, 64 * 1024 * 1024);
        assert_eq!(config.step_policy, StepPolicy::Legacy);
    }

    #[test]
    fn test_zero_values_are_rejected() {
        for flag in [
            "--decode-workers",
            "--cache-clear-interval-secs",
            "--request-timeout-secs",
            "--worker-threads",
        ] {
            let args = parse(&[flag, "0"]);
            assert!(ServiceConfig::from_args(&args).is_err(), "{} 0 accepted", flag);
        }
    }

    #[test]
    fn test_bad_listen_address_is_rejected() {
        let args = parse(&["--listen", "not-an-ip"]);
        assert!(ServiceConfig::from_args(&args).is_err());
    }

    #[test]
    fn test_unknown_step_policy_fails_to_parse() {
        assert!(Args::try_parse_from(["forecast-api", "--step-policy", "weekly"]).is_err());
    }
}
