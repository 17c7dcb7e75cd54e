use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Body namespace of the `circuitStatus` operation.
pub const DEFAULT_NAMESPACE: &str = "http://1.179.233.116/soap/#Service_Solarwinds_gin";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does not read `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Parsing and validation live here, independent of the process environment,
/// so tests can drive it with a plain `HashMap`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        or_default(var, default)
            .parse::<SocketAddr>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let dir_or_temp = |var: &str| -> PathBuf {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map_or_else(std::env::temp_dir, PathBuf::from)
    };

    let telemetry_url = require("CIRCREP_TELEMETRY_URL")?;
    let telemetry_soap_action = lookup("CIRCREP_TELEMETRY_SOAP_ACTION")
        .unwrap_or_else(|_| format!("{}/circuitStatus", telemetry_url.trim_end_matches('/')));
    let telemetry_namespace = or_default("CIRCREP_TELEMETRY_NAMESPACE", DEFAULT_NAMESPACE);
    let telemetry_timeout_secs = parse_u64("CIRCREP_TELEMETRY_TIMEOUT_SECS", "10")?;
    if telemetry_timeout_secs == 0 {
        return Err(invalid(
            "CIRCREP_TELEMETRY_TIMEOUT_SECS",
            "must be greater than zero".to_string(),
        ));
    }
    let telemetry_max_retries = parse_u32("CIRCREP_TELEMETRY_MAX_RETRIES", "0")?;
    let telemetry_retry_backoff_ms = parse_u64("CIRCREP_TELEMETRY_RETRY_BACKOFF_MS", "500")?;

    let env = parse_environment(&or_default("CIRCREP_ENV", "development"))?;
    let bind_addr = parse_addr("CIRCREP_BIND_ADDR", "0.0.0.0:5050")?;
    let log_level = or_default("CIRCREP_LOG_LEVEL", "info");

    let work_dir = dir_or_temp("CIRCREP_WORK_DIR");
    let archive_dir = dir_or_temp("CIRCREP_ARCHIVE_DIR");

    let job_retention_hours = parse_u64("CIRCREP_JOB_RETENTION_HOURS", "24")?;
    if job_retention_hours == 0 {
        return Err(invalid(
            "CIRCREP_JOB_RETENTION_HOURS",
            "must be greater than zero".to_string(),
        ));
    }
    let default_sweep = (job_retention_hours.saturating_mul(3600) / 2).to_string();
    let sweep_interval_secs = parse_u64("CIRCREP_SWEEP_INTERVAL_SECS", &default_sweep)?;
    let max_upload_bytes = parse_usize("CIRCREP_MAX_UPLOAD_BYTES", "20971520")?;
    let report_font_path = lookup("CIRCREP_REPORT_FONT_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from);

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        telemetry_url,
        telemetry_soap_action,
        telemetry_namespace,
        telemetry_timeout_secs,
        telemetry_max_retries,
        telemetry_retry_backoff_ms,
        work_dir,
        archive_dir,
        job_retention_hours,
        sweep_interval_secs,
        max_upload_bytes,
        report_font_path,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "CIRCREP_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
