//! Environment-driven worker configuration.

use kerb_core::geo::BoundingBox;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {detail}")]
    Invalid { var: &'static str, detail: String },
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub db_max_connections: u32,
    /// Area to analyze, `min_lon,min_lat,max_lon,max_lat`.
    pub area: BoundingBox,
    /// Concurrent pipeline tasks, each owning a longitude strip.
    pub concurrency: usize,
    pub mapillary_access_token: String,
    /// Shared per-key quota across all tasks.
    pub mapillary_rate_limit_per_minute: u32,
    pub scorer_endpoint: String,
    pub scorer_model_name: String,
    pub scorer_model_version: String,
    pub scorer_rate_limit_per_minute: u32,
    /// Run the street collection phase before analysis.
    pub run_collection: bool,
    pub os_features_base_url: String,
    pub os_api_key: String,
    /// Spacing between derived analysis points along a road link.
    pub point_sample_interval_m: f64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let area_csv = required("AREA_BBOX")?;
        let area = parse_bbox(&area_csv)?;
        let run_collection = optional("RUN_COLLECTION")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        let (os_features_base_url, os_api_key) = if run_collection {
            (required("OS_FEATURES_BASE_URL")?, required("OS_API_KEY")?)
        } else {
            (
                optional("OS_FEATURES_BASE_URL").unwrap_or_default(),
                optional("OS_API_KEY").unwrap_or_default(),
            )
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", 10)?,
            area,
            concurrency: parsed("WORKER_CONCURRENCY", 4usize)?.max(1),
            mapillary_access_token: required("MAPILLARY_ACCESS_TOKEN")?,
            mapillary_rate_limit_per_minute: parsed("MAPILLARY_RATE_LIMIT_PER_MINUTE", 600)?,
            scorer_endpoint: required("SCORER_ENDPOINT")?,
            scorer_model_name: optional("SCORER_MODEL_NAME")
                .unwrap_or_else(|| "road-scorer".to_string()),
            scorer_model_version: optional("SCORER_MODEL_VERSION")
                .unwrap_or_else(|| "unknown".to_string()),
            scorer_rate_limit_per_minute: parsed("SCORER_RATE_LIMIT_PER_MINUTE", 600)?,
            run_collection,
            os_features_base_url,
            os_api_key,
            point_sample_interval_m: parsed("POINT_SAMPLE_INTERVAL_M", 20.0)?,
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::MissingVar(var))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty())
}

fn parsed<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional(var) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            detail: e.to_string(),
        }),
    }
}

fn parse_bbox(csv: &str) -> Result<BoundingBox, ConfigError> {
    let parts: Vec<f64> = csv
        .split(',')
        .map(|p| p.trim().parse())
        .collect::<Result<_, _>>()
        .map_err(|e: std::num::ParseFloatError| ConfigError::Invalid {
            var: "AREA_BBOX",
            detail: e.to_string(),
        })?;
    let [min_lon, min_lat, max_lon, max_lat] = parts[..] else {
        return Err(ConfigError::Invalid {
            var: "AREA_BBOX",
            detail: format!("expected 4 comma-separated values, got {}", parts.len()),
        });
    };
    BoundingBox::new(min_lon, min_lat, max_lon, max_lat).map_err(|e| ConfigError::Invalid {
        var: "AREA_BBOX",
        detail: e.to_string(),
    })
}
