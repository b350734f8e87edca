//! Job configuration loading.
//!
//! Loads transfer jobs from YAML files in config/jobs/

use std::path::Path;

use ocean_common::time::parse_datetime;
use ocean_common::{BoundingBox, TimeRange};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::ConfigError;
use crate::planner::Granularity;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::source::ErddapConfig;
use crate::staging::DEFAULT_TIME_CHUNK;

/// Root configuration loaded from a job YAML file.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub job: JobInfo,
    pub source: SourceConfig,
    #[serde(default)]
    pub window: Option<WindowConfig>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub staging: StagingConfig,
}

/// Job identification.
#[derive(Debug, Clone, Deserialize)]
pub struct JobInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Where chunks come from.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    Erddap(ErddapConfig),
    S3Prefix(S3PrefixConfig),
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3PrefixConfig {
    pub bucket: String,
    pub prefix: String,
    /// Only keys ending with this suffix are planned.
    #[serde(default)]
    pub suffix: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

/// Time domain for windowed sources.
#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub start: String,
    pub end: String,
    pub granularity: Granularity,
}

impl WindowConfig {
    pub fn time_range(&self) -> Result<TimeRange, ConfigError> {
        let parse = |s: &str| {
            parse_datetime(s).map_err(|e| ConfigError::Invalid {
                job: String::new(),
                reason: e.to_string(),
            })
        };
        Ok(TimeRange::new(parse(&self.start)?, parse(&self.end)?))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
}

fn default_bucket() -> String {
    "panthalassa-ocean-raw-data".to_string()
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    /// Time steps per block in staged grids.
    #[serde(default = "default_time_chunk")]
    pub time_chunk: usize,
}

fn default_time_chunk() -> usize {
    DEFAULT_TIME_CHUNK
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            time_chunk: default_time_chunk(),
        }
    }
}

impl JobConfig {
    /// Load and validate a job from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;

        debug!(job = %config.job.id, path = %path.display(), "Loaded job config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: JobConfig =
            serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
                path: Default::default(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn id(&self) -> &str {
        &self.job.id
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            job: self.job.id.clone(),
            reason,
        };

        if self.job.id.trim().is_empty() || self.job.id.contains(['/', '\\']) {
            return Err(invalid(format!("job id {:?} is not a file name", self.job.id)));
        }
        self.retry_policy()?;
        if let Some(bbox) = &self.bbox {
            bbox.validate().map_err(|e| invalid(e.to_string()))?;
        }
        if self.staging.time_chunk == 0 {
            return Err(invalid("staging.time_chunk must be at least 1".to_string()));
        }

        match &self.source {
            SourceConfig::Erddap(erddap) => {
                if erddap.variables.is_empty() {
                    return Err(invalid("erddap source lists no variables".to_string()));
                }
                let window = self
                    .window
                    .as_ref()
                    .ok_or_else(|| invalid("erddap source requires a window".to_string()))?;
                window.granularity.validate().map_err(|e| invalid(e.to_string()))?;
                self.domain()?;
            }
            SourceConfig::S3Prefix(s3) => {
                if s3.bucket.is_empty() {
                    return Err(invalid("s3_prefix source requires a bucket".to_string()));
                }
                let grib_suffix = s3
                    .suffix
                    .as_deref()
                    .is_some_and(|s| s.ends_with(".grib2") || s.ends_with(".grb2"));
                if self.bbox.is_some() && !grib_suffix {
                    return Err(invalid(
                        "bbox on an s3_prefix source needs a .grib2 suffix".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        self.retry.policy().map_err(|e| ConfigError::Invalid {
            job: self.job.id.clone(),
            reason: e.to_string(),
        })
    }

    /// Time domain of the job, if it has a window.
    pub fn domain(&self) -> Result<Option<TimeRange>, ConfigError> {
        self.window
            .as_ref()
            .map(|w| {
                w.time_range().map_err(|e| match e {
                    ConfigError::Invalid { reason, .. } => ConfigError::Invalid {
                        job: self.job.id.clone(),
                        reason,
                    },
                    other => other,
                })
            })
            .transpose()
    }
}

/// Load all enabled jobs from `{config_dir}/jobs`.
///
/// Files that fail to parse or validate are logged and skipped.
pub fn load_job_configs(config_dir: &Path) -> Result<Vec<JobConfig>, ConfigError> {
    let jobs_dir = config_dir.join("jobs");

    if !jobs_dir.exists() {
        warn!(path = %jobs_dir.display(), "Jobs config directory not found");
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(&jobs_dir).map_err(|source| ConfigError::Read {
        path: jobs_dir.clone(),
        source,
    })?;
    let mut paths: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
        })
        .collect();
    paths.sort();

    let mut configs = Vec::new();
    for path in paths {
        match JobConfig::load(&path) {
            Ok(config) => {
                if config.job.enabled {
                    info!(
                        job = %config.job.id,
                        name = %config.job.name,
                        "Loaded job configuration"
                    );
                    configs.push(config);
                } else {
                    debug!(job = %config.job.id, "Skipping disabled job");
                }
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load job config");
            }
        }
    }

    info!(count = configs.len(), "Loaded job configurations");
    Ok(configs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    const COPERNICUS: &str = r#"
job:
  id: copernicus-japan
  name: "Copernicus wave reanalysis, Japan"

source:
  type: erddap
  base_url: http://localhost:8080/erddap
  dataset_id: cmems_mod_glo_wav_my_0.2deg_PT3H-i
  variables: [VHM0, VTPK]

window:
  start: "1980-01-01T21:00:00Z"
  end: "2023-04-30T21:00:00Z"
  granularity:
    months: 1

bbox:
  min_lon: 124.52
  min_lat: 16.745
  max_lon: 144.6
  max_lat: 48.185

destination:
  bucket: panthalassa-ocean-raw-data
  prefix: copernicus
"#;

    const NOAA: &str = r#"
job:
  id: noaa-gefs-2019
  name: "NOAA GEFS wave reforecast 2019"
  enabled: false

source:
  type: s3_prefix
  bucket: noaa-nws-gefswaves-reforecast-pds
  prefix: GEFSv12/reforecast/2019/
  suffix: .grib2

bbox:
  min_lon: -130.0
  min_lat: 25.0
  max_lon: -120.0
  max_lat: 30.0

destination:
  prefix: noaa-data/2019/

retry:
  max_attempts: 5
  delay_secs: 2.5
"#;

    #[test]
    fn test_parse_erddap_job() {
        let config = JobConfig::from_yaml(COPERNICUS).unwrap();
        assert_eq!(config.id(), "copernicus-japan");
        assert!(config.job.enabled);
        assert_eq!(config.staging.time_chunk, 50);
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());

        let window = config.window.as_ref().unwrap();
        assert_eq!(window.granularity, Granularity::Months(1));
        let domain = config.domain().unwrap().unwrap();
        assert_eq!(domain.start, Utc.with_ymd_and_hms(1980, 1, 1, 21, 0, 0).unwrap());

        match &config.source {
            SourceConfig::Erddap(erddap) => {
                assert_eq!(erddap.variables, vec!["VHM0", "VTPK"]);
                assert_eq!(erddap.stride, 1);
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_parse_s3_prefix_job() {
        let config = JobConfig::from_yaml(NOAA).unwrap();
        assert!(!config.job.enabled);
        assert_eq!(config.destination.bucket, "panthalassa-ocean-raw-data");
        assert_eq!(config.destination.prefix, "noaa-data/2019/");

        let policy = config.retry_policy().unwrap();
        assert_eq!(policy.max_attempts(), 5);
        assert_eq!(policy.delay(), Duration::from_millis(2500));

        match &config.source {
            SourceConfig::S3Prefix(s3) => {
                assert_eq!(s3.suffix.as_deref(), Some(".grib2"));
                assert_eq!(s3.region, "us-east-1");
            }
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(
            config.bbox,
            Some(BoundingBox::new(-130.0, 25.0, -120.0, 30.0))
        );
    }

    #[test]
    fn test_s3_bbox_needs_grib_suffix() {
        let yaml = NOAA.replace("  suffix: .grib2\n", "");
        let err = JobConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains(".grib2 suffix"));

        let yaml = NOAA.replace("suffix: .grib2", "suffix: .idx");
        assert!(JobConfig::from_yaml(&yaml).is_err());
    }

    #[test]
    fn test_shipped_job_configs_load() {
        let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");
        let configs = load_job_configs(&config_dir).unwrap();
        let ids: Vec<&str> = configs.iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["copernicus-japan", "noaa-gefs-2019"]);

        let window = configs[0].window.as_ref().unwrap();
        assert_eq!(window.granularity, Granularity::Months(1));
        assert_eq!(
            configs[0].bbox,
            Some(BoundingBox::new(124.52, 16.745, 144.6, 48.185))
        );
        assert!(configs[1].bbox.is_some());
    }

    #[test]
    fn test_invalid_retry_rejected() {
        let yaml = NOAA.replace("max_attempts: 5", "max_attempts: 0");
        assert!(matches!(
            JobConfig::from_yaml(&yaml),
            Err(ConfigError::Invalid { .. })
        ));

        let yaml = NOAA.replace("delay_secs: 2.5", "delay_secs: -1");
        assert!(matches!(
            JobConfig::from_yaml(&yaml),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_erddap_requires_window() {
        let yaml = COPERNICUS.replace("window:", "unused_window:");
        let err = JobConfig::from_yaml(&yaml).unwrap_err();
        assert!(err.to_string().contains("requires a window"));
    }

    #[test]
    fn test_bad_window_time() {
        let yaml = COPERNICUS.replace("1980-01-01T21:00:00Z", "soon");
        assert!(matches!(
            JobConfig::from_yaml(&yaml),
            Err(ConfigError::Invalid { job, .. }) if job == "copernicus-japan"
        ));
    }

    #[test]
    fn test_load_job_configs_skips_disabled_and_broken() {
        let dir = tempfile::TempDir::new().unwrap();
        let jobs = dir.path().join("jobs");
        std::fs::create_dir(&jobs).unwrap();
        std::fs::write(jobs.join("copernicus.yaml"), COPERNICUS).unwrap();
        std::fs::write(jobs.join("noaa.yml"), NOAA).unwrap();
        std::fs::write(jobs.join("broken.yaml"), "job: [").unwrap();
        std::fs::write(jobs.join("notes.txt"), "ignored").unwrap();

        let configs = load_job_configs(dir.path()).unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].id(), "copernicus-japan");
    }

    #[test]
    fn test_missing_jobs_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(load_job_configs(dir.path()).unwrap().is_empty());
    }
}
