//! Configuration module
//!
//! This module provides the configuration structures for the API server and the
//! processing pipeline: listening port, CORS, storage directories, upload
//! limits and the external analysis command.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::constants::*;

/// Server-level configuration
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    /// Per-request timeout in seconds. 0 = disabled.
    pub request_timeout_secs: u64,
}

/// Upload, storage and external analysis configuration
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub base: BaseConfig,
    // Storage configuration
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub max_upload_size_bytes: u64,
    // External analysis step
    pub analysis_program: String,
    pub analysis_args: Vec<String>,
    pub analysis_workdir: Option<PathBuf>,
    pub analysis_timeout_secs: u64,
    pub output_image_extension: String,
    pub output_document_extension: String,
    pub capture_max_lines: usize,
    pub max_concurrent_jobs: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                server_port: DEFAULT_PORT,
                cors_origins: vec!["http://localhost:3000".to_string()],
                environment: "development".to_string(),
                request_timeout_secs: 0,
            },
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_upload_size_bytes: DEFAULT_MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            analysis_program: DEFAULT_ANALYSIS_PROGRAM.to_string(),
            analysis_args: split_args(DEFAULT_ANALYSIS_ARGS),
            analysis_workdir: None,
            analysis_timeout_secs: DEFAULT_ANALYSIS_TIMEOUT_SECS,
            output_image_extension: DEFAULT_IMAGE_EXTENSION.to_string(),
            output_document_extension: DEFAULT_DOCUMENT_EXTENSION.to_string(),
            capture_max_lines: DEFAULT_CAPTURE_MAX_LINES,
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<PipelineConfig>);

impl Config {
    pub fn new(config: PipelineConfig) -> Self {
        Config(Box::new(config))
    }

    fn as_pipeline(&self) -> &PipelineConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_name(&self.as_pipeline().base.environment)
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = PipelineConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_pipeline().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.as_pipeline().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_pipeline().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_pipeline().base.environment
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        match self.as_pipeline().base.request_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn upload_dir(&self) -> &PathBuf {
        &self.as_pipeline().upload_dir
    }

    pub fn output_dir(&self) -> &PathBuf {
        &self.as_pipeline().output_dir
    }

    pub fn max_upload_size_bytes(&self) -> u64 {
        self.as_pipeline().max_upload_size_bytes
    }

    pub fn analysis_program(&self) -> &str {
        &self.as_pipeline().analysis_program
    }

    pub fn analysis_args(&self) -> &[String] {
        &self.as_pipeline().analysis_args
    }

    pub fn analysis_workdir(&self) -> Option<&PathBuf> {
        self.as_pipeline().analysis_workdir.as_ref()
    }

    pub fn analysis_timeout(&self) -> Duration {
        Duration::from_secs(self.as_pipeline().analysis_timeout_secs)
    }

    pub fn output_image_extension(&self) -> &str {
        &self.as_pipeline().output_image_extension
    }

    pub fn output_document_extension(&self) -> &str {
        &self.as_pipeline().output_document_extension
    }

    pub fn capture_max_lines(&self) -> usize {
        self.as_pipeline().capture_max_lines
    }

    pub fn max_concurrent_jobs(&self) -> usize {
        self.as_pipeline().max_concurrent_jobs
    }
}

fn is_production_name(environment: &str) -> bool {
    let environment = environment.to_lowercase();
    environment == "production" || environment == "prod"
}

fn split_args(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(String::from).collect()
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, anyhow::Error> {
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{} must be a valid number, got '{}'", key, raw)),
        _ => Ok(default),
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (environment, map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, anyhow::Error> {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins_str =
            lookup("CORS_ORIGINS").unwrap_or_else(|| "http://localhost:3000".to_string());
        if is_production_name(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let max_upload_size_mb = parse_or(&lookup, "MAX_UPLOAD_SIZE_MB", DEFAULT_MAX_UPLOAD_SIZE_MB)?;

        let base = BaseConfig {
            server_port: parse_or(&lookup, "PORT", DEFAULT_PORT)?,
            cors_origins,
            environment,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 0)?,
        };

        Ok(PipelineConfig {
            base,
            upload_dir: PathBuf::from(
                lookup("UPLOAD_DIR").unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string()),
            ),
            output_dir: PathBuf::from(
                lookup("OUTPUT_DIR").unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string()),
            ),
            max_upload_size_bytes: max_upload_size_mb.saturating_mul(1024 * 1024),
            analysis_program: lookup("ANALYSIS_PROGRAM")
                .unwrap_or_else(|| DEFAULT_ANALYSIS_PROGRAM.to_string()),
            analysis_args: split_args(
                &lookup("ANALYSIS_ARGS").unwrap_or_else(|| DEFAULT_ANALYSIS_ARGS.to_string()),
            ),
            analysis_workdir: lookup("ANALYSIS_WORKDIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            analysis_timeout_secs: parse_or(
                &lookup,
                "ANALYSIS_TIMEOUT_SECS",
                DEFAULT_ANALYSIS_TIMEOUT_SECS,
            )?,
            output_image_extension: lookup("OUTPUT_IMAGE_EXTENSION")
                .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string())
                .trim()
                .trim_start_matches('.')
                .to_lowercase(),
            output_document_extension: lookup("OUTPUT_DOCUMENT_EXTENSION")
                .unwrap_or_else(|| DEFAULT_DOCUMENT_EXTENSION.to_string())
                .trim()
                .trim_start_matches('.')
                .to_lowercase(),
            capture_max_lines: parse_or(&lookup, "CAPTURE_MAX_LINES", DEFAULT_CAPTURE_MAX_LINES)?,
            max_concurrent_jobs: parse_or(
                &lookup,
                "MAX_CONCURRENT_JOBS",
                DEFAULT_MAX_CONCURRENT_JOBS,
            )?,
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("MAX_UPLOAD_SIZE_MB must be greater than 0"));
        }

        if self.analysis_program.trim().is_empty() {
            return Err(anyhow::anyhow!("ANALYSIS_PROGRAM must not be empty"));
        }

        if self.analysis_timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "ANALYSIS_TIMEOUT_SECS must be greater than 0; unbounded runs are not allowed"
            ));
        }

        if self.max_concurrent_jobs == 0 {
            return Err(anyhow::anyhow!("MAX_CONCURRENT_JOBS must be greater than 0"));
        }

        for (key, ext) in [
            ("OUTPUT_IMAGE_EXTENSION", &self.output_image_extension),
            ("OUTPUT_DOCUMENT_EXTENSION", &self.output_document_extension),
        ] {
            if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(anyhow::anyhow!(
                    "{} must be a non-empty alphanumeric extension, got '{}'",
                    key,
                    ext
                ));
            }
        }

        if self.output_image_extension == self.output_document_extension {
            return Err(anyhow::anyhow!(
                "OUTPUT_IMAGE_EXTENSION and OUTPUT_DOCUMENT_EXTENSION must differ"
            ));
        }

        if self.upload_dir == self.output_dir {
            return Err(anyhow::anyhow!("UPLOAD_DIR and OUTPUT_DIR must be different directories"));
        }

        if is_production_name(&self.base.environment)
            && self.base.cors_origins.iter().any(|o| o == "*")
        {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot contain '*' in production"
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = PipelineConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.base.server_port, 5000);
        assert_eq!(config.max_upload_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.analysis_program, "python3");
        assert_eq!(config.analysis_args, vec!["python_scripts/process_xrd.py"]);
        assert_eq!(config.output_image_extension, "jpg");
        assert_eq!(config.output_document_extension, "pdf");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parses_overrides() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("PORT", "8080"),
            ("MAX_UPLOAD_SIZE_MB", "2"),
            ("ANALYSIS_PROGRAM", "./venv/bin/python"),
            ("ANALYSIS_ARGS", "peakfinding.py  --quiet"),
            ("ANALYSIS_TIMEOUT_SECS", "30"),
            ("OUTPUT_IMAGE_EXTENSION", ".PNG"),
            ("CORS_ORIGINS", "http://a.test, http://b.test"),
        ]))
        .unwrap();

        assert_eq!(config.base.server_port, 8080);
        assert_eq!(config.max_upload_size_bytes, 2 * 1024 * 1024);
        assert_eq!(config.analysis_args, vec!["peakfinding.py", "--quiet"]);
        assert_eq!(config.analysis_timeout_secs, 30);
        assert_eq!(config.output_image_extension, "png");
        assert_eq!(config.base.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn test_invalid_number_is_error() {
        let result = PipelineConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_wildcard_cors_rejected_in_production() {
        let result = PipelineConfig::from_lookup(lookup_from(&[
            ("ENVIRONMENT", "production"),
            ("CORS_ORIGINS", "*"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config =
            PipelineConfig::from_lookup(lookup_from(&[("ANALYSIS_TIMEOUT_SECS", "0")])).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_same_extensions() {
        let config = PipelineConfig::from_lookup(lookup_from(&[
            ("OUTPUT_IMAGE_EXTENSION", "pdf"),
            ("OUTPUT_DOCUMENT_EXTENSION", "pdf"),
        ]))
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_request_timeout_zero_disables() {
        let config = Config::new(PipelineConfig::default());
        assert!(config.request_timeout().is_none());
        assert!(!config.is_production());
    }
}
