use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::camera::ScanConfig;

const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/exec";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const DEFAULT_CAMERA_LABELS: [&str; 2] = ["Front Camera", "Back Camera"];

#[derive(Debug, Deserialize, Default)]
struct ScannerConfigFile {
    api: Option<ApiConfigFile>,
    scanner: Option<DecoderConfigFile>,
    cameras: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DecoderConfigFile {
    fps: Option<u32>,
    qrbox: Option<u32>,
    aspect_ratio: Option<f32>,
    disable_flip: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Roster service endpoint (resolve + save).
    pub api_url: String,
    pub http_timeout: Duration,
    pub scan: ScanConfig,
    /// Labels for the simulated cameras of the operator console.
    pub camera_labels: Vec<String>,
}

impl ScannerConfig {
    /// Defaults, then the JSON file named by `ATTENDANCE_CONFIG`, then
    /// `ATTENDANCE_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ATTENDANCE_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScannerConfigFile) -> Self {
        let defaults = ScanConfig::default();
        let api_url = file
            .api
            .as_ref()
            .and_then(|api| api.url.clone())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let http_timeout = Duration::from_secs(
            file.api
                .as_ref()
                .and_then(|api| api.timeout_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );
        let scan = match file.scanner {
            Some(scanner) => ScanConfig {
                fps: scanner.fps.unwrap_or(defaults.fps),
                qrbox: scanner.qrbox.unwrap_or(defaults.qrbox),
                aspect_ratio: scanner.aspect_ratio.unwrap_or(defaults.aspect_ratio),
                disable_flip: scanner.disable_flip.unwrap_or(defaults.disable_flip),
                ..defaults
            },
            None => defaults,
        };
        let camera_labels = file.cameras.unwrap_or_else(|| {
            DEFAULT_CAMERA_LABELS
                .iter()
                .map(|label| label.to_string())
                .collect()
        });
        Self {
            api_url,
            http_timeout,
            scan,
            camera_labels,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("ATTENDANCE_API_URL") {
            if !url.trim().is_empty() {
                self.api_url = url.trim().to_string();
            }
        }
        if let Ok(timeout) = std::env::var("ATTENDANCE_HTTP_TIMEOUT_SECS") {
            let seconds: u64 = timeout.trim().parse().map_err(|_| {
                anyhow!("ATTENDANCE_HTTP_TIMEOUT_SECS must be an integer number of seconds")
            })?;
            self.http_timeout = Duration::from_secs(seconds);
        }
        if let Ok(cameras) = std::env::var("ATTENDANCE_CAMERAS") {
            let parsed = split_csv(&cameras);
            if !parsed.is_empty() {
                self.camera_labels = parsed;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_url)
            .map_err(|e| anyhow!("invalid api url '{}': {}", self.api_url, e))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(anyhow!("api url must use http or https"));
        }
        if self.http_timeout.as_secs() == 0 {
            return Err(anyhow!("http timeout must be greater than zero"));
        }
        if self.scan.fps == 0 {
            return Err(anyhow!("scanner fps must be greater than zero"));
        }
        if self.scan.qrbox == 0 || self.scan.aspect_ratio <= 0.0 {
            return Err(anyhow!("scanner detection box must be non-empty"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ScannerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
