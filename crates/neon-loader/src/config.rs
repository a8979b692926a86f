//! Loader configuration: defaults, JSON file, environment overrides.

use crate::dom::html::MEDIA_BOX_SELECTOR;
use crate::error::LoaderError;
use crate::observer::ObserverOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Markup conventions recognized by the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Markers {
    /// Pending image URL attribute.
    pub pending_src: String,
    /// Pending URL-set attribute (on `img` or `source`).
    pub pending_srcset: String,
    /// Marker attribute for lazily initialized charts.
    pub chart_attr: String,
    /// Selector recognizing carousel widgets.
    pub carousel_selector: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            pending_src: "data-src".to_string(),
            pending_srcset: "data-srcset".to_string(),
            chart_attr: "data-lazy-chart".to_string(),
            carousel_selector: ".carousel".to_string(),
        }
    }
}

/// Status classes toggled on elements for external styling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusClasses {
    pub loading: String,
    pub loaded: String,
    pub error: String,
}

impl Default for StatusClasses {
    fn default() -> Self {
        Self {
            loading: "loading".to_string(),
            loaded: "loaded".to_string(),
            error: "error".to_string(),
        }
    }
}

/// Full loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Look-ahead margin around the viewport, in pixels.
    pub root_margin: f64,
    /// Fraction of an element that must be inside the look-ahead region.
    pub threshold: f64,
    pub placeholder_width: u32,
    pub placeholder_height: u32,
    /// Duration of the opacity fade-in applied after load.
    pub fade_ms: u32,
    /// Per-fetch timeout; `0` disables it.
    pub fetch_timeout_ms: u64,
    pub markers: Markers,
    pub classes: StatusClasses,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            root_margin: 50.0,
            threshold: 0.1,
            placeholder_width: 300,
            placeholder_height: 200,
            fade_ms: 300,
            fetch_timeout_ms: 15_000,
            markers: Markers::default(),
            classes: StatusClasses::default(),
        }
    }
}

impl LoaderConfig {
    /// Load from an explicit path, or from `~/.neon-loader/config.json` if
    /// present, then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Apply `NEON_LOADER_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("NEON_LOADER_ROOT_MARGIN") {
            self.root_margin = v
                .parse()
                .with_context(|| format!("NEON_LOADER_ROOT_MARGIN={v}"))?;
        }
        if let Ok(v) = std::env::var("NEON_LOADER_THRESHOLD") {
            self.threshold = v
                .parse()
                .with_context(|| format!("NEON_LOADER_THRESHOLD={v}"))?;
        }
        if let Ok(v) = std::env::var("NEON_LOADER_FETCH_TIMEOUT_MS") {
            self.fetch_timeout_ms = v
                .parse()
                .with_context(|| format!("NEON_LOADER_FETCH_TIMEOUT_MS={v}"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), LoaderError> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(LoaderError::Config(format!(
                "threshold must be within 0..=1, got {}",
                self.threshold
            )));
        }
        if !self.root_margin.is_finite() || self.root_margin < 0.0 {
            return Err(LoaderError::Config(format!(
                "root_margin must be a non-negative number, got {}",
                self.root_margin
            )));
        }
        if self.placeholder_width == 0 || self.placeholder_height == 0 {
            return Err(LoaderError::Config(
                "placeholder dimensions must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn observer_options(&self) -> ObserverOptions {
        ObserverOptions {
            root: None,
            root_margin: self.root_margin,
            threshold: self.threshold,
        }
    }

    /// Selector for elements that take part in page layout: media plus
    /// the configured chart and carousel markers.
    pub fn box_selector(&self) -> String {
        format!(
            "{MEDIA_BOX_SELECTOR}, [{}], {}",
            self.markers.chart_attr, self.markers.carousel_selector
        )
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        (self.fetch_timeout_ms > 0).then(|| Duration::from_millis(self.fetch_timeout_ms))
    }
}

/// `~/.neon-loader/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".neon-loader")
        .join("config.json")
}
