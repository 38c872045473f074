//! Configuration file structure (capsule.toml).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use capsule_preview::SandboxPipeline;
use capsule_sandbox::{Sandbox, SandboxConfig};
use capsule_transform::{OxcEngine, TransformContext, Transformer};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConfigFile {
    #[serde(default)]
    pub preview: PreviewSettings,
    #[serde(default)]
    pub source: SourceSettings,
    #[serde(default)]
    pub sandbox: SandboxSettings,
    #[serde(default)]
    pub transform: TransformSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreviewSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_open")]
    pub open: bool,
    /// Set to an empty string to disable the CDN
    #[serde(default = "default_tailwind_cdn")]
    pub tailwind_cdn: String,
    pub assets_dir: Option<PathBuf>,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            open: default_open(),
            tailwind_cdn: default_tailwind_cdn(),
            assets_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceSettings {
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            path: default_source_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SandboxSettings {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_heap_mb")]
    pub max_heap_mb: usize,
    #[serde(default = "default_capture_console")]
    pub capture_console: bool,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_heap_mb: default_max_heap_mb(),
            capture_console: default_capture_console(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformSettings {
    #[serde(default = "default_filename")]
    pub filename: String,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            filename: default_filename(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7878
}
fn default_open() -> bool {
    true
}
fn default_tailwind_cdn() -> String {
    "https://cdn.tailwindcss.com".to_string()
}
fn default_source_path() -> PathBuf {
    PathBuf::from("page.tsx")
}
fn default_timeout_ms() -> u64 {
    2000
}
fn default_max_heap_mb() -> usize {
    128
}
fn default_capture_console() -> bool {
    true
}
fn default_filename() -> String {
    "generated.tsx".to_string()
}

impl ConfigFile {
    /// Load configuration from `path` if it exists.
    /// Returns an error if the config file exists but is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No {} found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            timeout: Duration::from_millis(self.sandbox.timeout_ms),
            max_heap_bytes: self.sandbox.max_heap_mb * 1024 * 1024,
            capture_console: self.sandbox.capture_console,
        }
    }

    pub fn transform_context(&self) -> TransformContext {
        TransformContext {
            filename: self.transform.filename.clone(),
            ..TransformContext::default()
        }
    }

    pub fn transformer(&self) -> Transformer {
        Transformer::new(OxcEngine::new()).with_context(self.transform_context())
    }

    /// Build the full pipeline. Must run on the thread that will use it.
    pub fn pipeline(&self) -> Result<SandboxPipeline, String> {
        let sandbox = Sandbox::new(self.sandbox_config()).map_err(|e| e.to_string())?;
        Ok(SandboxPipeline::new(self.transformer(), sandbox))
    }

    pub fn tailwind_cdn(&self) -> Option<String> {
        let cdn = self.preview.tailwind_cdn.trim();
        (!cdn.is_empty()).then(|| cdn.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let config = ConfigFile::load(&temp.path().join("capsule.toml")).unwrap();

        assert_eq!(config.preview.port, 7878);
        assert_eq!(config.source.path, PathBuf::from("page.tsx"));
        assert_eq!(config.sandbox_config().timeout, Duration::from_secs(2));
        assert_eq!(config.transform_context().filename, "generated.tsx");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("capsule.toml");
        fs::write(
            &path,
            "[preview]\nport = 9000\ntailwind_cdn = \"\"\n\n[sandbox]\ntimeout_ms = 500\nmax_heap_mb = 64\n",
        )
        .unwrap();

        let config = ConfigFile::load(&path).unwrap();

        assert_eq!(config.preview.port, 9000);
        assert_eq!(config.preview.host, "127.0.0.1");
        assert_eq!(config.tailwind_cdn(), None);
        assert_eq!(config.sandbox_config().timeout, Duration::from_millis(500));
        assert_eq!(config.sandbox_config().max_heap_bytes, 64 * 1024 * 1024);
        assert!(config.sandbox.capture_console);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("capsule.toml");
        fs::write(&path, "[preview\nport = ").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();

        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn default_template_parses() {
        let config: ConfigFile = toml::from_str(crate::commands::init::DEFAULT_CONFIG).unwrap();

        assert_eq!(config.preview.port, 7878);
        assert_eq!(config.source.path, PathBuf::from("page.tsx"));
    }
}
