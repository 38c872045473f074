//! Live preview server command.

use std::path::PathBuf;

use anyhow::Result;
use capsule_preview::{DevServer, DevServerConfig};

use crate::commands::init::DEFAULT_PAGE;
use crate::config::ConfigFile;

/// Flags that override capsule.toml.
#[derive(Debug, Default)]
pub struct DevOptions {
    pub source: Option<PathBuf>,
    pub port: Option<u16>,
    pub open: bool,
    pub write_back: bool,
}

/// Run the dev server.
pub async fn run(config: ConfigFile, options: DevOptions) -> Result<()> {
    let server_config = server_config(&config, options);

    tracing::info!(
        "Previewing {} on port {}",
        server_config.source_path.display(),
        server_config.port
    );

    DevServer::new(server_config)
        .start(move || config.pipeline())
        .await?;

    Ok(())
}

/// Server settings from capsule.toml and command-line overrides.
fn server_config(config: &ConfigFile, options: DevOptions) -> DevServerConfig {
    DevServerConfig {
        source_path: options.source.unwrap_or_else(|| config.source.path.clone()),
        assets_dir: config.preview.assets_dir.clone(),
        port: options.port.unwrap_or(config.preview.port),
        host: config.preview.host.clone(),
        open: options.open && config.preview.open,
        tailwind_cdn: config.tailwind_cdn(),
        write_back: options.write_back,
        initial_source: Some(DEFAULT_PAGE.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn options_override_config() {
        let config = ConfigFile::default();

        let server = server_config(
            &config,
            DevOptions {
                source: Some(PathBuf::from("hero.tsx")),
                port: Some(9000),
                open: false,
                write_back: true,
            },
        );

        assert_eq!(server.source_path, PathBuf::from("hero.tsx"));
        assert_eq!(server.port, 9000);
        assert!(!server.open);
        assert!(server.write_back);
    }

    #[test]
    fn default_page_is_the_initial_source() {
        let server = server_config(&ConfigFile::default(), DevOptions::default());

        assert_eq!(server.source_path, ConfigFile::default().source.path);
        assert_eq!(server.initial_source.as_deref(), Some(DEFAULT_PAGE));
    }
}
