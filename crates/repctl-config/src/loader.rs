use crate::{Paths, RepctlConfig};
use anyhow::{Context as _, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Builder for loading a [`RepctlConfig`] from all sources with proper
/// precedence.
pub struct ConfigLoader {
    config_file: Option<PathBuf>,
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            config_file: None,
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "REPCTL".to_string(),
        }
    }

    /// The explicit `-f <config-file>` path, if one was passed on the
    /// command line. Otherwise `repctl.toml` in the project directory is
    /// used (and may not exist, in which case only defaults/env apply).
    pub fn with_config_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn load(self) -> Result<RepctlConfig> {
        let mut builder = config::Config::builder();

        let defaults = RepctlConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(
                    config::File::from(user_config_file)
                        .required(false)
                        .format(config::FileFormat::Toml),
                );
            }
        }

        let node_config_file = self
            .config_file
            .clone()
            .unwrap_or_else(|| Paths::project_config_file(&self.project_dir));
        if node_config_file.exists() {
            builder = builder.add_source(
                config::File::from(node_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let built = builder.build().context("failed to build configuration")?;
        built
            .try_deserialize()
            .context("failed to deserialize configuration")
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
