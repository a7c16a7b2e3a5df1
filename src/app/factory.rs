use crate::{app::context::AppContext, config::Config};
use anyhow::{Context, Result};
use homedir::my_home;

/// Builds the application context from the environment.
pub struct AppFactory;

impl AppFactory {
    /// Load config and open the vault.
    pub fn create_context(paths: &AppPaths) -> Result<AppContext> {
        let config = Self::create_config(&paths.base_path)?;
        AppContext::new(config, paths.clone())
    }

    /// Get application paths, creating the base directory if needed
    pub fn get_paths() -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;
        std::fs::create_dir_all(&base_path)
            .context("Failed to create application base directory")?;

        Ok(AppPaths::new(base_path))
    }

    pub fn create_config(base_path: &str) -> Result<Config> {
        Config::load_with(base_path)
            .with_context(|| format!("failed to load config from {base_path}"))
    }

    fn get_base_path() -> Result<String> {
        if let Ok(base_path) = std::env::var("SERENDIP_BASE_PATH") {
            return Ok(base_path);
        }

        let home = my_home()
            .context("could not determine home directory")?
            .context("home directory path is empty")?;
        Ok(format!("{}/.local/share/serendip", home.to_string_lossy()))
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: String,
    pub vectors_path: String,
}

impl AppPaths {
    pub fn new(base_path: String) -> Self {
        let vectors_path = format!("{base_path}/{}", crate::semantic::VECTORS_FILE);
        Self {
            base_path,
            vectors_path,
        }
    }
}
