//! Template location.
//!
//! Each service has one template document. By default the templates
//! compiled into this crate are used; a deployment can point at its own
//! template directory instead, in which case every template must be
//! present there — a missing file is a provisioning error, not a
//! fallback to the defaults.

use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// File name of the storage daemon template inside a template directory.
pub const STORAGE_TEMPLATE: &str = "storage.toml";
/// File name of the transfer daemon template.
pub const TRANSFER_TEMPLATE: &str = "transfer.conf";
/// File name of the environment-include template.
pub const ENV_TEMPLATE: &str = "node-env.sh";

const BUILTIN_STORAGE: &str = include_str!("../templates/storage.toml");
const BUILTIN_TRANSFER: &str = include_str!("../templates/transfer.conf");
const BUILTIN_ENV: &str = include_str!("../templates/node-env.sh");

/// Source of the per-service template documents.
#[derive(Debug, Clone, Default)]
pub struct Templates {
    dir: Option<PathBuf>,
}

impl Templates {
    /// Use the templates compiled into the crate.
    pub fn builtin() -> Self {
        Self { dir: None }
    }

    /// Load every template from `dir`.
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: Some(dir.into()) }
    }

    pub fn storage(&self) -> ConfigResult<String> {
        self.load("storage", STORAGE_TEMPLATE, BUILTIN_STORAGE)
    }

    pub fn transfer(&self) -> ConfigResult<String> {
        self.load("transfer", TRANSFER_TEMPLATE, BUILTIN_TRANSFER)
    }

    pub fn env(&self) -> ConfigResult<String> {
        self.load("env", ENV_TEMPLATE, BUILTIN_ENV)
    }

    fn load(&self, service: &'static str, file: &str, builtin: &str) -> ConfigResult<String> {
        match &self.dir {
            None => Ok(builtin.to_string()),
            Some(dir) => read_template(service, &dir.join(file)),
        }
    }
}

fn read_template(service: &'static str, path: &Path) -> ConfigResult<String> {
    if !path.is_file() {
        return Err(ConfigError::TemplateMissing { service, path: path.to_path_buf() });
    }
    Ok(std::fs::read_to_string(path)?)
}
