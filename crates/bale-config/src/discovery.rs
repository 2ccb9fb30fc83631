//! File-based config discovery and layered loading.
//!
//! Priority, lowest first: defaults, config file, `BALE_` environment
//! variables, command-line overrides.

use std::fs;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format as _, Json, Serialized, Toml};
use serde_json::Value;
use tracing::debug;

use crate::config::LibraryConfig;
use crate::error::{ConfigError, Result};
use crate::overrides::Overrides;
use crate::schema::validate_value;

pub const CONFIG_FILE: &str = "bale.toml";
pub const PACKAGE_JSON_FIELD: &str = "bale";
pub const ENV_PREFIX: &str = "BALE_";

/// Where the file layer came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Toml(PathBuf),
    Json(PathBuf),
    /// `package.json` with a `"bale"` field
    PackageJson(PathBuf),
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::Toml(p) | ConfigSource::Json(p) | ConfigSource::PackageJson(p) => p,
        }
    }
}

/// Discovers and loads configuration for a project root.
///
/// # Example
///
/// ```no_run
/// use bale_config::ConfigLoader;
///
/// let config = ConfigLoader::new(".").load().unwrap();
/// println!("building {}", config.build.entry.display());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    root: PathBuf,
    file: Option<PathBuf>,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            file: None,
            use_env: true,
        }
    }

    /// Use this file instead of searching the root. It must exist.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(crate::resolve_path(&self.root, path.as_ref()));
        self
    }

    /// Skip the `BALE_` environment layer.
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locate the file layer.
    ///
    /// Searches in this order:
    /// 1. the explicit file, if one was given
    /// 2. `bale.toml`
    /// 3. `package.json` with a `bale` field
    pub fn find(&self) -> Result<Option<ConfigSource>> {
        if let Some(path) = &self.file {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.clone()));
            }
            return classify(path).map(Some);
        }

        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.is_file() {
            return Ok(Some(ConfigSource::Toml(toml_path)));
        }

        let pkg_path = self.root.join("package.json");
        if pkg_path.is_file() {
            let parsed = read_json(&pkg_path)?;
            if parsed
                .get(PACKAGE_JSON_FIELD)
                .is_some_and(|field| !field.is_null())
            {
                return Ok(Some(ConfigSource::PackageJson(pkg_path)));
            }
        }

        Ok(None)
    }

    pub fn load(&self) -> Result<LibraryConfig> {
        self.load_with(&Overrides::default())
    }

    /// Load with command-line overrides as the top layer.
    pub fn load_with(&self, overrides: &Overrides) -> Result<LibraryConfig> {
        self.figment(overrides)?
            .extract()
            .map_err(|e| ConfigError::invalid(figment_path(&e), e.to_string()))
    }

    /// Build the layered figment without extracting it.
    pub fn figment(&self, overrides: &Overrides) -> Result<Figment> {
        let mut figment = Figment::new().merge(Serialized::defaults(LibraryConfig::default()));

        match self.find()? {
            Some(source) => {
                debug!(path = %source.path().display(), "loading config file");
                let raw = raw_value(&source)?;
                validate_value(&raw)?;
                figment = match source {
                    ConfigSource::Toml(path) => figment.merge(Toml::file(path)),
                    ConfigSource::Json(path) => figment.merge(Json::file(path)),
                    ConfigSource::PackageJson(_) => figment.merge(Serialized::defaults(raw)),
                };
            }
            None => debug!(root = %self.root.display(), "no config file, using defaults"),
        }

        if self.use_env {
            // BALE_BUILD__OUT_DIR=lib -> build.out_dir
            let env = Env::prefixed(ENV_PREFIX)
                .filter(|key| {
                    let key = key.as_str().to_ascii_lowercase();
                    key.starts_with("build__") || key.starts_with("test__")
                })
                .split("__");
            figment = figment.merge(env);
        }

        Ok(figment.merge(Serialized::defaults(overrides)))
    }
}

fn classify(path: &Path) -> Result<ConfigSource> {
    let is_package_json = path.file_name().is_some_and(|name| name == "package.json");
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") if is_package_json => Ok(ConfigSource::PackageJson(path.to_path_buf())),
        Some("json") => Ok(ConfigSource::Json(path.to_path_buf())),
        Some("toml") => Ok(ConfigSource::Toml(path.to_path_buf())),
        _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
    }
}

/// The file layer as a JSON value, for schema validation.
fn raw_value(source: &ConfigSource) -> Result<Value> {
    match source {
        ConfigSource::Toml(path) => {
            let content = fs::read_to_string(path)?;
            let toml_val: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                message: format!("Invalid TOML syntax: {e}"),
            })?;
            serde_json::to_value(toml_val).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                message: format!("TOML to JSON conversion failed: {e}"),
            })
        }
        ConfigSource::Json(path) => read_json(path),
        ConfigSource::PackageJson(path) => {
            let parsed = read_json(path)?;
            match parsed.get(PACKAGE_JSON_FIELD) {
                Some(field) if !field.is_null() => Ok(field.clone()),
                _ => Err(ConfigError::invalid(
                    PACKAGE_JSON_FIELD,
                    "add a 'bale' object to package.json",
                )),
            }
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("Invalid JSON: {e}"),
    })
}

fn figment_path(error: &figment::Error) -> String {
    if error.path.is_empty() {
        "configuration".to_string()
    } else {
        error.path.join(".")
    }
}

/// Discover and load config from the current directory.
pub fn discover() -> Result<LibraryConfig> {
    let root = std::env::current_dir()?;
    ConfigLoader::new(root).load()
}
