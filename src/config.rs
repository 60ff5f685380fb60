//! Deployment configuration, read once at startup from `refbot.toml`.

use parser::{ParseReferenceError, ReferenceParser};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing as log;

pub static CONFIG_FILE_NAME: &str = "refbot.toml";

#[derive(PartialEq, Eq, Debug, Default, serde::Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub references: ReferencesConfig,
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub comments: CommentsConfig,
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ReferencesConfig {
    /// Prefix of the `<keyword>-<id>` tokens looked for in GitLab texts.
    #[serde(default = "default_keyword")]
    pub keyword: String,
    /// Reference keyword the site registered for tracker artifacts.
    #[serde(default = "default_artifact_keyword")]
    pub artifact_keyword: String,
}

impl Default for ReferencesConfig {
    fn default() -> Self {
        ReferencesConfig {
            keyword: default_keyword(),
            artifact_keyword: default_artifact_keyword(),
        }
    }
}

fn default_keyword() -> String {
    "TULEAP".to_string()
}

fn default_artifact_keyword() -> String {
    "art".to_string()
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct InstanceConfig {
    /// Public URL of the instance, used to link artifacts from comments.
    #[serde(default = "default_instance_url")]
    pub url: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        InstanceConfig {
            url: default_instance_url(),
        }
    }
}

fn default_instance_url() -> String {
    "http://localhost".to_string()
}

#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct CommentsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CommentsConfig {
    fn default() -> Self {
        CommentsConfig { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn reference_parser(&self) -> Result<ReferenceParser, ConfigurationError> {
        ReferenceParser::new(&self.references.keyword).map_err(ConfigurationError::Keyword)
    }

    /// Link to an artifact on the instance.
    pub fn artifact_url(&self, id: parser::ReferenceId) -> String {
        format!(
            "{}/plugins/tracker/?aid={}",
            self.instance.url.trim_end_matches('/'),
            id.get()
        )
    }
}

pub fn parse(contents: &str) -> Result<Config, ConfigurationError> {
    let config = toml::from_str::<Config>(contents).map_err(ConfigurationError::Toml)?;
    config.reference_parser()?;
    Ok(config)
}

/// Reads the configuration at `path`; a missing file means the defaults.
pub fn load(path: &Path) -> Result<Config, ConfigurationError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::info!("{} not found, using the default configuration", path.display());
            return Ok(Config::default());
        }
        Err(e) => return Err(ConfigurationError::Io(Arc::new(e))),
    };
    let config = parse(&contents)?;
    log::debug!("configuration from {}: {:?}", path.display(), config);
    Ok(config)
}

#[derive(Clone, Debug)]
pub enum ConfigurationError {
    Io(Arc<std::io::Error>),
    Toml(toml::de::Error),
    Keyword(ParseReferenceError),
}

impl std::error::Error for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigurationError::Io(e) => write!(f, "Failed to read `{CONFIG_FILE_NAME}`: {e}"),
            ConfigurationError::Toml(e) => write!(f, "Malformed `{CONFIG_FILE_NAME}`.\n{e}"),
            ConfigurationError::Keyword(e) => {
                write!(f, "Invalid reference keyword in `{CONFIG_FILE_NAME}`: {e}")
            }
        }
    }
}
