use std::{env, path::PathBuf, str::FromStr};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub max_file_bytes: usize,
    pub verify_image_content: bool,
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub github_token: Option<String>,
    pub model_input_op: String,
    pub model_output_op: String,
    pub upload_dir: PathBuf,
    pub frontend_dir: PathBuf,
    pub predictions_log: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 5000,
            body_limit_bytes: 16 * 1024 * 1024,
            max_file_bytes: 16 * 1024 * 1024,
            verify_image_content: false,
            model_path: PathBuf::from("models/mejor_modelo_cultivos.pb"),
            model_url: None,
            github_token: None,
            model_input_op: "x".to_string(),
            model_output_op: "Identity".to_string(),
            upload_dir: PathBuf::from("uploads"),
            frontend_dir: PathBuf::from("frontend"),
            predictions_log: PathBuf::from("predictions_log.json"),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the config from any variable source; unset variables keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        Ok(Config {
            port: parse_or(&var, "PORT", defaults.port)?,
            body_limit_bytes: parse_or(&var, "BODY_LIMIT_MB", 16usize)? * 1024 * 1024,
            max_file_bytes: parse_or(&var, "MAX_FILE_MB", 16usize)? * 1024 * 1024,
            verify_image_content: parse_bool_or(&var, "VERIFY_IMAGE_CONTENT", false)?,
            model_path: var("MODEL_PATH").map(PathBuf::from).unwrap_or(defaults.model_path),
            model_url: var("MODEL_URL"),
            github_token: var("GITHUB_TOKEN"),
            model_input_op: var("MODEL_INPUT_OP").unwrap_or(defaults.model_input_op),
            model_output_op: var("MODEL_OUTPUT_OP").unwrap_or(defaults.model_output_op),
            upload_dir: var("UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            frontend_dir: var("FRONTEND_DIR").map(PathBuf::from).unwrap_or(defaults.frontend_dir),
            predictions_log: var("PREDICTIONS_LOG")
                .map(PathBuf::from)
                .unwrap_or(defaults.predictions_log),
        })
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var: name, value }),
    }
}

fn parse_bool_or(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { var: name, value }),
        },
    }
}
