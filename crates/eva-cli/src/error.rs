use thiserror::Error;

pub const ENV_PREFIX: &str = "EVA";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting, set the {env_var} environment variable")]
    MissingEnvVar { env_var: String },
    #[error("Invalid setting for {env_var}: {reason}")]
    Invalid { env_var: String, reason: String },
    #[error(transparent)]
    Other(#[from] config::ConfigError),
}

/// Environment variable that sets `field`.
///
/// Bare field names are assumed to belong to the provider section, since that is the
/// only section with required fields.
pub fn to_env_var(field: &str) -> String {
    let path = if field.contains('.') {
        field.to_string()
    } else {
        format!("provider.{}", field)
    };
    format!("{}_{}", ENV_PREFIX, path.replace('.', "__").to_uppercase())
}
