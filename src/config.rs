pub const ENDPOINT_VAR: &str = "AI_SERVICE_ENDPOINT";
pub const KEY_VAR: &str = "AI_SERVICE_KEY";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("AI_SERVICE_ENDPOINT and AI_SERVICE_KEY must be set in the environment.")]
    Missing,
}

/// Endpoint and key of the cloud AI resource.
#[derive(Clone)]
pub struct Settings {
    endpoint: String,
    key: String,
}

impl Settings {
    pub fn resolve(endpoint: Option<String>, key: Option<String>) -> Result<Self, ConfigError> {
        let endpoint = non_blank(endpoint).ok_or(ConfigError::Missing)?;
        let key = non_blank(key).ok_or(ConfigError::Missing)?;

        Ok(Settings {
            endpoint: format!("{}/", endpoint.trim_end_matches('/')),
            key,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path.trim_start_matches('/'))
    }
}

// keeps the key out of logs
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("endpoint", &self.endpoint)
            .field("key", &"***")
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
