use thiserror::Error;

pub type CleanupResult<T> = std::result::Result<T, CleanupError>;

/// Which required credential could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    Host,
    Cookie,
    AlexaApp,
    DeleteSkill,
}

impl std::fmt::Display for ConfigField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl ConfigField {
    /// Name as the operator sees it in prompts and flags
    pub fn display_name(&self) -> &'static str {
        match self {
            ConfigField::Host => "HOST",
            ConfigField::Cookie => "COOKIE",
            ConfigField::AlexaApp => "X_AMZN_ALEXA_APP",
            ConfigField::DeleteSkill => "DELETE_SKILL",
        }
    }

    /// Where to find the value in a captured Alexa app session
    pub fn suggestion(&self) -> &'static str {
        match self {
            ConfigField::Host => {
                "Pass --host or set ALEXA_HOST (e.g. na-api-alexa.amazon.com)."
            }
            ConfigField::Cookie => {
                "Copy the full Cookie header from the GET /api/behaviors/entities request."
            }
            ConfigField::AlexaApp => {
                "Copy the x-amzn-alexa-app header from the GET /api/behaviors/entities request."
            }
            ConfigField::DeleteSkill => {
                "Copy the part of a captured DELETE URL between 'api/phoenix/appliance/' and '%3D%3D_'."
            }
        }
    }
}

/// Error type for cleanup runs
#[derive(Debug, Error, Clone)]
pub enum CleanupError {
    /// A required credential is missing after flags, env and prompts
    #[error("Missing required configuration value: {0}")]
    MissingConfig(ConfigField),

    /// Cookie has no csrf=... pair
    #[error("Could not extract CSRF token from cookie")]
    CsrfNotFound,

    /// Request exceeded its per-call timeout
    #[error("Request timed out after {1}s: {0}")]
    Timeout(String, u64),

    /// Network level failure
    #[error("Request to {0} failed: {1}")]
    Transport(String, String),

    /// Server returned a non-success status on a listing call
    #[error("Server returned {0}: {1}")]
    ServerError(u16, String),

    /// Response body was not the JSON we expected
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Snapshot file could not be written
    #[error("Snapshot write failed: {0}")]
    Snapshot(String),

    /// Reading from the terminal failed
    #[error("Prompt failed: {0}")]
    Prompt(String),

    /// A credential cannot be sent as an HTTP header value
    #[error("Invalid value for header {0}")]
    InvalidHeader(String),

    /// Filter text would match every device
    #[error("Filter text must not be empty")]
    EmptyFilter,
}

impl CleanupError {
    /// Multi-line operator message with a suggested fix
    pub fn diagnostics(&self) -> String {
        match self {
            CleanupError::MissingConfig(field) => {
                format!("Missing Configuration\nField: {}\nSuggestion: {}", field, field.suggestion())
            }
            CleanupError::CsrfNotFound => {
                "CSRF Not Found\nSuggestion: Make sure the cookie contains a 'csrf=value' entry and that you copied the complete Cookie header.".to_string()
            }
            CleanupError::Timeout(url, secs) => {
                format!("Request Timeout\nURL: {}\nTimeout: {} seconds\nSuggestion: Check your connection and re-run", url, secs)
            }
            CleanupError::Transport(url, source) => {
                format!("Transport Error\nURL: {}\nError: {}\nSuggestion: Check the host value and your connection", url, source)
            }
            CleanupError::ServerError(status, body) => {
                let hint = match status {
                    401 | 403 => "The captured session has probably expired. Capture a fresh cookie.",
                    _ => "Try again later",
                };
                format!("Server Error\nStatus: {}\nMessage: {}\nSuggestion: {}", status, body, hint)
            }
            CleanupError::ParseError(source) => {
                format!("Parse Error\nError: {}\nSuggestion: The API response format may have changed", source)
            }
            CleanupError::Snapshot(source) => {
                format!("Snapshot Error\nError: {}\nSuggestion: Check --snapshot-dir permissions or pass --no-snapshots", source)
            }
            CleanupError::Prompt(source) => {
                format!("Prompt Error\nError: {}\nSuggestion: Provide values via flags or environment variables", source)
            }
            CleanupError::InvalidHeader(name) => {
                format!("Invalid Header\nHeader: {}\nSuggestion: Re-copy the value; it must not contain line breaks or control characters", name)
            }
            CleanupError::EmptyFilter => {
                "Empty Filter\nSuggestion: Pass a non-empty --filter so only matching devices are deleted".to_string()
            }
        }
    }

    /// Configuration problems abort the run before any network call
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            CleanupError::MissingConfig(_)
                | CleanupError::CsrfNotFound
                | CleanupError::Prompt(_)
                | CleanupError::InvalidHeader(_)
                | CleanupError::EmptyFilter
        )
    }
}

impl From<serde_json::Error> for CleanupError {
    fn from(err: serde_json::Error) -> Self {
        CleanupError::ParseError(err.to_string())
    }
}
