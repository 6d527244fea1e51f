use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Token exchange rejected ({status}): {body}")]
    TokenExchange { status: u16, body: String },

    #[error("Token refresh failed: {0}")]
    TokenRefresh(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No access token available")]
    NoToken,
}

pub type Result<T> = std::result::Result<T, AuthError>;
