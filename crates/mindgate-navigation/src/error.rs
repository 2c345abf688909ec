//! Navigation error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("Invalid confirmation page address: {0}")]
    InvalidConfirmationPage(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}
