//! 邮件错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build message: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("No recipients")]
    NoRecipients,

    #[error("Internal error: {0}")]
    Internal(String),
}
