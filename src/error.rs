//! Error types.
//!
//! The library reports failures through [`Error`]; the `smm` binary wraps them in
//! [`AppError`], which carries the process exit code.

use thiserror::Error;

/// Library error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A parameter value (usually a configured default) lies outside its domain.
    #[error("domain error in '{owner}': parameter '{parameter}' {constraint}")]
    Domain {
        owner: String,
        parameter: String,
        constraint: String,
    },

    /// A feature table does not match what the model needs.
    #[error("shape error: {0}")]
    Shape(String),

    /// Invalid model or fit configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The objective or a numerical routine failed outright.
    #[error("computation error: {0}")]
    Computation(String),
}

impl Error {
    pub fn domain(
        owner: impl Into<String>,
        parameter: impl Into<String>,
        constraint: impl Into<String>,
    ) -> Self {
        Error::Domain {
            owner: owner.into(),
            parameter: parameter.into(),
            constraint: constraint.into(),
        }
    }

    /// Exit code used by the binary for this error class.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Config(_) => 2,
            Error::Domain { .. } | Error::Shape(_) => 3,
            Error::Computation(_) => 4,
        }
    }
}

/// Result alias for library code.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        AppError::new(err.exit_code(), err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_error_names_owner_parameter_and_constraint() {
        let err = Error::domain("stream:phi2", "scale", "must be > 0 (got -1)");
        let msg = err.to_string();
        assert!(msg.contains("stream:phi2"));
        assert!(msg.contains("scale"));
        assert!(msg.contains("must be > 0"));
    }

    #[test]
    fn app_error_keeps_exit_code_of_library_error() {
        let app: AppError = Error::Shape("missing required column 'pm1'".into()).into();
        assert_eq!(app.exit_code(), 3);
        assert!(app.to_string().contains("pm1"));
    }
}
