//! File adapters: rule sets exported as JSON and lead lists exported as CSV.

pub mod leads;
pub mod rules;

use crate::scoring::ValidationError;

pub use leads::{leads_from_path, parse_leads};
pub use rules::{load_settings, load_settings_with, store_from_path, store_from_path_with};

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    InvalidRow { lead: String, message: String },
    Validation(ValidationError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read import file: {}", err),
            ImportError::Csv(err) => write!(f, "invalid lead CSV data: {}", err),
            ImportError::Json(err) => write!(f, "invalid rule set JSON: {}", err),
            ImportError::InvalidRow { lead, message } => {
                write!(f, "invalid lead {}: {}", lead, message)
            }
            ImportError::Validation(err) => write!(f, "rule set rejected: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::Json(err) => Some(err),
            ImportError::InvalidRow { .. } => None,
            ImportError::Validation(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<ValidationError> for ImportError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}
