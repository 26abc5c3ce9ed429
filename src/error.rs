use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloaderError {
    #[error("Configuration error in '{field}': {message}")]
    Config { field: String, message: String },

    #[error("Navigation failed: {0}")]
    Navigation(#[from] NavigationError),

    #[error("No obligatory subjects found on the subjects page ({buttons} download buttons seen)")]
    ExtractionEmpty { buttons: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl DownloaderError {
    pub fn config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Fatal failures of the three navigation postbacks.
#[derive(Error, Debug)]
pub enum NavigationError {
    #[error("HTTP {status} while loading step '{step}'")]
    HttpStatus { step: &'static str, status: u16 },

    #[error("no form found on step '{step}'")]
    NoForm { step: &'static str },

    #[error("faculty not found for keywords {keywords:?}; available faculties were: {}", list(.candidates))]
    FacultyNotFound {
        keywords: Vec<String>,
        candidates: Vec<String>,
    },

    #[error("program '{program}' ({years}) not found; available programs were: {}", list(.candidates))]
    ProgramNotFound {
        program: String,
        years: String,
        candidates: Vec<String>,
    },
}

impl NavigationError {
    /// Row texts the matcher inspected before giving up.
    pub fn candidates(&self) -> &[String] {
        match self {
            Self::FacultyNotFound { candidates, .. } | Self::ProgramNotFound { candidates, .. } => {
                candidates
            }
            _ => &[],
        }
    }
}

fn list(candidates: &[String]) -> String {
    if candidates.is_empty() {
        "(none)".to_string()
    } else {
        candidates.join(" | ")
    }
}
