pub mod config;
pub mod downloader;
pub mod error;
pub mod form;
pub mod logging;
pub mod matcher;
pub mod navigator;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod subjects;
pub mod text;
pub mod types;

pub use config::{Config, Language, RawTarget, StudyForm, Target, TargetYear};
pub use error::{DownloaderError, NavigationError};
pub use output::RunLayout;
pub use pipeline::run;
pub use types::{DownloadOutcome, DownloadSummary, ProgressCallback, Semester, SubjectRecord};
