use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const EVENT_TARGET: &str = "__EVENTTARGET";
pub const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";

/// Progress events from the download loop: `(current, total)`, 1-based.
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// The control and argument a postback names, e.g. `GridView1` / `plan$4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Postback {
    pub target: String,
    pub argument: String,
}

/// Everything needed to replay a page's form as a postback.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub action: Url,
    pub fields: IndexMap<String, String>,
}

impl FormState {
    /// Copy of this state with the postback control fields set.
    pub fn with_postback(&self, postback: &Postback) -> FormState {
        let mut fields = self.fields.clone();
        fields.insert(EVENT_TARGET.to_string(), postback.target.clone());
        fields.insert(EVENT_ARGUMENT.to_string(), postback.argument.clone());
        FormState {
            action: self.action.clone(),
            fields,
        }
    }
}

/// A fetched HTML page, kept as text so it can cross `.await` points.
#[derive(Debug, Clone)]
pub struct Page {
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Semester {
    First,
    Second,
    Unknown,
}

impl Semester {
    pub fn dir_name(self) -> &'static str {
        match self {
            Semester::First => "Semester_I",
            Semester::Second => "Semester_II",
            Semester::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Semester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Semester::First => "I",
            Semester::Second => "II",
            Semester::Unknown => "?",
        };
        f.write_str(label)
    }
}

/// One obligatory subject found on the subjects page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRecord {
    pub name: String,
    pub target: String,
    pub argument: String,
    pub semester: Semester,
}

impl SubjectRecord {
    pub fn postback(&self) -> Postback {
        Postback {
            target: self.target.clone(),
            argument: self.argument.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownloadOutcome {
    Saved { path: PathBuf, bytes: u64 },
    RejectedNotPdf,
    HttpError(u16),
    Exception(String),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Saved { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            DownloadOutcome::Saved { .. } => "saved",
            DownloadOutcome::RejectedNotPdf => "rejected_not_pdf",
            DownloadOutcome::HttpError(_) => "http_error",
            DownloadOutcome::Exception(_) => "exception",
        }
    }

    pub fn error(&self) -> Option<String> {
        match self {
            DownloadOutcome::Saved { .. } => None,
            DownloadOutcome::RejectedNotPdf => Some("response was not a PDF".to_string()),
            DownloadOutcome::HttpError(status) => Some(format!("HTTP {}", status)),
            DownloadOutcome::Exception(message) => Some(message.clone()),
        }
    }
}

#[derive(Debug)]
pub struct DownloadReport {
    pub subject: SubjectRecord,
    pub outcome: DownloadOutcome,
    pub duration: Duration,
}

#[derive(Debug)]
pub struct DownloadSummary {
    /// Subjects queued, including any skipped by cancellation.
    pub total: usize,
    pub reports: Vec<DownloadReport>,
    pub cancelled: bool,
    pub total_duration: Duration,
}

impl DownloadSummary {
    pub fn successful(&self) -> usize {
        self.reports.iter().filter(|r| r.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.reports.len() - self.successful()
    }

    pub fn bytes(&self) -> u64 {
        self.reports
            .iter()
            .map(|r| match r.outcome {
                DownloadOutcome::Saved { bytes, .. } => bytes,
                _ => 0,
            })
            .sum()
    }
}
