use log::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use crate::error::DownloaderError;
use crate::text::{fold, sanitize_filename};

pub const DEFAULT_BASE_URL: &str = "https://fisadisciplina.ase.ro/";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "ro-RO,ro;q=0.9,en;q=0.8";
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 2000;
pub const DEFAULT_OUTPUT_DIR: &str = "ASE_PDFs";

static STUDY_YEARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{4}$").expect("valid study years pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudyForm {
    InPerson,
    Distance,
}

impl StudyForm {
    /// Spellings of the form as they appear on the site, uppercased.
    pub fn variants(self) -> &'static [&'static str] {
        match self {
            StudyForm::InPerson => &["FRECVENTA", "FRECVENȚĂ", "FRECVENŢĂ"],
            StudyForm::Distance => &["DISTANTA", "DISTANȚĂ", "DISTANŢĂ"],
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            StudyForm::InPerson => "FRECVENTA",
            StudyForm::Distance => "DISTANTA",
        }
    }
}

impl FromStr for StudyForm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match fold(s.trim()).replace(['-', '_', ' '], "").as_str() {
            "FRECVENTA" | "INPERSON" | "IF" => Ok(StudyForm::InPerson),
            "DISTANTA" | "DISTANCE" | "ID" => Ok(StudyForm::Distance),
            _ => Err(format!("'{}' is not FRECVENTA (in-person) or DISTANTA (distance)", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Romanian,
    English,
}

impl Language {
    /// Marker found in the download button handler for this language's PDF.
    pub fn button_marker(self) -> &'static str {
        match self {
            Language::Romanian => "ProgramaRO",
            Language::English => "ProgramaEN",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Language::Romanian => "ro",
            Language::English => "en",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "romanian" | "ro" | "română" | "romana" => Ok(Language::Romanian),
            "english" | "en" | "engleză" | "engleza" => Ok(Language::English),
            _ => Err(format!("'{}' is not romanian or english", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetYear {
    I,
    II,
    III,
    IV,
}

impl TargetYear {
    /// Visible link text on the programs page.
    pub fn label(self) -> &'static str {
        match self {
            TargetYear::I => "Anul I",
            TargetYear::II => "Anul II",
            TargetYear::III => "Anul III",
            TargetYear::IV => "Anul IV",
        }
    }

    /// Prefix of the postback argument behind the year link (`doi$3`).
    pub fn argument_prefix(self) -> &'static str {
        match self {
            TargetYear::I => "unu",
            TargetYear::II => "doi",
            TargetYear::III => "trei",
            TargetYear::IV => "patru",
        }
    }
}

impl FromStr for TargetYear {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        let numeral = upper.strip_prefix("ANUL").unwrap_or(&upper).trim();
        match numeral {
            "I" | "1" => Ok(TargetYear::I),
            "II" | "2" => Ok(TargetYear::II),
            "III" | "3" => Ok(TargetYear::III),
            "IV" | "4" => Ok(TargetYear::IV),
            _ => Err(format!("'{}' is not one of Anul I, Anul II, Anul III, Anul IV", s)),
        }
    }
}

/// Target fields as written by a user; every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTarget {
    pub faculty_keywords: Option<Vec<String>>,
    pub program_name: Option<String>,
    pub study_years: Option<String>,
    pub study_form: Option<String>,
    pub language: Option<String>,
    pub target_year: Option<String>,
}

impl RawTarget {
    /// Fields set in `other` replace the ones in `self`.
    pub fn merge(self, other: RawTarget) -> RawTarget {
        RawTarget {
            faculty_keywords: other.faculty_keywords.or(self.faculty_keywords),
            program_name: other.program_name.or(self.program_name),
            study_years: other.study_years.or(self.study_years),
            study_form: other.study_form.or(self.study_form),
            language: other.language.or(self.language),
            target_year: other.target_year.or(self.target_year),
        }
    }

    pub fn validate(&self) -> Result<Target, DownloaderError> {
        let faculty_keywords = required(&self.faculty_keywords, "faculty_keywords")?.clone();
        if faculty_keywords.is_empty() {
            return Err(DownloaderError::config("faculty_keywords", "at least one keyword is required"));
        }
        if faculty_keywords.iter().any(|k| k.trim().is_empty()) {
            return Err(DownloaderError::config("faculty_keywords", "keywords must not be blank"));
        }

        let program_name = required(&self.program_name, "program_name")?.trim().to_string();
        if program_name.is_empty() {
            return Err(DownloaderError::config("program_name", "must not be blank"));
        }

        let study_years = required(&self.study_years, "study_years")?.trim().to_string();
        if !STUDY_YEARS.is_match(&study_years) {
            return Err(DownloaderError::config(
                "study_years",
                format!("'{}' is not in YYYY-YYYY form", study_years),
            ));
        }

        let study_form = parse_field(&self.study_form, "study_form")?;
        let language = parse_field(&self.language, "language")?;
        let target_year = parse_field(&self.target_year, "target_year")?;

        Ok(Target {
            faculty_keywords: faculty_keywords.iter().map(|k| k.trim().to_string()).collect(),
            program_name,
            study_years,
            study_form,
            language,
            target_year,
        })
    }
}

fn required<'a, T>(value: &'a Option<T>, field: &str) -> Result<&'a T, DownloaderError> {
    value
        .as_ref()
        .ok_or_else(|| DownloaderError::config(field, "missing required field"))
}

fn parse_field<T>(value: &Option<String>, field: &str) -> Result<T, DownloaderError>
where
    T: FromStr<Err = String>,
{
    required(value, field)?
        .parse()
        .map_err(|message: String| DownloaderError::config(field, message))
}

/// A validated download target.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub faculty_keywords: Vec<String>,
    pub program_name: String,
    pub study_years: String,
    pub study_form: StudyForm,
    pub language: Language,
    pub target_year: TargetYear,
}

impl Target {
    /// Directory name for this target's runs.
    pub fn run_key(&self) -> String {
        sanitize_filename(&format!(
            "{}_{}_{}_{}_{}",
            self.program_name,
            self.study_years,
            self.study_form.code(),
            self.target_year.label(),
            self.language.code()
        ))
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {} {} [{}], faculty keywords {:?}",
            self.program_name,
            self.study_years,
            self.study_form.code(),
            self.target_year.label(),
            self.language.code(),
            self.faculty_keywords
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub request_delay_ms: u64,
    pub timeout_secs: Option<u64>,
    /// CSS selector for the postback form when the first `<form>` is wrong.
    pub form_selector: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            timeout_secs: None,
            form_selector: None,
        }
    }
}

impl SiteConfig {
    pub fn base_url(&self) -> Result<Url, DownloaderError> {
        Url::parse(&self.base_url)
            .map_err(|e| DownloaderError::config("site.base_url", e.to_string()))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

/// Shape of the TOML configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub target: RawTarget,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, DownloaderError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, DownloaderError> {
        Ok(toml::from_str(content)?)
    }
}

/// A complete, validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub target: Target,
    pub site: SiteConfig,
    pub output: OutputConfig,
}

impl Config {
    pub fn new(target: Target, site: SiteConfig, output: OutputConfig) -> Result<Self, DownloaderError> {
        site.base_url()?;
        if let Some(selector) = &site.form_selector {
            if scraper::Selector::parse(selector).is_err() {
                return Err(DownloaderError::config("site.form_selector", format!("invalid selector '{}'", selector)));
            }
        }
        if site.user_agent.trim().is_empty() {
            warn!("site.user_agent is empty; the site may reject requests");
        }
        Ok(Self { target, site, output })
    }
}

/// Built-in targets, named after the student they were written for.
pub fn presets() -> Vec<(&'static str, RawTarget)> {
    fn entry(keywords: &[&str], program: &str, years: &str, language: &str, year: &str) -> RawTarget {
        RawTarget {
            faculty_keywords: Some(keywords.iter().map(|k| k.to_string()).collect()),
            program_name: Some(program.to_string()),
            study_years: Some(years.to_string()),
            study_form: Some("FRECVENTA".to_string()),
            language: Some(language.to_string()),
            target_year: Some(year.to_string()),
        }
    }

    vec![
        (
            "cybernetics_year3",
            entry(&["CIBERNETICA", "CYBERNETICS"], "Informatica economica", "2023-2026", "romanian", "Anul III"),
        ),
        (
            "cybernetics_cibernetica_year2",
            entry(&["CIBERNETICA", "CYBERNETICS"], "Cibernetica economica", "2024-2027", "romanian", "Anul II"),
        ),
        ("marketing_year1", entry(&["MARKETING"], "Marketing", "2025-2028", "romanian", "Anul I")),
        ("marketing_year2", entry(&["MARKETING"], "Marketing", "2024-2027", "romanian", "Anul II")),
        ("management_year1", entry(&["MANAGEMENT"], "Management", "2025-2028", "romanian", "Anul I")),
        ("management_year3", entry(&["MANAGEMENT"], "Management", "2023-2026", "romanian", "Anul III")),
        ("finance_romanian_year2", entry(&["FINANTE", "FINANCE"], "Finante", "2024-2027", "romanian", "Anul II")),
        (
            "finance_year3_english",
            entry(&["FINANTE", "FINANCE"], "Finance (English)", "2023-2026", "english", "Anul III"),
        ),
    ]
}

pub fn preset(name: &str) -> Option<RawTarget> {
    presets().into_iter().find(|(n, _)| *n == name).map(|(_, t)| t)
}
