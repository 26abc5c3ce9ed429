use clap::Parser;
use fisa_downloader::RawTarget;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Start from a built-in target (see --list-presets)
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Print the built-in presets and exit
    #[arg(long)]
    pub list_presets: bool,

    /// Keyword identifying the faculty row (repeatable)
    #[arg(short = 'k', long = "faculty-keyword")]
    pub faculty_keywords: Vec<String>,

    /// Program name exactly as shown on the site
    #[arg(long)]
    pub program: Option<String>,

    /// Study years, e.g. 2024-2027
    #[arg(long)]
    pub years: Option<String>,

    /// FRECVENTA (in-person) or DISTANTA (distance)
    #[arg(long)]
    pub form: Option<String>,

    /// romanian or english
    #[arg(short, long)]
    pub language: Option<String>,

    /// Anul I .. Anul IV
    #[arg(short, long)]
    pub year: Option<String>,

    /// Output directory for run folders
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Delay between subject downloads in milliseconds
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Override the catalogue URL
    #[arg(long)]
    pub base_url: Option<String>,
}

impl Cli {
    /// Target fields given on the command line.
    pub fn target_overrides(&self) -> RawTarget {
        RawTarget {
            faculty_keywords: (!self.faculty_keywords.is_empty()).then(|| self.faculty_keywords.clone()),
            program_name: self.program.clone(),
            study_years: self.years.clone(),
            study_form: self.form.clone(),
            language: self.language.clone(),
            target_year: self.year.clone(),
        }
    }
}
