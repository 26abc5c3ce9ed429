use log::{debug, info};
use regex::Regex;
use scraper::Html;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::config::Language;
use crate::matcher::obligatory_subject_button;
use crate::parser::{parse_postback, tables, TableRow};
use crate::text::{fold, subject_key};
use crate::types::{Semester, SubjectRecord};

static SEMESTER_II: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bSEMEST(?:RUL|ER)\s+(?:II|2)\b").expect("valid semester pattern"));
static SEMESTER_I: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bSEMEST(?:RUL|ER)\s+(?:I|1)\b").expect("valid semester pattern"));

/// Semester announced by a header row, if any.
pub fn classify_semester(text: &str) -> Option<Semester> {
    let folded = fold(text);
    if SEMESTER_II.is_match(&folded) {
        Some(Semester::Second)
    } else if SEMESTER_I.is_match(&folded) {
        Some(Semester::First)
    } else {
        None
    }
}

/// Picks the requested language out of a bilingual cell (`Romanian\nEnglish`).
pub fn subject_name(cell: &str, language: Language) -> String {
    let cell = cell.trim();
    match (language, cell.split_once('\n')) {
        (Language::Romanian, Some((romanian, _))) => romanian.trim().to_string(),
        (Language::English, Some((_, english))) => {
            let english = english.split_whitespace().collect::<Vec<_>>().join(" ");
            if english.is_empty() {
                cell.to_string()
            } else {
                english
            }
        }
        (_, None) => cell.to_string(),
    }
}

/// Subject records in page order, one per distinct subject.
#[derive(Debug, Default)]
pub struct SubjectExtractor {
    seen: HashSet<String>,
    records: Vec<SubjectRecord>,
}

impl SubjectExtractor {
    fn table(&mut self, rows: &[TableRow], language: Language) {
        let mut semester = Semester::Unknown;

        for row in rows {
            let Some(handler) = obligatory_subject_button(row, language) else {
                if let Some(announced) = classify_semester(&row.text) {
                    debug!("Semester header '{}' -> {:?}", row.text, announced);
                    semester = announced;
                }
                continue;
            };

            let Some(cell) = row.cells.first() else {
                continue;
            };
            let name = subject_name(&cell.multiline, language);

            let Some(postback) = parse_postback(handler) else {
                debug!("Malformed download handler for '{}': {}", name, handler);
                continue;
            };

            if !self.seen.insert(subject_key(&name)) {
                info!("Skipping duplicate subject: {}", name);
                continue;
            }

            info!("Found obligatory subject: {} (semester {})", name, semester);
            self.records.push(SubjectRecord {
                name,
                target: postback.target,
                argument: postback.argument,
                semester,
            });
        }
    }
}

/// Every obligatory subject on the page, first occurrence wins.
pub fn extract_subjects(document: &Html, language: Language) -> Vec<SubjectRecord> {
    let mut extractor = SubjectExtractor::default();
    for rows in tables(document) {
        extractor.table(&rows, language);
    }
    info!("Total obligatory subjects found: {}", extractor.records.len());
    extractor.records
}
