use log::{debug, info};

use crate::config::{Language, StudyForm, TargetYear};
use crate::parser::{argument_has_prefix, parse_postback, TableRow};
use crate::text::fold;
use crate::types::Postback;

/// Control that owns every navigation link on the catalogue pages.
pub const GRID_TARGET: &str = "GridView1";

/// Cell text marking an obligatory subject.
pub const OBLIGATORY_MARKER: &str = "O";

const FACULTY_ARGUMENT_PREFIX: &str = "plan";
const ENGLISH_TRACK_MARKERS: &[&str] = &["ENGLEZA", "ENGLISH"];

#[derive(Debug, Clone, PartialEq)]
pub struct NoMatch {
    pub candidates: Vec<String>,
}

/// What the program/year step looks for.
#[derive(Debug, Clone, Copy)]
pub struct ProgramQuery<'a> {
    pub program_name: &'a str,
    pub study_years: &'a str,
    pub study_form: StudyForm,
    pub target_year: TargetYear,
}

/// First link in `row` that posts back to the grid with a `<prefix>$<n>` argument.
fn grid_postback<'r>(
    links: impl IntoIterator<Item = &'r crate::parser::Link>,
    prefix: &str,
) -> Option<Postback> {
    links
        .into_iter()
        .filter_map(|link| parse_postback(&link.href))
        .find(|pb| pb.target == GRID_TARGET && argument_has_prefix(&pb.argument, prefix))
}

fn candidates(rows: &[TableRow]) -> Vec<String> {
    rows.iter()
        .filter(|r| !r.links.is_empty() && !r.text.is_empty())
        .map(|r| r.text.clone())
        .collect()
}

/// Faculty step: first row whose text contains any keyword and carries a
/// `plan$<n>` link. Case and diacritics are ignored.
pub fn match_faculty(rows: &[TableRow], keywords: &[String]) -> Result<Postback, NoMatch> {
    let folded: Vec<String> = keywords.iter().map(|k| fold(k)).collect();

    for row in rows {
        let text = fold(&row.text);
        if !folded.iter().any(|k| text.contains(k.as_str())) {
            continue;
        }
        match grid_postback(&row.links, FACULTY_ARGUMENT_PREFIX) {
            Some(postback) => {
                info!("Found faculty: {}", row.text);
                return Ok(postback);
            }
            None => debug!("Keyword matched but no faculty link in row: {}", row.text),
        }
    }

    Err(NoMatch {
        candidates: candidates(rows),
    })
}

fn study_form_matches(upper: &str, folded: &str, form: StudyForm) -> bool {
    form.variants().iter().any(|v| upper.contains(v)) || folded.contains(form.code())
}

fn is_english_track(text: &str) -> bool {
    let folded = fold(text);
    ENGLISH_TRACK_MARKERS.iter().any(|m| folded.contains(m))
}

/// Program/year step: the row naming the program, the study years and the
/// study form; then the link labelled with the target year.
pub fn match_program_year(rows: &[TableRow], query: &ProgramQuery<'_>) -> Result<Postback, NoMatch> {
    let label = query.target_year.label();
    let prefix = query.target_year.argument_prefix();
    let skip_english_track = query.study_form == StudyForm::InPerson && !is_english_track(query.program_name);

    for row in rows {
        if !row.text.contains(query.program_name) || !row.text.contains(query.study_years) {
            continue;
        }
        let upper = row.text.to_uppercase();
        let folded = fold(&row.text);
        if !study_form_matches(&upper, &folded, query.study_form) {
            continue;
        }
        if skip_english_track && is_english_track(&row.text) {
            debug!("Skipping English track: {}", row.text);
            continue;
        }

        info!("Found program row: {}", row.text);
        let year_links = row.links.iter().filter(|l| l.text == label);
        if let Some(postback) = grid_postback(year_links, prefix) {
            info!("Found {} link: {}", label, postback.argument);
            return Ok(postback);
        }
        debug!("Program row has no usable '{}' link", label);
    }

    Err(NoMatch {
        candidates: candidates(rows),
    })
}

/// The handler of the row's download button for `language`, when the row is
/// an obligatory-subject row.
pub fn obligatory_subject_button(row: &TableRow, language: Language) -> Option<&str> {
    let marker = language.button_marker();
    let button = row.buttons.iter().find(|onclick| onclick.contains(marker))?;
    row.cells
        .iter()
        .any(|c| c.text == OBLIGATORY_MARKER)
        .then_some(button.as_str())
}
