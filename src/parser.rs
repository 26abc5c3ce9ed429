use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use std::sync::LazyLock;

use crate::text::collapse_whitespace;
use crate::types::Postback;

static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("valid row selector"));
static TABLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("valid table selector"));
static CELL_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td, th").expect("valid cell selector"));
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static IMAGE_BUTTON_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[type="image"]"#).expect("valid button selector"));

// `__doPostBack('GridView1','plan$4')` and friends.
static POSTBACK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"'([^']+)'\s*,\s*'([^']*)'").expect("valid postback pattern"));

/// One `<td>`/`<th>`.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Whitespace-collapsed text on a single line.
    pub text: String,
    /// Same text with every `<br>` kept as `\n`.
    pub multiline: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub text: String,
    pub href: String,
}

/// A table row flattened into what the matchers need.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub text: String,
    pub cells: Vec<Cell>,
    pub links: Vec<Link>,
    /// `onclick` handlers of the row's image buttons, in document order.
    pub buttons: Vec<String>,
}

impl TableRow {
    fn from_element(row: ElementRef<'_>) -> Self {
        let cells: Vec<Cell> = row.select(&CELL_SELECTOR).map(cell).collect();

        let text = if cells.is_empty() {
            collapse_whitespace(&row.text().collect::<String>())
        } else {
            cells
                .iter()
                .map(|c| c.text.as_str())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        };

        let links = row
            .select(&LINK_SELECTOR)
            .filter_map(|a| {
                a.value().attr("href").map(|href| Link {
                    text: collapse_whitespace(&a.text().collect::<String>()),
                    href: href.to_string(),
                })
            })
            .collect();

        let buttons = row
            .select(&IMAGE_BUTTON_SELECTOR)
            .filter_map(|input| input.value().attr("onclick").map(str::to_string))
            .collect();

        Self {
            text,
            cells,
            links,
            buttons,
        }
    }
}

fn cell(element: ElementRef<'_>) -> Cell {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(t) => raw.push_str(t),
            Node::Element(e) if e.name() == "br" => raw.push('\n'),
            _ => {}
        }
    }

    let lines: Vec<String> = raw
        .split('\n')
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty())
        .collect();

    Cell {
        text: lines.join(" "),
        multiline: lines.join("\n"),
    }
}

/// A row is a layout row when it wraps another table's rows.
fn is_innermost(row: &ElementRef<'_>) -> bool {
    row.select(&ROW_SELECTOR).next().is_none()
}

fn belongs_to(row: &ElementRef<'_>, table: &ElementRef<'_>) -> bool {
    row.ancestors()
        .find(|n| matches!(n.value(), Node::Element(e) if e.name() == "table"))
        .is_some_and(|n| n.id() == table.id())
}

/// Every innermost row of the document, in document order.
pub fn rows(document: &Html) -> Vec<TableRow> {
    document
        .select(&ROW_SELECTOR)
        .filter(is_innermost)
        .map(TableRow::from_element)
        .collect()
}

/// Innermost rows grouped by their nearest enclosing `<table>`.
/// Tables without such rows are omitted.
pub fn tables(document: &Html) -> Vec<Vec<TableRow>> {
    document
        .select(&TABLE_SELECTOR)
        .map(|table| {
            table
                .select(&ROW_SELECTOR)
                .filter(is_innermost)
                .filter(|row| belongs_to(row, &table))
                .map(TableRow::from_element)
                .collect::<Vec<_>>()
        })
        .filter(|rows| !rows.is_empty())
        .collect()
}

/// Number of image buttons whose handler mentions `marker`.
pub fn count_buttons(document: &Html, marker: &str) -> usize {
    document
        .select(&IMAGE_BUTTON_SELECTOR)
        .filter(|b| b.value().attr("onclick").is_some_and(|h| h.contains(marker)))
        .count()
}

/// Extracts the first `'<target>','<argument>'` pair from a link or handler.
pub fn parse_postback(source: &str) -> Option<Postback> {
    let caps = POSTBACK_PATTERN.captures(source)?;
    Some(Postback {
        target: caps[1].to_string(),
        argument: caps[2].to_string(),
    })
}

/// `true` for arguments shaped like `<prefix>$<digits>`.
pub fn argument_has_prefix(argument: &str, prefix: &str) -> bool {
    argument
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('$'))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}
