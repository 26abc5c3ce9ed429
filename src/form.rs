use indexmap::IndexMap;
use log::debug;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use url::Url;

use crate::types::FormState;

static FORM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("form").expect("valid form selector"));
static HIDDEN_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"input[type="hidden"]"#).expect("valid hidden selector"));
static VISIBLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"input[type="text"], input[type="submit"], input[type="button"]"#)
        .expect("valid input selector")
});
static SELECT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select").expect("valid select selector"));
static OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").expect("valid option selector"));
static SELECTED_OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option[selected]").expect("valid option selector"));

/// Which inputs end up in [`FormState::fields`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldSet {
    /// Hidden inputs only (viewstate, event validation, postback controls).
    #[default]
    Postback,
    /// Hidden inputs plus text/submit/button inputs and `<select>` defaults.
    WithDefaults,
}

/// Extracts the first form of `document`.
pub fn extract(document: &Html, base: &Url, fields: FieldSet) -> Option<FormState> {
    let form = document.select(&FORM_SELECTOR).next()?;
    Some(capture(form, base, fields))
}

/// Extracts the first form matching `selector`.
pub fn extract_matching(
    document: &Html,
    selector: &Selector,
    base: &Url,
    fields: FieldSet,
) -> Option<FormState> {
    let form = document.select(selector).next()?;
    Some(capture(form, base, fields))
}

fn capture(form: ElementRef<'_>, base: &Url, set: FieldSet) -> FormState {
    let action = resolve_action(form.value().attr("action").unwrap_or(""), base);

    let mut fields = IndexMap::new();
    collect_inputs(form, &HIDDEN_SELECTOR, &mut fields);

    if set == FieldSet::WithDefaults {
        collect_inputs(form, &VISIBLE_SELECTOR, &mut fields);
        for select in form.select(&SELECT_SELECTOR) {
            let Some(name) = select.value().attr("name") else {
                continue;
            };
            let chosen = select
                .select(&SELECTED_OPTION_SELECTOR)
                .next()
                .or_else(|| select.select(&OPTION_SELECTOR).next());
            if let Some(option) = chosen {
                fields.insert(name.to_string(), option_value(option));
            }
        }
    }

    debug!("Captured form {} with {} fields", action, fields.len());
    FormState { action, fields }
}

fn collect_inputs(form: ElementRef<'_>, selector: &Selector, fields: &mut IndexMap<String, String>) {
    for input in form.select(selector) {
        if let Some(name) = input.value().attr("name").filter(|n| !n.is_empty()) {
            let value = input.value().attr("value").unwrap_or("");
            fields.insert(name.to_string(), value.to_string());
        }
    }
}

/// `<option>` without a `value` attribute submits its text.
fn option_value(option: ElementRef<'_>) -> String {
    match option.value().attr("value") {
        Some(v) => v.to_string(),
        None => option.text().collect::<String>().trim().to_string(),
    }
}

fn resolve_action(action: &str, base: &Url) -> Url {
    let action = action.trim();
    let action = action.strip_prefix("./").unwrap_or(action);
    if action.is_empty() {
        return base.clone();
    }
    base.join(action).unwrap_or_else(|_| base.clone())
}
