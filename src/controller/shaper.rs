//! Post-query shaping of `index` rows: page hook, search highlighting, row hook.

use crate::config::Highlight;
use crate::controller::hooks::RowOutcome;
use crate::controller::RestController;
use crate::error::AppError;
use crate::store::Record;
use regex::{Captures, Regex, RegexBuilder};
use serde_json::Value;

/// Case-insensitive matcher for `term` taken literally.
pub fn matcher(term: &str) -> Result<Regex, AppError> {
    RegexBuilder::new(&regex::escape(term))
        .case_insensitive(true)
        .build()
        .map_err(|e| AppError::BadRequest(format!("search term: {}", e)))
}

/// Wrap every match in `value` (rendered as text, null as "") in a span.
pub fn highlight(value: &Value, pattern: &Regex, style: &Highlight) -> Value {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let (attr, style_value) = match style {
        Highlight::Class(c) => ("class", c.as_str()),
        Highlight::Color(c) => ("color", c.as_str()),
    };
    let marked = pattern.replace_all(&text, |caps: &Captures| {
        format!("<span {}=\"{}\">{}</span>", attr, style_value, &caps[0])
    });
    Value::String(marked.into_owned())
}

pub async fn shape(ctl: &RestController, rows: Vec<Record>, search: Option<&str>) -> Result<Vec<Record>, AppError> {
    let hooks = ctl.hooks();
    let settings = ctl.settings();

    let rows = match &hooks.on_transform_page {
        Some(hook) => hook(rows, ctl.clone()).await?,
        None => rows,
    };

    let marker = match (search, &settings.highlight) {
        (Some(term), Some(style)) if !settings.searchable.is_empty() => Some((matcher(term)?, style)),
        _ => None,
    };

    let mut shaped = Vec::with_capacity(rows.len());
    for mut row in rows {
        if let Some((pattern, style)) = &marker {
            for field in &settings.searchable {
                if let Some(v) = row.get_mut(field) {
                    *v = highlight(v, pattern, style);
                }
            }
        }
        match &hooks.on_transform_row {
            Some(hook) => match hook(&row, ctl) {
                RowOutcome::Keep => shaped.push(row),
                RowOutcome::Replace(replaced) => shaped.push(replaced),
                RowOutcome::Omit => {}
            },
            None => shaped.push(row),
        }
    }
    Ok(shaped)
}
