//! Fail-fast checks run when a controller is built.

use crate::config::{ControllerSettings, EntityDescriptor, Highlight, SoftDelete};
use crate::error::ConfigError;

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.into(),
        reason: reason.into(),
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

pub fn validate_entity(entity: &EntityDescriptor) -> Result<(), ConfigError> {
    if is_blank(&entity.table) {
        return Err(ConfigError::Missing("entity table"));
    }
    if is_blank(&entity.primary_key) {
        return Err(ConfigError::Missing("entity primary key"));
    }
    if let Some(a) = entity.attributes.iter().find(|a| is_blank(a)) {
        return Err(invalid("attributes", format!("blank attribute name {:?}", a)));
    }
    Ok(())
}

pub fn validate_settings(settings: &ControllerSettings) -> Result<(), ConfigError> {
    if settings.rows == 0 {
        return Err(invalid("rows", "page size must be at least 1"));
    }
    if let Some(ds) = &settings.data_source {
        if is_blank(ds) {
            return Err(invalid("data_source", "must not be blank"));
        }
    }
    for (kind, list) in [("sortable", &settings.sortable), ("searchable", &settings.searchable)] {
        if list.iter().any(|f| is_blank(f)) {
            return Err(invalid(kind, "field names must not be blank"));
        }
    }
    for (logical, expr) in &settings.column_aliases {
        if is_blank(logical) || is_blank(expr) {
            return Err(invalid("column_aliases", format!("{:?} -> {:?}", logical, expr)));
        }
    }
    if let Some(f) = &settings.default_sort_by {
        if is_blank(f) {
            return Err(invalid("default_sort_by", "must not be blank"));
        }
    }
    if let SoftDelete::ByAlias(alias) = &settings.soft_deletes {
        if is_blank(alias) {
            return Err(invalid("soft_deletes", "alias must not be blank"));
        }
    }
    match &settings.highlight {
        Some(Highlight::Class(v)) | Some(Highlight::Color(v)) if is_blank(v) => {
            return Err(invalid("highlight", "style value must not be blank"));
        }
        _ => {}
    }
    if let Some(tree) = &settings.tree {
        if is_blank(&tree.parent) {
            return Err(invalid("tree.parent", "must not be blank"));
        }
        if is_blank(&tree.children_count) {
            return Err(invalid("tree.children_count", "must not be blank"));
        }
        for (name, v) in [("tree.order_column", &tree.order_column), ("tree.position_key", &tree.position_key)] {
            if v.as_deref().map(is_blank).unwrap_or(false) {
                return Err(invalid(name, "must not be blank"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeSettings;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_settings(&ControllerSettings::default()).is_ok());
        assert!(validate_entity(&EntityDescriptor::new("users", "id")).is_ok());
    }

    #[test]
    fn missing_descriptor_parts_fail() {
        assert!(matches!(
            validate_entity(&EntityDescriptor::new(" ", "id")),
            Err(ConfigError::Missing("entity table"))
        ));
        assert!(matches!(
            validate_entity(&EntityDescriptor::new("users", "")),
            Err(ConfigError::Missing("entity primary key"))
        ));
    }

    #[test]
    fn zero_rows_fails() {
        let s = ControllerSettings {
            rows: 0,
            ..Default::default()
        };
        assert!(validate_settings(&s).is_err());
    }

    #[test]
    fn blank_tree_fields_fail() {
        let s = ControllerSettings {
            tree: Some(TreeSettings {
                order_column: Some("".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = validate_settings(&s).unwrap_err();
        assert!(err.to_string().contains("tree.order_column"));
    }

    #[test]
    fn blank_highlight_fails() {
        let s = ControllerSettings {
            highlight: Some(Highlight::Color("  ".into())),
            ..Default::default()
        };
        assert!(validate_settings(&s).is_err());
    }
}
