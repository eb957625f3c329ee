//! C5 Template Registry: reads active templates with their current version, enforcing
//! tenant-before-global ordering and the exactly-one-current-version invariant (the
//! store layer already refuses to return templates lacking a current version).
use std::sync::Arc;

use serde_json::Value;

use crate::store::dao::ContentStore;
use crate::store::models::ActiveTemplate;

pub struct TemplateRegistry {
    store: Arc<dyn ContentStore>,
}

impl TemplateRegistry {
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    pub async fn active_templates(&self, account_id: &str) -> anyhow::Result<Vec<ActiveTemplate>> {
        self.store.active_templates_with_current_version(account_id).await
    }
}

/// Best-effort parse of a template's `ui_config` column. Malformed configuration
/// degrades to the default (empty object) and the caller is expected to log a warning,
/// per the data-corruption row in the error handling design.
#[must_use]
pub fn parse_ui_config(raw: &Value) -> Value {
    if raw.is_object() {
        raw.clone()
    } else {
        serde_json::json!({})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ui_config_degrades_non_object_to_default() {
        assert_eq!(parse_ui_config(&Value::Null), serde_json::json!({}));
        assert_eq!(parse_ui_config(&Value::String("oops".into())), serde_json::json!({}));
    }

    #[test]
    fn parse_ui_config_passes_through_valid_object() {
        let config = serde_json::json!({"theme": "dark"});
        assert_eq!(parse_ui_config(&config), config);
    }
}
