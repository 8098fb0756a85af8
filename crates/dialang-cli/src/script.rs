//! Scripted test sessions.
//!
//! A script supplies everything a test taker would type into the forms:
//! the language choices, the pre-test answers, and the responses for each
//! basket the engine may present, keyed by basket id.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use dialang_core::form::FormFields;
use dialang_core::session::{ClientInfo, Tes};

#[derive(Debug, Clone, Deserialize)]
pub struct SessionScript {
    pub admin_language: String,
    pub test_language: String,
    pub skill: String,
    #[serde(default)]
    pub tes: Tes,
    #[serde(default)]
    pub client: ClientInfo,
    /// VSPT form fields. Skipped when empty.
    #[serde(default)]
    pub vspt: HashMap<String, toml::Value>,
    /// Self-assessment form fields. Skipped when empty.
    #[serde(default)]
    pub sa: HashMap<String, toml::Value>,
    #[serde(default)]
    pub baskets: HashMap<String, HashMap<String, toml::Value>>,
    #[serde(default)]
    pub questionnaire: HashMap<String, toml::Value>,
}

impl SessionScript {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse script: {}", path.display()))
    }

    pub fn vspt_fields(&self) -> Result<Option<FormFields>> {
        optional_fields(&self.vspt)
    }

    pub fn sa_fields(&self) -> Result<Option<FormFields>> {
        optional_fields(&self.sa)
    }

    pub fn questionnaire_fields(&self) -> Result<Option<FormFields>> {
        optional_fields(&self.questionnaire)
    }

    /// Form fields for one basket, with `basketId` filled in.
    pub fn basket_fields(&self, basket_id: u32) -> Result<FormFields> {
        let raw = self
            .baskets
            .get(&basket_id.to_string())
            .with_context(|| format!("script has no responses for basket {basket_id}"))?;
        let mut fields = to_fields(raw).with_context(|| format!("basket {basket_id}"))?;
        fields.insert("basketId".to_string(), basket_id.to_string());
        Ok(fields)
    }
}

fn optional_fields(raw: &HashMap<String, toml::Value>) -> Result<Option<FormFields>> {
    if raw.is_empty() {
        Ok(None)
    } else {
        to_fields(raw).map(Some)
    }
}

fn to_fields(raw: &HashMap<String, toml::Value>) -> Result<FormFields> {
    raw.iter()
        .map(|(key, value)| Ok((key.clone(), field_value(key, value)?)))
        .collect()
}

fn field_value(key: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        other => anyhow::bail!("field '{key}' must be a string, integer or boolean, got {}", other.type_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"
admin_language = "eng"
test_language = "deu"
skill = "listening"

[tes]
hide_sa = true

[vspt]
"word:deu-r01" = "valid"

[baskets.12]
basketType = "mcq"
itemId = 7
response = 70
"#;

    #[test]
    fn parses_script_and_builds_fields() {
        let script: SessionScript = toml::from_str(SCRIPT).unwrap();
        assert_eq!(script.test_language, "deu");
        assert!(script.tes.hide_sa);
        assert!(script.sa_fields().unwrap().is_none());

        let vspt = script.vspt_fields().unwrap().unwrap();
        assert_eq!(vspt["word:deu-r01"], "valid");

        let basket = script.basket_fields(12).unwrap();
        assert_eq!(basket["basketId"], "12");
        assert_eq!(basket["itemId"], "7");
        assert_eq!(basket["response"], "70");
    }

    #[test]
    fn missing_basket_is_an_error() {
        let script: SessionScript = toml::from_str(SCRIPT).unwrap();
        let err = script.basket_fields(99).unwrap_err();
        assert!(err.to_string().contains("no responses for basket 99"));
    }

    #[test]
    fn rejects_table_values() {
        let script: SessionScript = toml::from_str(
            r#"
admin_language = "eng"
test_language = "eng"
skill = "reading"

[questionnaire]
age = [1, 2]
"#,
        )
        .unwrap();
        assert!(script.questionnaire_fields().is_err());
    }
}
