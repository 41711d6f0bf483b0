//! Instruction template for the translator model.
//!
//! The hint table maps words people use for kinds of files to the concrete
//! `mimeType` filters the search backend understands. It is data: the default
//! table can be replaced from a JSON file without touching the template.

use std::collections::BTreeMap;
use std::path::Path;

use crate::domain::INVALID_SENTINEL;
use crate::error::ConfigError;

const DEFAULT_HINTS: &[(&str, &str)] = &[
    ("document", "mimeType = 'application/vnd.google-apps.document'"),
    ("folder", "mimeType = 'application/vnd.google-apps.folder'"),
    ("image", "mimeType contains 'image/'"),
    ("pdf", "mimeType = 'application/pdf'"),
    ("photo", "mimeType contains 'image/'"),
    ("presentation", "mimeType = 'application/vnd.google-apps.presentation'"),
    ("report", "mimeType = 'application/pdf'"),
    ("slides", "mimeType = 'application/vnd.google-apps.presentation'"),
    ("spreadsheet", "mimeType = 'application/vnd.google-apps.spreadsheet'"),
    ("video", "mimeType contains 'video/'"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    hints: BTreeMap<String, String>,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            hints: DEFAULT_HINTS
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl PromptTemplate {
    pub fn with_hints(hints: BTreeMap<String, String>) -> Self {
        Self { hints }
    }

    /// Parse a `{"hint": "filter", ...}` object.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::with_hints(serde_json::from_str(json)?))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let err = |reason: String| ConfigError::TypeHints {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
        Self::from_json(&raw).map_err(|e| err(e.to_string()))
    }

    pub fn hints(&self) -> &BTreeMap<String, String> {
        &self.hints
    }

    pub fn render(&self, request: &str) -> String {
        let mut prompt = String::from(
            "Translate the following request into a query for the Google Drive files API.\n\
             Answer ONLY with the query expression.\n\
             Never use backticks or any code formatting.\n\
             Do not add clauses about trashed files or parent folders.\n",
        );
        prompt.push_str(&format!(
            "If the request is not about finding files, answer exactly {INVALID_SENTINEL}.\n"
        ));

        if !self.hints.is_empty() {
            prompt.push_str("\nWhen the request mentions a kind of file, use these filters:\n");
            for (hint, filter) in &self.hints {
                prompt.push_str(&format!("- {hint}: {filter}\n"));
            }
        }

        prompt.push_str(&format!("\nRequest: \"{request}\"\nQuery:"));
        prompt
    }
}
