use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::ApiError;

/// Body accepted by create and update.
#[derive(Debug, Clone, Deserialize)]
pub struct SatcomInput {
    pub company: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub date: String,
    pub time: String,
    #[serde(alias = "dbPort")]
    pub db_port: String,
    #[serde(alias = "uiPort")]
    pub ui_port: String,
    pub url: String,
    pub ip: String,
    #[serde(default)]
    pub status: bool,
}

impl SatcomInput {
    /// Trims every text field and rejects blanks.
    pub fn validated(mut self) -> Result<Self, ApiError> {
        let fields: [(&str, &mut String); 9] = [
            ("company", &mut self.company),
            ("category", &mut self.category),
            ("type", &mut self.kind),
            ("date", &mut self.date),
            ("time", &mut self.time),
            ("db_port", &mut self.db_port),
            ("ui_port", &mut self.ui_port),
            ("url", &mut self.url),
            ("ip", &mut self.ip),
        ];
        for (name, value) in fields {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(ApiError::Validation(format!("{name} is required")));
            }
            *value = trimmed.to_string();
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Satcom {
    pub id: i32,
    pub company: String,
    pub category: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,
    pub date: String,
    pub time: String,
    pub db_port: String,
    pub ui_port: String,
    pub url: String,
    pub ip: String,
    pub status: bool,
}
