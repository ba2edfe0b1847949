use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::store::{read_json, write_json_atomic};

/// One published item. Records are positional; there is no id field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub image: String,
    pub prompt: String,
    pub title: String,
    #[serde(alias = "date")]
    pub created_at: DateTime<Utc>,
}

/// The catalog document: a JSON array rewritten whole on every change.
/// Only the promoter writes it.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
}

impl Catalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<CatalogRecord>, AppError> {
        Ok(read_json(&self.path)?.unwrap_or_default())
    }

    pub fn save(&self, records: &[CatalogRecord]) -> Result<(), AppError> {
        write_json_atomic(&self.path, records)
    }

    pub fn find_by_title(&self, title: &str) -> Result<Option<CatalogRecord>, AppError> {
        let title = title.trim();
        Ok(self
            .load()?
            .into_iter()
            .find(|r| r.title.eq_ignore_ascii_case(title)))
    }
}
