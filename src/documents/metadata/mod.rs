#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, warn};

use super::{PolicyMetadata, UNSPECIFIED};
use crate::{PolicyError, Result};

/// Values applied to documents the CSV says nothing about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataDefaults {
    pub department: Option<String>,
    pub region: Option<String>,
    pub policy_type: Option<String>,
}

impl MetadataDefaults {
    fn resolve(&self) -> PolicyMetadata {
        let pick = |value: &Option<String>| {
            non_blank(value.as_deref())
                .unwrap_or(UNSPECIFIED)
                .to_string()
        };

        PolicyMetadata {
            department: pick(&self.department),
            region: pick(&self.region),
            policy_type: pick(&self.policy_type),
            ..PolicyMetadata::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataRow {
    filename: String,
    #[serde(default)]
    department: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    policy_type: Option<String>,
    #[serde(default)]
    effective_date: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// Per-file metadata keyed by filename
#[derive(Debug, Clone, Default)]
pub struct MetadataCatalog {
    entries: BTreeMap<String, PolicyMetadata>,
    defaults: PolicyMetadata,
}

impl MetadataCatalog {
    /// A catalog with no rows; every lookup yields the defaults
    #[inline]
    pub fn new(defaults: &MetadataDefaults) -> Self {
        Self {
            entries: BTreeMap::new(),
            defaults: defaults.resolve(),
        }
    }

    #[inline]
    pub fn from_csv_path(path: &Path, defaults: &MetadataDefaults) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| {
            PolicyError::Config(format!(
                "failed to open metadata file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_reader(file, defaults)
    }

    /// Parse CSV with a header row; `filename` is required, blank cells fall back to the defaults
    #[inline]
    pub fn from_reader<R: Read>(reader: R, defaults: &MetadataDefaults) -> Result<Self> {
        let mut catalog = Self::new(defaults);

        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        for (line, record) in csv_reader.deserialize::<MetadataRow>().enumerate() {
            let row = record.map_err(|e| {
                PolicyError::Config(format!("invalid metadata row {}: {}", line + 2, e))
            })?;

            let Some(filename) = non_blank(Some(&row.filename))
                .and_then(|name| Path::new(name).file_name())
                .map(|name| name.to_string_lossy().to_string())
            else {
                warn!("Skipping metadata row {} without a filename", line + 2);
                continue;
            };

            let base = &catalog.defaults;
            let field = |value: &Option<String>, fallback: &str| {
                non_blank(value.as_deref()).unwrap_or(fallback).to_string()
            };

            let metadata = PolicyMetadata {
                department: field(&row.department, &base.department),
                region: field(&row.region, &base.region),
                policy_type: field(&row.policy_type, &base.policy_type),
                effective_date: field(&row.effective_date, &base.effective_date),
                description: field(&row.description, &base.description),
            };

            if catalog.entries.insert(filename.clone(), metadata).is_some() {
                warn!("Duplicate metadata row for {}, keeping the last one", filename);
            }
        }

        debug!("Loaded metadata for {} files", catalog.entries.len());
        Ok(catalog)
    }

    /// Metadata for `filename`, or the defaults when no row names it
    #[inline]
    pub fn lookup(&self, filename: &str) -> PolicyMetadata {
        self.entries
            .get(filename)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }

    #[inline]
    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rows whose file is not among `present`, each logged as a warning
    #[inline]
    pub fn unmatched<'a>(&'a self, present: &[String]) -> Vec<&'a str> {
        let missing: Vec<&str> = self
            .entries
            .keys()
            .filter(|name| !present.iter().any(|p| p == *name))
            .map(String::as_str)
            .collect();

        for name in &missing {
            warn!("Metadata names {} but no such PDF was found", name);
        }

        missing
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
