// Documents module
// Source policy documents, their metadata, and text extraction

pub mod extractor;
pub mod metadata;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use extractor::{PdfExtractor, TextExtractor, clean_text};
pub use metadata::{MetadataCatalog, MetadataDefaults};

/// Value used for any metadata field nobody supplied
pub const UNSPECIFIED: &str = "Unspecified";

/// Document-level attributes copied onto every chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMetadata {
    pub department: String,
    pub region: String,
    pub policy_type: String,
    pub effective_date: String,
    pub description: String,
}

impl Default for PolicyMetadata {
    #[inline]
    fn default() -> Self {
        Self {
            department: UNSPECIFIED.to_string(),
            region: UNSPECIFIED.to_string(),
            policy_type: UNSPECIFIED.to_string(),
            effective_date: UNSPECIFIED.to_string(),
            description: UNSPECIFIED.to_string(),
        }
    }
}

impl PolicyMetadata {
    /// Value of a metadata field; `Filename` is not part of the metadata and yields `None`
    #[inline]
    pub fn get(&self, field: MetadataField) -> Option<&str> {
        match field {
            MetadataField::Filename => None,
            MetadataField::Department => Some(&self.department),
            MetadataField::Region => Some(&self.region),
            MetadataField::PolicyType => Some(&self.policy_type),
            MetadataField::EffectiveDate => Some(&self.effective_date),
            MetadataField::Description => Some(&self.description),
        }
    }
}

/// Attributes stored with each index entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataField {
    Filename,
    Department,
    Region,
    PolicyType,
    EffectiveDate,
    Description,
}

impl MetadataField {
    pub const ALL: [MetadataField; 6] = [
        MetadataField::Filename,
        MetadataField::Department,
        MetadataField::Region,
        MetadataField::PolicyType,
        MetadataField::EffectiveDate,
        MetadataField::Description,
    ];

    /// Column name in the index table and in the metadata CSV
    #[inline]
    pub const fn column_name(self) -> &'static str {
        match self {
            MetadataField::Filename => "filename",
            MetadataField::Department => "department",
            MetadataField::Region => "region",
            MetadataField::PolicyType => "policy_type",
            MetadataField::EffectiveDate => "effective_date",
            MetadataField::Description => "description",
        }
    }

    /// Free-text descriptions are never matched exactly
    #[inline]
    pub const fn is_filterable(self) -> bool {
        !matches!(self, MetadataField::Description)
    }
}

impl fmt::Display for MetadataField {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for MetadataField {
    type Err = String;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "filename" | "file" => Ok(MetadataField::Filename),
            "department" | "dept" => Ok(MetadataField::Department),
            "region" => Ok(MetadataField::Region),
            "policy_type" | "type" => Ok(MetadataField::PolicyType),
            "effective_date" => Ok(MetadataField::EffectiveDate),
            "description" => Ok(MetadataField::Description),
            other => Err(format!(
                "unknown metadata field '{}' (expected one of: {})",
                other,
                MetadataField::ALL
                    .iter()
                    .map(|f| f.column_name())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }
}

/// A source policy file with its extracted text
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub filename: String,
    pub source_path: PathBuf,
    pub text: String,
    pub metadata: PolicyMetadata,
}

impl Document {
    #[inline]
    pub fn new(
        filename: impl Into<String>,
        source_path: impl Into<PathBuf>,
        text: impl Into<String>,
        metadata: PolicyMetadata,
    ) -> Self {
        Self {
            filename: filename.into(),
            source_path: source_path.into(),
            text: text.into(),
            metadata,
        }
    }
}
