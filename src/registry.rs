// src/registry.rs

//! Jurisdiction schema registry.
//!
//! Maps a stable jurisdiction id to the upstream provider descriptor used
//! to query and normalize that jurisdiction's permit dataset. The table is
//! built once at startup; an unknown id is an error, never a default guess.

use serde::Serialize;

/// Upstream provider protocol for a jurisdiction.
///
/// Only Socrata-style REST querying is implemented. Other variants are
/// declared so new jurisdictions can be registered ahead of support; a
/// fetch against them fails as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    Socrata,
    Arcgis,
    Accela,
}

/// Upstream column names for the canonical record fields.
///
/// `None` means the dataset has no such column; absence is tolerated at
/// normalization time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub id: String,
    pub address: String,
    pub zip: Option<String>,
    pub status: Option<String>,
    pub permit_type: Option<String>,
    pub subtype: Option<String>,
    pub filed_at: String,
    pub valuation: String,
    pub description: String,
}

impl FieldMap {
    /// Deduplicated union of mapped column names, for a `$select` clause.
    pub fn select_fields(&self) -> Vec<&str> {
        let candidates = [
            Some(self.id.as_str()),
            Some(self.address.as_str()),
            self.zip.as_deref(),
            self.status.as_deref(),
            self.permit_type.as_deref(),
            self.subtype.as_deref(),
            Some(self.filed_at.as_str()),
            Some(self.valuation.as_str()),
            Some(self.description.as_str()),
        ];

        let mut fields: Vec<&str> = Vec::new();
        for field in candidates.into_iter().flatten() {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        fields
    }
}

/// Provider descriptor: where the dataset lives and how to read it.
#[derive(Debug, Clone)]
pub struct Provider {
    pub provider_type: ProviderType,
    pub domain: String,
    pub dataset: String,
    /// Primary column-name shape.
    pub fields: FieldMap,
    /// Alternate shape for the same dataset, tried once when a fetch with
    /// the primary shape fails. Column typing and naming drift between
    /// dataset revisions; this is the entire resilience strategy.
    pub alt_fields: Option<FieldMap>,
    /// Columns covered by free-text `$q` search, empty when unsupported.
    pub search_fields: Vec<String>,
}

/// A municipality/agency whose permit dataset is integrated.
#[derive(Debug, Clone)]
pub struct JurisdictionSchema {
    pub id: String,
    pub name: String,
    pub placeholder: bool,
    pub provider: Provider,
}

/// Static jurisdiction lookup table.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    jurisdictions: Vec<JurisdictionSchema>,
}

impl SchemaRegistry {
    /// Build the registry with the built-in jurisdiction table.
    pub fn builtin() -> Self {
        Self {
            jurisdictions: vec![la_city()],
        }
    }

    /// Look up a jurisdiction by exact id.
    pub fn resolve(&self, jurisdiction_id: &str) -> Option<&JurisdictionSchema> {
        self.jurisdictions
            .iter()
            .find(|jurisdiction| jurisdiction.id == jurisdiction_id)
    }

    /// The jurisdiction backing the single-city radar/ranking endpoints.
    pub fn default_jurisdiction(&self) -> &JurisdictionSchema {
        &self.jurisdictions[0]
    }

    pub fn all(&self) -> &[JurisdictionSchema] {
        &self.jurisdictions
    }
}

/// Los Angeles (LADBS) building permits on the city's Socrata portal.
fn la_city() -> JurisdictionSchema {
    JurisdictionSchema {
        id: "la_city".to_string(),
        name: "Los Angeles".to_string(),
        placeholder: true,
        provider: Provider {
            provider_type: ProviderType::Socrata,
            domain: "data.lacity.org".to_string(),
            dataset: "pi9x-tg5x".to_string(),
            fields: FieldMap {
                id: "permit_nbr".to_string(),
                address: "primary_address".to_string(),
                zip: Some("zip_code".to_string()),
                status: None,
                permit_type: Some("permit_type".to_string()),
                subtype: Some("permit_sub_type".to_string()),
                filed_at: "issue_date".to_string(),
                valuation: "valuation".to_string(),
                description: "work_desc".to_string(),
            },
            // Older exports of the same dataset use these column names.
            alt_fields: Some(FieldMap {
                id: "pcis_permit".to_string(),
                address: "address".to_string(),
                zip: Some("zip".to_string()),
                status: None,
                permit_type: Some("permit_type".to_string()),
                subtype: None,
                filed_at: "issue_date".to_string(),
                valuation: "permit_valuation".to_string(),
                description: "work_description".to_string(),
            }),
            search_fields: vec![
                "primary_address".to_string(),
                "permit_nbr".to_string(),
                "work_desc".to_string(),
            ],
        },
    }
}
