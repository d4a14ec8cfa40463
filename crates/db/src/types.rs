use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use ts_rs::TS;

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Platform {
    #[sea_orm(string_value = "web")]
    Web,
    #[sea_orm(string_value = "ios")]
    Ios,
    #[sea_orm(string_value = "android")]
    Android,
    #[sea_orm(string_value = "backend")]
    Backend,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ImplementationStatus {
    #[default]
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "in_development")]
    InDevelopment,
    #[sea_orm(string_value = "implemented")]
    Implemented,
    #[sea_orm(string_value = "archived")]
    Archived,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
    Default,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ValidationStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "valid")]
    Valid,
    #[sea_orm(string_value = "error")]
    Error,
    #[sea_orm(string_value = "warning")]
    Warning,
}

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    TS,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Text")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatusType {
    #[sea_orm(string_value = "implementation")]
    Implementation,
    #[sea_orm(string_value = "validation")]
    Validation,
}

/// One tracked property of an event payload. Compared structurally when deciding
/// whether an edit cuts a new version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct PropertySpec {
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// Deduplicates platforms while keeping the caller's order.
pub fn normalize_platforms(platforms: &[Platform]) -> Vec<Platform> {
    let mut seen = Vec::with_capacity(platforms.len());
    for platform in platforms {
        if !seen.contains(platform) {
            seen.push(*platform);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn status_strings_match_storage_values() {
        assert_eq!(ImplementationStatus::InDevelopment.to_string(), "in_development");
        assert_eq!(
            ImplementationStatus::from_str("implemented").unwrap(),
            ImplementationStatus::Implemented
        );
        assert_eq!(ValidationStatus::Warning.to_string(), "warning");
        assert_eq!(Platform::from_str("ios").unwrap(), Platform::Ios);
    }

    #[test]
    fn normalize_platforms_drops_duplicates_in_order() {
        let platforms = normalize_platforms(&[Platform::Ios, Platform::Web, Platform::Ios]);
        assert_eq!(platforms, vec![Platform::Ios, Platform::Web]);
    }

    #[test]
    fn property_spec_uses_type_key() {
        let spec: PropertySpec = serde_json::from_value(serde_json::json!({
            "name": "plan",
            "type": "string",
            "required": true,
            "description": "Selected plan"
        }))
        .unwrap();
        assert_eq!(spec.property_type, "string");
        let back = serde_json::to_value(&spec).unwrap();
        assert_eq!(back["type"], "string");
    }
}
