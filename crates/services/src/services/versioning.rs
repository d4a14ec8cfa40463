//! Decides whether an edit to an event cuts a new version.
//!
//! Only the identity-bearing fields take part: category, action, name, value description and
//! properties. Block, action description, owner, platforms and notes are edited in place.

use db::{models::event_version::EventVersion, types::PropertySpec};

/// The identity-bearing fields of an event, borrowed from a snapshot or a proposal.
#[derive(Debug, Clone, Copy)]
pub struct VersionedFields<'a> {
    pub category: &'a str,
    pub action: &'a str,
    pub name: Option<&'a str>,
    pub value_description: Option<&'a str>,
    pub properties: &'a [PropertySpec],
}

impl<'a> From<&'a EventVersion> for VersionedFields<'a> {
    fn from(version: &'a EventVersion) -> Self {
        Self {
            category: &version.category,
            action: &version.action,
            name: version.name.as_deref(),
            value_description: version.value_description.as_deref(),
            properties: &version.properties,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionChange {
    pub category: bool,
    pub action: bool,
    pub name: bool,
    pub value_description: bool,
    pub properties: bool,
}

impl VersionChange {
    pub fn requires_new_version(&self) -> bool {
        self.category || self.action || self.name || self.value_description || self.properties
    }

    pub fn changed_fields(&self) -> Vec<&'static str> {
        [
            (self.category, "category"),
            (self.action, "action"),
            (self.name, "name"),
            (self.value_description, "value_description"),
            (self.properties, "properties"),
        ]
        .into_iter()
        .filter_map(|(changed, field)| changed.then_some(field))
        .collect()
    }
}

pub fn diff(current: &VersionedFields<'_>, proposed: &VersionedFields<'_>) -> VersionChange {
    VersionChange {
        category: current.category != proposed.category,
        action: current.action != proposed.action,
        name: current.name != proposed.name,
        value_description: current.value_description != proposed.value_description,
        properties: current.properties != proposed.properties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn property(name: &str, required: bool) -> PropertySpec {
        PropertySpec {
            name: name.to_string(),
            property_type: "string".to_string(),
            required,
            description: String::new(),
        }
    }

    fn base(properties: &[PropertySpec]) -> VersionedFields<'_> {
        VersionedFields {
            category: "Auth",
            action: "signup",
            name: Some("Sign up"),
            value_description: None,
            properties,
        }
    }

    #[test]
    fn identical_fields_do_not_version() {
        let properties = vec![property("plan", true)];
        let change = diff(&base(&properties), &base(&properties));
        assert!(!change.requires_new_version());
        assert!(change.changed_fields().is_empty());
    }

    #[test]
    fn each_identity_field_versions() {
        let properties = vec![property("plan", true)];
        let current = base(&properties);

        let proposals = [
            VersionedFields {
                category: "Billing",
                ..current
            },
            VersionedFields {
                action: "signup_v2",
                ..current
            },
            VersionedFields {
                name: None,
                ..current
            },
            VersionedFields {
                value_description: Some("plan price"),
                ..current
            },
        ];
        for proposed in proposals {
            assert!(diff(&current, &proposed).requires_new_version());
        }
    }

    #[test]
    fn properties_compare_deeply() {
        let current_properties = vec![property("plan", true)];
        let same = vec![property("plan", true)];
        let optional = vec![property("plan", false)];
        let reordered = vec![property("seats", false), property("plan", true)];

        let current = base(&current_properties);
        assert!(!diff(&current, &base(&same)).requires_new_version());

        let change = diff(&current, &base(&optional));
        assert_eq!(change.changed_fields(), vec!["properties"]);
        assert!(diff(&current, &base(&reordered)).requires_new_version());
    }
}
