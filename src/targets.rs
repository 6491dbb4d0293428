//! Turns listing records into deletion targets.

use crate::api::{EndpointRecord, EntityRecord};
use std::fmt;

/// A record normalized for the delete/verify loop, whichever listing it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionTarget {
    pub name: String,
    /// Identifier used by the verify call
    pub entity_id: String,
    /// Suffix of the delete URL
    pub device_id_for_url: String,
    pub description: String,
}

impl DeletionTarget {
    /// Both the verify path and the delete path need a non-empty id; an empty
    /// one would address the collection instead of the device.
    pub fn is_addressable(&self) -> bool {
        !self.entity_id.trim().is_empty() && !self.device_id_for_url.trim().is_empty()
    }
}

impl fmt::Display for DeletionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: '{}', Entity ID: '{}', Device ID: '{}', Description: '{}'",
            self.name, self.entity_id, self.device_id_for_url, self.description
        )
    }
}

/// `.` becomes `%23`, the " via Home Assistant" suffix goes, then lowercase.
pub fn transform_device_id_for_url(description: &str) -> String {
    description
        .replace('.', "%23")
        .replace(" via Home Assistant", "")
        .to_lowercase()
}

/// Case-sensitive containment, no trimming.
pub fn matches_filter(field: &str, filter_text: &str) -> bool {
    field.contains(filter_text)
}

/// A listing record that can be filtered and turned into a [`DeletionTarget`].
pub trait TargetSource {
    /// The field the filter text is matched against
    fn filter_field(&self) -> &str;

    fn to_target(&self) -> DeletionTarget;
}

impl TargetSource for EntityRecord {
    fn filter_field(&self) -> &str {
        &self.description
    }

    fn to_target(&self) -> DeletionTarget {
        DeletionTarget {
            name: self.display_name.clone(),
            entity_id: self.id.clone(),
            device_id_for_url: transform_device_id_for_url(&self.description),
            description: self.description.clone(),
        }
    }
}

impl TargetSource for EndpointRecord {
    fn filter_field(&self) -> &str {
        &self.manufacturer_name
    }

    // Verification goes through applianceKey for endpoints.
    fn to_target(&self) -> DeletionTarget {
        DeletionTarget {
            name: self.friendly_name.clone(),
            entity_id: self.appliance_key.clone(),
            device_id_for_url: transform_device_id_for_url(&self.friendly_description),
            description: self.friendly_description.clone(),
        }
    }
}

/// Matching records split by whether they can be addressed at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub targets: Vec<DeletionTarget>,
    /// Matched, but missing the entity id or the delete URL id
    pub skipped: Vec<DeletionTarget>,
}

impl Selection {
    pub fn matched(&self) -> usize {
        self.targets.len() + self.skipped.len()
    }
}

/// Matching records, in source order.
pub fn select_targets<R: TargetSource>(records: &[R], filter_text: &str) -> Selection {
    let mut selection = Selection::default();
    for target in records
        .iter()
        .filter(|r| matches_filter(r.filter_field(), filter_text))
        .map(TargetSource::to_target)
    {
        if target.is_addressable() {
            selection.targets.push(target);
        } else {
            tracing::warn!(
                name = %target.name,
                entity_id = %target.entity_id,
                device_id = %target.device_id_for_url,
                "matched record has no usable id, skipping"
            );
            selection.skipped.push(target);
        }
    }
    selection
}
