//! Identity/person registry port.
//!
//! Consumed only to decide whether a notification artifact is owed after
//! finalization; never to alter calculation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: String,
    pub address: Option<String>,
    pub email: Option<String>,
}

pub trait PersonRegistry: Send + Sync {
    fn contact_info_for(&self, person_id: &str) -> Option<ContactInfo>;
}

/// Registry backed by a fixed map; what the facade and tests use.
#[derive(Debug, Clone, Default)]
pub struct StaticPersonRegistry {
    contacts: HashMap<String, ContactInfo>,
}

impl StaticPersonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contact(mut self, person_id: &str, contact: ContactInfo) -> Self {
        self.contacts.insert(person_id.to_string(), contact);
        self
    }
}

impl PersonRegistry for StaticPersonRegistry {
    fn contact_info_for(&self, person_id: &str) -> Option<ContactInfo> {
        self.contacts.get(person_id).cloned()
    }
}
