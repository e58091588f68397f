//! Port domain model

use serde::{Deserialize, Serialize};

/// Kind of data flowing through a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    /// Tabular data
    Table,
    /// Opaque binary payload
    Binary,
    /// A connection handle; linked only to ports with a matching id
    Connection,
}

/// A named input or output slot of a stage
///
/// The port name doubles as the cache key through which the slot's value
/// travels between stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    #[serde(rename = "type")]
    pub port_type: PortType,

    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Used by binary and connection ports to restrict linking to matching ids
    #[serde(default)]
    pub id: Option<String>,

    /// Optional inputs read as `null` when nothing is cached for them
    #[serde(default)]
    pub optional: bool,
}

impl Port {
    pub fn new(port_type: PortType, name: impl Into<String>) -> Self {
        Self {
            port_type,
            name: name.into(),
            description: None,
            id: None,
            optional: false,
        }
    }

    /// A required table port
    pub fn table(name: impl Into<String>) -> Self {
        Self::new(PortType::Table, name)
    }

    /// A table port that may be left unfilled
    pub fn optional_table(name: impl Into<String>) -> Self {
        Self::table(name).optional()
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}
