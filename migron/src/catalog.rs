use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::error::{ProvisionError, Result};

/// One migration step owned by a single service.
///
/// The payload is opaque to the engine; it is executed as-is and identified
/// by its checksum for drift detection. Steps flagged `excluded` stay in the
/// catalog for the record but are never planned or applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub version: u32,
    pub description: String,
    pub payload: String,
    #[serde(default)]
    pub excluded: bool,
}

impl Step {
    pub fn new(
        version: u32,
        description: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            version,
            description: description.into(),
            payload: payload.into(),
            excluded: false,
        }
    }

    pub fn excluded(mut self) -> Self {
        self.excluded = true;
        self
    }

    /// SHA-256 hex digest of the payload, the content identity recorded at
    /// apply time and compared on every later run.
    pub fn checksum(&self) -> String {
        format!("{:x}", Sha256::digest(self.payload.as_bytes()))
    }
}

/// A service and its strictly ordered migration steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub schema: String,
    pub steps: Vec<Step>,
}

impl Service {
    pub fn new(name: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: schema.into(),
            steps: Vec::new(),
        }
    }

    pub fn step(
        mut self,
        version: u32,
        description: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        self.steps.push(Step::new(version, description, payload));
        self
    }

    pub fn excluded_step(
        mut self,
        version: u32,
        description: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        self.steps.push(Step::new(version, description, payload).excluded());
        self
    }
}

/// Declarative description of every service, its schema namespace and its
/// migration steps. Pure data, validated at construction, no I/O.
#[derive(Debug, Clone)]
pub struct Catalog {
    services: Vec<Service>,
}

impl Catalog {
    /// Validates and freezes the catalog.
    ///
    /// Rejects a blank schema name, a schema name claimed by two services,
    /// and two steps of one service sharing a version token. Steps are
    /// sorted by version so later stages can rely on ascending order.
    pub fn new(mut services: Vec<Service>) -> Result<Self> {
        let mut schemas = HashSet::new();

        for service in services.iter_mut() {
            if service.schema.trim().is_empty() {
                return Err(ProvisionError::InvalidService(service.name.clone()));
            }

            if !schemas.insert(service.schema.clone()) {
                return Err(ProvisionError::InvalidService(service.name.clone()));
            }

            service.steps.sort_by_key(|step| step.version);

            let duplicate = service
                .steps
                .windows(2)
                .find(|pair| pair[0].version == pair[1].version);

            if let Some(pair) = duplicate {
                return Err(ProvisionError::DuplicateStep {
                    service: service.name.clone(),
                    version: pair[0].version,
                });
            }
        }

        Ok(Self { services })
    }

    /// Services in declaration order.
    pub fn services(&self) -> &[Service] {
        &self.services
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|service| service.name == name)
    }

    /// Non-excluded steps of one service, ascending by version.
    pub fn steps_for<'a>(&self, service: &'a Service) -> impl Iterator<Item = &'a Step> {
        service.steps.iter().filter(|step| !step.excluded)
    }
}
