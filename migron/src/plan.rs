use serde::Serialize;

use crate::catalog::Catalog;
use crate::error::{ProvisionError, Result};

/// Directed dependency between services: `service` must not start migrating
/// until `depends_on` is fully migrated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub service: String,
    pub depends_on: String,
}

impl Edge {
    pub fn new(service: impl Into<String>, depends_on: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            depends_on: depends_on.into(),
        }
    }
}

/// One entry of the execution plan, detached from the catalog so the plan
/// stays immutable for the whole run.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub service: String,
    pub schema: String,
    pub version: u32,
    pub description: String,
    pub payload: String,
    pub checksum: String,
}

/// The totally ordered sequence of steps for one provisioning run.
#[derive(Debug, Clone)]
pub struct Plan {
    steps: Vec<PlannedStep>,
}

impl Plan {
    /// Topologically orders services with Kahn's algorithm, breaking ties by
    /// catalog declaration order so an unchanged catalog always plans the
    /// same sequence. Within a service, steps come out ascending by version
    /// with excluded steps omitted.
    pub fn build(catalog: &Catalog, edges: &[Edge]) -> Result<Self> {
        let services = catalog.services();

        let index_of = |name: &str| -> Result<usize> {
            services
                .iter()
                .position(|service| service.name == name)
                .ok_or_else(|| ProvisionError::UnknownService(name.to_owned()))
        };

        let mut indegree = vec![0usize; services.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); services.len()];

        for edge in edges {
            let from = index_of(&edge.depends_on)?;
            let to = index_of(&edge.service)?;

            indegree[to] += 1;
            dependents[from].push(to);
        }

        let mut emitted = vec![false; services.len()];
        let mut order = Vec::with_capacity(services.len());

        while order.len() < services.len() {
            // Lowest declaration index among the ready services. Quadratic,
            // but catalogs are tens of services at most.
            let next = (0..services.len())
                .find(|&idx| !emitted[idx] && indegree[idx] == 0);

            let Some(next) = next else {
                let stuck: Vec<&str> = services
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !emitted[*idx])
                    .map(|(_, service)| service.name.as_str())
                    .collect();

                return Err(ProvisionError::CyclicDependency(stuck.join(", ")));
            };

            emitted[next] = true;
            order.push(next);

            for &dependent in &dependents[next] {
                indegree[dependent] -= 1;
            }
        }

        let mut steps = Vec::new();

        for idx in order {
            let service = &services[idx];

            for step in catalog.steps_for(service) {
                steps.push(PlannedStep {
                    service: service.name.clone(),
                    schema: service.schema.clone(),
                    version: step.version,
                    description: step.description.clone(),
                    payload: step.payload.clone(),
                    checksum: step.checksum(),
                });
            }
        }

        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[PlannedStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
