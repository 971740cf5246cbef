use crate::engine::{AppliedStep, Engine};
use crate::error::{ProvisionError, Result};
use crate::plan::PlannedStep;

/// Outcome of driving one planned step against the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Applied,
    Skipped,
}

/// Applies one step at a time, consulting the history table first so every
/// step is safe to re-issue.
pub struct Applier {
    engine: Box<dyn Engine>,
}

impl Applier {
    pub fn new<E: Engine + 'static>(engine: E) -> Self {
        Self {
            engine: Box::new(engine),
        }
    }

    pub(crate) fn from_boxed(engine: Box<dyn Engine>) -> Self {
        Self { engine }
    }

    /// Skip if already applied with identical content, refuse on drift,
    /// otherwise execute the payload and record it in one unit of work.
    pub async fn apply(&self, step: &PlannedStep) -> Result<StepOutcome> {
        match self.engine.record(&step.service, step.version).await? {
            Some(record) if record.checksum == step.checksum => {
                tracing::debug!(
                    service = %step.service,
                    version = step.version,
                    "already applied, skipping"
                );

                Ok(StepOutcome::Skipped)
            }
            Some(_) => Err(ProvisionError::MigrationDrift {
                service: step.service.clone(),
                version: step.version,
            }),
            None => {
                let record =
                    AppliedStep::new(step.service.clone(), step.version, step.checksum.clone());

                self.engine
                    .apply(&step.payload, record)
                    .await
                    .map_err(|cause| ProvisionError::StepApplication {
                        service: step.service.clone(),
                        version: step.version,
                        cause: anyhow::Error::new(cause),
                    })?;

                tracing::info!(
                    service = %step.service,
                    version = step.version,
                    description = %step.description,
                    "applied"
                );

                Ok(StepOutcome::Applied)
            }
        }
    }
}
