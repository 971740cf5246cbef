use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("service `{0}` has an empty or duplicate schema name")]
    InvalidService(String),

    #[error("service `{service}` declares version {version} more than once")]
    DuplicateStep { service: String, version: u32 },

    #[error("dependency cycle between services: {0}")]
    CyclicDependency(String),

    #[error("dependency edge references unknown service `{0}`")]
    UnknownService(String),

    #[error("step {service} v{version} was already applied with different content")]
    MigrationDrift { service: String, version: u32 },

    #[error("step {service} v{version} failed")]
    StepApplication {
        service: String,
        version: u32,
        #[source]
        cause: anyhow::Error,
    },

    #[error("tenant context round trip failed: set {expected}, read back {got:?}")]
    TenantVerification { expected: Uuid, got: Option<Uuid> },

    #[cfg(feature = "pg")]
    #[error("cannot reach target database")]
    Connection(#[source] sqlx::Error),

    #[cfg(feature = "pg")]
    #[error("sqlx `{0}`")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Any(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
