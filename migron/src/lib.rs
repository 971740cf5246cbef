//! Dependency-ordered, idempotent schema provisioning for multi-tenant
//! Postgres deployments.
//!
//! A deployment is described as a [`Catalog`] of services, each owning a
//! schema namespace and a strictly ordered list of migration steps, plus
//! explicit dependency [`Edge`]s between services. [`Plan::build`] resolves
//! that into one deterministic execution sequence, and a [`Session`] drives
//! it against an [`Engine`]: bootstrap databases and schemas first, then the
//! row-level-security tenant context, then every pending step. Applied steps
//! are recorded with a payload checksum, so re-running a session is a no-op
//! for completed work and a hard error when historical content drifted.
//!
//! # Features
//!
//! - **`memory`** (default) - In-process engine, no database required
//! - **`pg`** - PostgreSQL engine backed by sqlx
//!
//! # Usage
//!
//! ```rust,ignore
//! use migron::{Catalog, Edge, Pg, PgConfig, Service, Session};
//!
//! let catalog = Catalog::new(vec![
//!     Service::new("tenant", "tenant")
//!         .step(1, "tenants table", include_str!("../sql/tenant/v1.sql")),
//!     Service::new("employee", "employee")
//!         .step(1, "employees table", include_str!("../sql/employee/v1.sql")),
//! ])?;
//!
//! let mut session = Session::new(catalog, vec![Edge::new("employee", "tenant")])?
//!     .auxiliary_database("keycloak")
//!     .extension("pgcrypto");
//!
//! let engine = Pg::connect(&PgConfig::new("localhost", "postgres", "secret", "hr")).await?;
//! let summary = session.run(engine).await?;
//! ```
#![forbid(unsafe_code)]

mod apply;
mod catalog;
mod config;
mod engine;
mod error;
mod plan;
mod session;
mod tenant;

pub use apply::*;
pub use catalog::*;
pub use config::*;
pub use engine::*;
pub use error::*;
pub use plan::*;
pub use session::*;
pub use tenant::*;
