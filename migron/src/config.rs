use serde::Deserialize;

fn default_port() -> u16 {
    5432
}

fn default_admin_database() -> String {
    "postgres".to_owned()
}

/// Connection settings for one provisioning run.
///
/// Credentials arrive already resolved; this crate never talks to a secret
/// store. The administrative database is only used for bootstrap work that
/// cannot run inside the target database (database creation).
#[derive(Debug, Clone, Deserialize)]
pub struct PgConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_admin_database")]
    pub admin_database: String,
}

impl PgConfig {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            username: username.into(),
            password: password.into(),
            database: database.into(),
            admin_database: default_admin_database(),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn admin_database(mut self, name: impl Into<String>) -> Self {
        self.admin_database = name.into();
        self
    }
}
