use migron::{Catalog, Edge, Pg, PgConfig, Service, Session};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let catalog = Catalog::new(vec![
        Service::new("tenant", "tenant")
            .step(
                1,
                "tenants table",
                r#"
                CREATE TABLE IF NOT EXISTS tenant.tenants (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    code varchar(32) NOT NULL UNIQUE,
                    name text NOT NULL,
                    created_at timestamptz NOT NULL DEFAULT now(),
                    updated_at timestamptz
                );
                CREATE TRIGGER tenants_touch BEFORE UPDATE ON tenant.tenants
                    FOR EACH ROW EXECUTE FUNCTION touch_updated_at();
                "#,
            ),
        Service::new("employee", "employee")
            .step(
                1,
                "employees table with row level security",
                r#"
                CREATE TABLE IF NOT EXISTS employee.employees (
                    id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
                    tenant_id uuid NOT NULL,
                    name text NOT NULL,
                    created_at timestamptz NOT NULL DEFAULT now(),
                    updated_at timestamptz
                );
                ALTER TABLE employee.employees ENABLE ROW LEVEL SECURITY;
                CREATE POLICY employees_by_tenant ON employee.employees
                    USING (tenant_id = current_tenant());
                "#,
            ),
    ])?;

    let mut session = Session::new(catalog, vec![Edge::new("employee", "tenant")])?
        .auxiliary_database("keycloak")
        .extension("pgcrypto");

    let config = PgConfig::new("localhost", "postgres", "postgres", "hr");
    let engine = Pg::connect(&config).await?;

    let summary = session.run(engine).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
