#![cfg(feature = "memory")]

use migron::{
    Catalog, Edge, Memory, ProvisionError, Service, Session, SessionState, TenantContext,
};
use tracing_test::traced_test;

fn hr_catalog() -> Catalog {
    Catalog::new(vec![
        Service::new("tenant", "tenant")
            .step(1, "tenants table", "CREATE TABLE tenant.tenants (id uuid PRIMARY KEY)")
            .step(2, "tenant features", "CREATE TABLE tenant.features (id uuid PRIMARY KEY)")
            .step(3, "tenant policies", "ALTER TABLE tenant.tenants ENABLE ROW LEVEL SECURITY"),
        Service::new("employee", "employee")
            .step(1, "employees table", "CREATE TABLE employee.employees (id uuid PRIMARY KEY)")
            .step(2, "employee rls", "ALTER TABLE employee.employees ENABLE ROW LEVEL SECURITY"),
    ])
    .unwrap()
}

fn hr_edges() -> Vec<Edge> {
    vec![Edge::new("employee", "tenant")]
}

#[traced_test]
#[tokio::test]
async fn fresh_target_applies_everything() {
    let engine = Memory::new();
    let mut session = Session::new(hr_catalog(), hr_edges())
        .unwrap()
        .auxiliary_database("keycloak")
        .extension("pgcrypto");

    let summary = session.run(engine.clone()).await.unwrap();

    assert_eq!(session.state(), SessionState::Completed);
    assert_eq!(summary.applied, 5);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.databases, vec!["keycloak".to_owned()]);
    assert_eq!(
        summary.schemas,
        vec!["tenant".to_owned(), "employee".to_owned()]
    );
    assert!(summary.tenant_context_verified);
    assert!(engine.tenant_context_installed());
    assert_eq!(engine.applied_versions("tenant"), vec![1, 2, 3]);
    assert_eq!(engine.applied_versions("employee"), vec![1, 2]);
    assert!(logs_contain("provisioning completed"));
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let engine = Memory::new();

    let mut first = Session::new(hr_catalog(), hr_edges()).unwrap();
    first.run(engine.clone()).await.unwrap();

    let statements_after_first = engine.statements().len();

    let mut second = Session::new(hr_catalog(), hr_edges()).unwrap();
    let summary = second.run(engine.clone()).await.unwrap();

    assert_eq!(summary.applied, 0);
    assert_eq!(summary.skipped, 5);
    assert!(summary.tenant_context_verified);
    assert_eq!(engine.statements().len(), statements_after_first);
}

#[tokio::test]
async fn drifted_step_halts_before_anything_else_runs() {
    let engine = Memory::new();

    let mut first = Session::new(hr_catalog(), hr_edges()).unwrap();
    first.run(engine.clone()).await.unwrap();

    let statements_before = engine.statements().len();

    let drifted = Catalog::new(vec![
        Service::new("tenant", "tenant")
            .step(1, "tenants table", "CREATE TABLE tenant.tenants (id uuid PRIMARY KEY, renamed text)")
            .step(2, "tenant features", "CREATE TABLE tenant.features (id uuid PRIMARY KEY)")
            .step(3, "tenant policies", "ALTER TABLE tenant.tenants ENABLE ROW LEVEL SECURITY"),
        Service::new("employee", "employee")
            .step(1, "employees table", "CREATE TABLE employee.employees (id uuid PRIMARY KEY)")
            .step(2, "employee rls", "ALTER TABLE employee.employees ENABLE ROW LEVEL SECURITY"),
    ])
    .unwrap();

    let mut session = Session::new(drifted, hr_edges()).unwrap();
    let err = session.run(engine.clone()).await.unwrap_err();

    assert_eq!(session.state(), SessionState::Failed);
    match err {
        ProvisionError::MigrationDrift { service, version } => {
            assert_eq!(service, "tenant");
            assert_eq!(version, 1);
        }
        other => panic!("expected MigrationDrift, got {other:?}"),
    }
    assert_eq!(engine.statements().len(), statements_before);
}

#[tokio::test]
async fn failing_step_halts_and_later_steps_are_not_attempted() {
    let engine = Memory::new();
    engine.poison("tenant.features");

    let mut session = Session::new(hr_catalog(), hr_edges()).unwrap();
    let err = session.run(engine.clone()).await.unwrap_err();

    assert_eq!(session.state(), SessionState::Failed);
    match err {
        ProvisionError::StepApplication {
            service, version, ..
        } => {
            assert_eq!(service, "tenant");
            assert_eq!(version, 2);
        }
        other => panic!("expected StepApplication, got {other:?}"),
    }

    // v1 stays committed, v2 failed, nothing after v2 ran.
    assert_eq!(engine.applied_versions("tenant"), vec![1]);
    assert_eq!(engine.applied_versions("employee"), Vec::<u32>::new());
    assert_eq!(engine.statements().len(), 1);
}

#[tokio::test]
async fn rerun_after_failure_resumes_where_it_stopped() {
    let engine = Memory::new();
    engine.poison("tenant.features");

    let mut failed = Session::new(hr_catalog(), hr_edges()).unwrap();
    failed.run(engine.clone()).await.unwrap_err();

    engine.clear_poison();

    let mut retry = Session::new(hr_catalog(), hr_edges()).unwrap();
    let summary = retry.run(engine.clone()).await.unwrap();

    assert_eq!(summary.applied, 4);
    assert_eq!(summary.skipped, 1);
    assert_eq!(engine.applied_versions("tenant"), vec![1, 2, 3]);
    assert_eq!(engine.applied_versions("employee"), vec![1, 2]);
}

#[tokio::test]
async fn tenant_round_trip_returns_the_sentinel() {
    let engine = Memory::new();
    let tenant = TenantContext::new(engine.clone());

    assert_eq!(tenant.current().await.unwrap(), None);

    tenant.install().await.unwrap();
    let sentinel = tenant.verify().await.unwrap();

    assert_eq!(tenant.current().await.unwrap(), Some(sentinel));
}

#[tokio::test]
async fn summary_serializes_for_pipeline_consumption() {
    let engine = Memory::new();
    let mut session = Session::new(hr_catalog(), hr_edges())
        .unwrap()
        .auxiliary_database("keycloak");

    let summary = session.run(engine).await.unwrap();
    let value = serde_json::to_value(&summary).unwrap();

    assert_eq!(value["applied"], 5);
    assert_eq!(value["skipped"], 0);
    assert_eq!(value["tenant_context_verified"], true);
    assert_eq!(value["databases"][0], "keycloak");
}
