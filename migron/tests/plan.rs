use migron::{Catalog, Edge, Plan, ProvisionError, Service};

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

#[test]
fn dependency_scenario_orders_tenant_first() {
    let catalog = hr_catalog();
    let plan = Plan::build(&catalog, &[Edge::new("employee", "tenant")]).unwrap();

    let keys: Vec<(String, u32)> = plan
        .steps()
        .iter()
        .map(|step| (step.service.clone(), step.version))
        .collect();

    assert_eq!(
        keys,
        vec![
            ("tenant".to_owned(), 1),
            ("tenant".to_owned(), 2),
            ("tenant".to_owned(), 3),
            ("employee".to_owned(), 1),
            ("employee".to_owned(), 2),
        ]
    );
}

#[test]
fn every_dependency_precedes_its_dependent() {
    let catalog = Catalog::new(vec![
        Service::new("approval", "approval").step(1, "a", "SELECT 1"),
        Service::new("employee", "employee").step(1, "b", "SELECT 1"),
        Service::new("tenant", "tenant").step(1, "c", "SELECT 1"),
        Service::new("notification", "notification").step(1, "d", "SELECT 1"),
    ])
    .unwrap();

    let edges = vec![
        Edge::new("employee", "tenant"),
        Edge::new("approval", "tenant"),
        Edge::new("approval", "employee"),
        Edge::new("notification", "tenant"),
    ];

    let plan = Plan::build(&catalog, &edges).unwrap();
    let position = |name: &str| {
        plan.steps()
            .iter()
            .position(|step| step.service == name)
            .unwrap()
    };

    for edge in &edges {
        assert!(
            position(&edge.depends_on) < position(&edge.service),
            "{} must precede {}",
            edge.depends_on,
            edge.service
        );
    }
}

#[test]
fn cycle_is_rejected() {
    let catalog = hr_catalog();
    let edges = vec![
        Edge::new("employee", "tenant"),
        Edge::new("tenant", "employee"),
    ];

    let err = Plan::build(&catalog, &edges).unwrap_err();

    match err {
        ProvisionError::CyclicDependency(services) => {
            assert!(services.contains("tenant"));
            assert!(services.contains("employee"));
        }
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
}

#[test]
fn edge_to_unknown_service_is_rejected() {
    let catalog = hr_catalog();
    let err = Plan::build(&catalog, &[Edge::new("employee", "payroll")]).unwrap_err();

    match err {
        ProvisionError::UnknownService(name) => assert_eq!(name, "payroll"),
        other => panic!("expected UnknownService, got {other:?}"),
    }
}

#[test]
fn duplicate_version_is_rejected_at_catalog_construction() {
    let err = Catalog::new(vec![Service::new("tenant", "tenant")
        .step(1, "a", "SELECT 1")
        .step(1, "b", "SELECT 2")])
    .unwrap_err();

    match err {
        ProvisionError::DuplicateStep { service, version } => {
            assert_eq!(service, "tenant");
            assert_eq!(version, 1);
        }
        other => panic!("expected DuplicateStep, got {other:?}"),
    }
}

#[test]
fn blank_schema_is_rejected() {
    let err = Catalog::new(vec![Service::new("tenant", "  ")]).unwrap_err();

    assert!(matches!(err, ProvisionError::InvalidService(name) if name == "tenant"));
}

#[test]
fn schema_claimed_twice_is_rejected() {
    let err = Catalog::new(vec![
        Service::new("tenant", "shared"),
        Service::new("employee", "shared"),
    ])
    .unwrap_err();

    assert!(matches!(err, ProvisionError::InvalidService(name) if name == "employee"));
}

#[test]
fn excluded_steps_never_reach_the_plan() {
    let catalog = Catalog::new(vec![Service::new("mdm", "mdm")
        .step(1, "codes table", "SELECT 1")
        .excluded_step(2, "superseded seed", "SELECT 2")
        .step(3, "code policies", "SELECT 3")])
    .unwrap();

    let plan = Plan::build(&catalog, &[]).unwrap();
    let versions: Vec<u32> = plan.steps().iter().map(|step| step.version).collect();

    assert_eq!(versions, vec![1, 3]);
}
