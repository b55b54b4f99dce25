use fundic_core::db::open_db_in_memory;
use fundic_core::model::observation::Observation;
use fundic_core::repo::case_repo::CaseRepository;
use fundic_core::repo::conflict_repo::ConflictRepository;
use fundic_core::repo::observation_repo::ObservationRepository;
use fundic_core::{
    Actor, Case, Conflict, ConflictService, ConflictType, CoreConfig, CoreError, ObservationPair,
    SqliteStore, UserRole,
};
use rusqlite::Connection;
use uuid::Uuid;

fn lead() -> Actor {
    Actor::new(Uuid::new_v4(), UserRole::LeadPartner)
}

fn seed_case(conn: &Connection, created_by: Uuid) -> Case {
    let case = Case::new("Growth equity memo", "Northwind Foods", created_by);
    SqliteStore::new(conn).create_case(&case).unwrap();
    case
}

/// Seeds one conflict per `(severity, detected_at, type)` over fresh
/// observation pairs.
fn seed_conflicts(
    conn: &Connection,
    case: &Case,
    rows: &[(f64, i64, ConflictType)],
) -> Vec<Conflict> {
    let store = SqliteStore::new(conn);
    let mut conflicts = Vec::new();
    for (index, (severity, detected_at, conflict_type)) in rows.iter().enumerate() {
        let first = Observation::new(
            case.id,
            format!("Section {index}a"),
            "Observation body text",
            case.created_by,
        );
        let second = Observation::new(
            case.id,
            format!("Section {index}b"),
            "Observation body text",
            case.created_by,
        );
        store.create_observation(&first).unwrap();
        store.create_observation(&second).unwrap();
        conflicts.push(Conflict::detected(
            case.id,
            ObservationPair::new(first.id, second.id).unwrap(),
            *conflict_type,
            *severity,
            format!("Conflict {index}"),
            *detected_at,
        ));
    }
    store.insert_conflicts(&conflicts).unwrap()
}

#[test]
fn resolve_unknown_conflict_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());

    let err = service.resolve(Uuid::new_v4(), &lead(), None).unwrap_err();
    assert!(matches!(err, CoreError::NotFound(ref message) if message == "Conflict not found"));
}

#[test]
fn unknown_conflict_is_not_found_even_for_analysts() {
    let conn = open_db_in_memory().unwrap();
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());
    let analyst = Actor::new(Uuid::new_v4(), UserRole::Analyst);

    let err = service.resolve(Uuid::new_v4(), &analyst, None).unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[test]
fn analyst_cannot_resolve() {
    let conn = open_db_in_memory().unwrap();
    let analyst_id = Uuid::new_v4();
    let case = seed_case(&conn, analyst_id);
    let conflicts = seed_conflicts(&conn, &case, &[(0.6, 1_000, ConflictType::DataInconsistency)]);
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());

    let err = service
        .resolve(
            conflicts[0].id,
            &Actor::new(analyst_id, UserRole::Analyst),
            Some("looks fine".to_string()),
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));

    let stored = SqliteStore::new(&conn)
        .get_conflict(conflicts[0].id)
        .unwrap()
        .unwrap();
    assert!(!stored.is_resolved);
}

#[test]
fn resolve_records_resolver_time_and_notes() {
    let conn = open_db_in_memory().unwrap();
    let case = seed_case(&conn, Uuid::new_v4());
    let conflicts = seed_conflicts(&conn, &case, &[(0.6, 1_000, ConflictType::DataInconsistency)]);
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());
    let resolver = Actor::new(Uuid::new_v4(), UserRole::IcMember);

    let resolved = service
        .resolve(conflicts[0].id, &resolver, Some("Confirmed with CFO".to_string()))
        .unwrap();

    assert!(resolved.is_resolved);
    assert_eq!(resolved.resolved_by, Some(resolver.user_id));
    assert!(resolved.resolved_at.is_some());
    assert_eq!(resolved.resolution_notes.as_deref(), Some("Confirmed with CFO"));

    let stored = SqliteStore::new(&conn)
        .get_conflict(conflicts[0].id)
        .unwrap()
        .unwrap();
    assert_eq!(stored, resolved);
}

#[test]
fn re_resolving_overwrites_previous_resolution() {
    let conn = open_db_in_memory().unwrap();
    let case = seed_case(&conn, Uuid::new_v4());
    let conflicts = seed_conflicts(&conn, &case, &[(0.6, 1_000, ConflictType::DataInconsistency)]);
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());
    let first_resolver = lead();
    let second_resolver = Actor::new(Uuid::new_v4(), UserRole::Admin);

    service
        .resolve(conflicts[0].id, &first_resolver, Some("first pass".to_string()))
        .unwrap();
    let again = service
        .resolve(conflicts[0].id, &second_resolver, None)
        .unwrap();

    assert!(again.is_resolved);
    assert_eq!(again.resolved_by, Some(second_resolver.user_id));
    assert_eq!(again.resolution_notes, None);
}

#[test]
fn high_severity_returns_unresolved_at_or_above_threshold_sorted_desc() {
    let conn = open_db_in_memory().unwrap();
    let case = seed_case(&conn, Uuid::new_v4());
    let conflicts = seed_conflicts(
        &conn,
        &case,
        &[
            (0.75, 1_000, ConflictType::SourceConflict),
            (0.9, 2_000, ConflictType::DataInconsistency),
            (0.7, 3_000, ConflictType::PriceAnomaly),
            (0.65, 4_000, ConflictType::DataInconsistency),
            (0.95, 5_000, ConflictType::TimingConflict),
        ],
    );
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());
    service.resolve(conflicts[4].id, &lead(), None).unwrap();

    let high = service.high_severity(case.id, &lead(), None).unwrap();
    let severities: Vec<f64> = high.iter().map(|c| c.severity).collect();
    assert_eq!(severities, vec![0.9, 0.75, 0.7]);
    assert!(high.iter().all(|c| !c.is_resolved));

    let custom = service.high_severity(case.id, &lead(), Some(0.8)).unwrap();
    assert_eq!(custom.len(), 1);
    assert_eq!(custom[0].id, conflicts[1].id);
}

#[test]
fn high_severity_enforces_case_read_access() {
    let conn = open_db_in_memory().unwrap();
    let owner = Uuid::new_v4();
    let case = seed_case(&conn, owner);
    seed_conflicts(&conn, &case, &[(0.9, 1_000, ConflictType::DataInconsistency)]);
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());

    let own = service
        .high_severity(case.id, &Actor::new(owner, UserRole::Analyst), None)
        .unwrap();
    assert_eq!(own.len(), 1);

    let err = service
        .high_severity(case.id, &Actor::new(Uuid::new_v4(), UserRole::Analyst), None)
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));

    let err = service
        .high_severity(Uuid::new_v4(), &lead(), None)
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn offset_listing_orders_by_severity_then_detection_time_and_filters() {
    let conn = open_db_in_memory().unwrap();
    let case = seed_case(&conn, Uuid::new_v4());
    let conflicts = seed_conflicts(
        &conn,
        &case,
        &[
            (0.6, 1_000, ConflictType::DataInconsistency),
            (0.6, 3_000, ConflictType::DataInconsistency),
            (0.8, 2_000, ConflictType::SourceConflict),
            (0.3, 4_000, ConflictType::TimingConflict),
        ],
    );
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());
    service.resolve(conflicts[3].id, &lead(), None).unwrap();

    let all = service.list_conflicts(case.id, &lead(), 0, 20, None).unwrap();
    assert_eq!(all.total, 4);
    let ids: Vec<Uuid> = all.items.iter().map(|c| c.id).collect();
    assert_eq!(
        ids,
        vec![conflicts[2].id, conflicts[1].id, conflicts[0].id, conflicts[3].id]
    );

    let page = service.list_conflicts(case.id, &lead(), 1, 2, None).unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.items[0].id, conflicts[1].id);

    let resolved = service
        .list_conflicts(case.id, &lead(), 0, 20, Some(true))
        .unwrap();
    assert_eq!(resolved.total, 1);
    assert_eq!(resolved.items[0].id, conflicts[3].id);

    let unresolved = service
        .list_conflicts(case.id, &lead(), 0, 20, Some(false))
        .unwrap();
    assert_eq!(unresolved.total, 3);
}

#[test]
fn get_conflict_checks_access_through_its_case() {
    let conn = open_db_in_memory().unwrap();
    let owner = Uuid::new_v4();
    let case = seed_case(&conn, owner);
    let conflicts = seed_conflicts(&conn, &case, &[(0.6, 1_000, ConflictType::DataInconsistency)]);
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());

    let fetched = service
        .get_conflict(conflicts[0].id, &Actor::new(owner, UserRole::Analyst))
        .unwrap();
    assert_eq!(fetched.id, conflicts[0].id);

    let err = service
        .get_conflict(conflicts[0].id, &Actor::new(Uuid::new_v4(), UserRole::Analyst))
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[test]
fn statistics_count_resolution_and_types() {
    let conn = open_db_in_memory().unwrap();
    let case = seed_case(&conn, Uuid::new_v4());
    let conflicts = seed_conflicts(
        &conn,
        &case,
        &[
            (0.6, 1_000, ConflictType::DataInconsistency),
            (0.6, 2_000, ConflictType::DataInconsistency),
            (0.7, 3_000, ConflictType::SourceConflict),
        ],
    );
    let service = ConflictService::new(SqliteStore::new(&conn), &CoreConfig::default());
    service.resolve(conflicts[2].id, &lead(), None).unwrap();

    let stats = service.statistics(case.id, &lead()).unwrap();
    assert_eq!(stats.total_count, 3);
    assert_eq!(stats.resolved_count, 1);
    assert_eq!(stats.unresolved_count, 2);
    assert_eq!(stats.average_severity, 0.63);
    assert_eq!(stats.by_type.get("data_inconsistency"), Some(&2));
    assert_eq!(stats.by_type.get("source_conflict"), Some(&1));

    let empty_case = seed_case(&conn, Uuid::new_v4());
    let empty = service.statistics(empty_case.id, &lead()).unwrap();
    assert_eq!(empty.total_count, 0);
    assert_eq!(empty.average_severity, 0.0);
    assert!(empty.by_type.is_empty());
}
