use fundic_core::db::open_db_in_memory;
use fundic_core::model::observation::{DisclosureLevel, SourceTag};
use fundic_core::repo::case_repo::CaseRepository;
use fundic_core::service::observation_service::{
    NewObservation, ObservationFilter, ObservationUpdate,
};
use fundic_core::{Actor, Case, CoreConfig, CoreError, ObservationService, SqliteStore, UserRole};
use rusqlite::Connection;
use uuid::Uuid;

fn seed_case(conn: &Connection, created_by: Uuid) -> Case {
    let case = Case::new("Buyout screening", "Fabrikam Logistics", created_by);
    SqliteStore::new(conn).create_case(&case).unwrap();
    case
}

fn new_observation(section: &str, content: &str) -> NewObservation {
    NewObservation {
        section: section.to_string(),
        content: content.to_string(),
        ..NewObservation::default()
    }
}

#[test]
fn create_applies_defaults_and_normalizes_section() {
    let conn = open_db_in_memory().unwrap();
    let analyst = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, analyst.user_id);
    let service = ObservationService::new(SqliteStore::new(&conn), &CoreConfig::default());

    let created = service
        .create_observation(
            case.id,
            &analyst,
            new_observation("  Unit   economics ", "CAC payback is 14 months"),
        )
        .unwrap();

    assert_eq!(created.section, "Unit economics");
    assert_eq!(created.source_tag, SourceTag::Public);
    assert_eq!(created.disclosure_level, DisclosureLevel::Private);
    assert!(!created.is_verified);
    assert_eq!(created.created_by, analyst.user_id);

    let fetched = service.get_observation(created.id, &analyst).unwrap();
    assert_eq!(fetched, created);
}

#[test]
fn create_rejects_short_content_and_blank_section() {
    let conn = open_db_in_memory().unwrap();
    let analyst = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, analyst.user_id);
    let service = ObservationService::new(SqliteStore::new(&conn), &CoreConfig::default());

    let err = service
        .create_observation(case.id, &analyst, new_observation("Revenue", "too short"))
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(ref message) if message.contains("10")));

    let err = service
        .create_observation(case.id, &analyst, new_observation("   ", "Long enough content"))
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn create_requires_active_case() {
    let conn = open_db_in_memory().unwrap();
    let analyst = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, analyst.user_id);
    let store = SqliteStore::new(&conn);
    let service = ObservationService::new(store, &CoreConfig::default());

    store.soft_delete_case(case.id, case.updated_at + 1).unwrap();
    let err = service
        .create_observation(case.id, &analyst, new_observation("Revenue", "Long enough content"))
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn update_is_limited_to_creator_and_lead_or_above() {
    let conn = open_db_in_memory().unwrap();
    let author = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, author.user_id);
    let service = ObservationService::new(SqliteStore::new(&conn), &CoreConfig::default());
    let created = service
        .create_observation(case.id, &author, new_observation("Market", "TAM is $4B and growing"))
        .unwrap();

    let stranger = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let err = service
        .update_observation(created.id, &stranger, ObservationUpdate::default())
        .unwrap_err();
    assert!(matches!(err, CoreError::Authorization(_)));

    let updated = service
        .update_observation(
            created.id,
            &author,
            ObservationUpdate {
                source_tag: Some(SourceTag::External),
                disclosure_level: Some(DisclosureLevel::LpNda),
                ..ObservationUpdate::default()
            },
        )
        .unwrap();
    assert_eq!(updated.source_tag, SourceTag::External);
    assert_eq!(updated.disclosure_level, DisclosureLevel::LpNda);
    assert_eq!(updated.content, created.content);

    let lead = Actor::new(Uuid::new_v4(), UserRole::LeadPartner);
    let err = service
        .update_observation(
            created.id,
            &lead,
            ObservationUpdate {
                content: Some("short".to_string()),
                ..ObservationUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation(_)));
}

#[test]
fn soft_deleted_observation_disappears_from_reads() {
    let conn = open_db_in_memory().unwrap();
    let author = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, author.user_id);
    let service = ObservationService::new(SqliteStore::new(&conn), &CoreConfig::default());
    let created = service
        .create_observation(case.id, &author, new_observation("Team", "Founders are technical"))
        .unwrap();

    let stranger = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    assert!(matches!(
        service.soft_delete_observation(created.id, &stranger),
        Err(CoreError::Authorization(_))
    ));

    service.soft_delete_observation(created.id, &author).unwrap();
    assert!(matches!(
        service.get_observation(created.id, &author),
        Err(CoreError::NotFound(_))
    ));
    let listed = service
        .list_observations(case.id, &author, ObservationFilter::default(), 0, 20)
        .unwrap();
    assert_eq!(listed.total, 0);
}

#[test]
fn verification_requires_lead_or_above() {
    let conn = open_db_in_memory().unwrap();
    let author = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, author.user_id);
    let service = ObservationService::new(SqliteStore::new(&conn), &CoreConfig::default());
    let created = service
        .create_observation(case.id, &author, new_observation("Legal", "No pending litigation"))
        .unwrap();

    assert!(matches!(
        service.verify_observation(created.id, &author),
        Err(CoreError::Authorization(_))
    ));

    let ic_member = Actor::new(Uuid::new_v4(), UserRole::IcMember);
    let verified = service.verify_observation(created.id, &ic_member).unwrap();
    assert!(verified.is_verified);
    assert_eq!(verified.verified_by, Some(ic_member.user_id));
    assert!(verified.verified_at.is_some());
}

#[test]
fn listing_filters_searches_and_counts() {
    let conn = open_db_in_memory().unwrap();
    let author = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, author.user_id);
    let service = ObservationService::new(SqliteStore::new(&conn), &CoreConfig::default());
    let inputs = [
        ("Revenue", "Recurring revenue grew 40%", SourceTag::Internal, DisclosureLevel::Ic),
        ("Revenue", "Churn is REVENUE neutral", SourceTag::Public, DisclosureLevel::Ic),
        ("Market", "Competitors raised prices", SourceTag::Public, DisclosureLevel::Lp),
    ];
    for (section, content, source_tag, disclosure_level) in inputs {
        service
            .create_observation(
                case.id,
                &author,
                NewObservation {
                    source_tag: Some(source_tag),
                    disclosure_level: Some(disclosure_level),
                    ..new_observation(section, content)
                },
            )
            .unwrap();
    }

    let public = service
        .list_observations(
            case.id,
            &author,
            ObservationFilter {
                source_tag: Some(SourceTag::Public),
                disclosure_level: None,
            },
            0,
            20,
        )
        .unwrap();
    assert_eq!(public.total, 2);

    let found = service
        .search_observations(case.id, &author, "revenue", 0, 20)
        .unwrap();
    assert_eq!(found.total, 2);
    let first_only = service
        .search_observations(case.id, &author, "revenue", 0, 1)
        .unwrap();
    assert_eq!(first_only.items.len(), 1);
    assert_eq!(first_only.total, 2);

    let stats = service.observation_statistics(case.id, &author).unwrap();
    assert_eq!(stats.total_count, 3);
    assert_eq!(stats.unverified_count, 3);
    assert_eq!(stats.by_source.get("PUB"), Some(&2));
    assert_eq!(stats.by_source.get("INT"), Some(&1));
    assert_eq!(stats.by_disclosure.get("IC"), Some(&2));
}

#[test]
fn analysts_cannot_read_observations_of_foreign_cases() {
    let conn = open_db_in_memory().unwrap();
    let owner = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, owner.user_id);
    let service = ObservationService::new(SqliteStore::new(&conn), &CoreConfig::default());
    let created = service
        .create_observation(case.id, &owner, new_observation("Risks", "Key-person dependency"))
        .unwrap();

    let outsider = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    assert!(matches!(
        service.get_observation(created.id, &outsider),
        Err(CoreError::Authorization(_))
    ));
    assert!(matches!(
        service.list_observations(case.id, &outsider, ObservationFilter::default(), 0, 20),
        Err(CoreError::Authorization(_))
    ));
}

#[test]
fn search_folds_non_ascii_case_like_detection() {
    let conn = open_db_in_memory().unwrap();
    let author = Actor::new(Uuid::new_v4(), UserRole::Analyst);
    let case = seed_case(&conn, author.user_id);
    let service = ObservationService::new(SqliteStore::new(&conn), &CoreConfig::default());
    service
        .create_observation(
            case.id,
            &author,
            new_observation("Financials", "ÉBITDA margin reached 18% in Q3"),
        )
        .unwrap();
    service
        .create_observation(
            case.id,
            &author,
            new_observation("Financials", "Gross margin is flat year on year"),
        )
        .unwrap();

    for needle in ["ébitda", "ÉBITDA", "Ébitda Margin"] {
        let found = service
            .search_observations(case.id, &author, needle, 0, 20)
            .unwrap();
        assert_eq!(found.total, 1, "needle {needle}");
    }
    let margins = service
        .search_observations(case.id, &author, "MARGIN", 0, 20)
        .unwrap();
    assert_eq!(margins.total, 2);
}
