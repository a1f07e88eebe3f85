use chrono::NaiveDate;
use kazi_core::db::open_db_in_memory;
use kazi_core::{
    ArtifactDraft, ArtifactListQuery, ArtifactOrdering, ArtifactRepository, ArtifactService,
    ArtifactServiceError, ExportFormat, FormType, MainCodeDraft, MainCodeService, RepoError,
    SqliteArtifactRepository, SqliteMainCodeRepository,
};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
}

fn seed(conn: &mut Connection, code: &str, finding_place: &str) -> Uuid {
    let mut service = MainCodeService::new(SqliteMainCodeRepository::try_new(conn).unwrap());
    service
        .seed_main_code(code, &MainCodeDraft::new(finding_place))
        .unwrap()
        .id
}

fn full_numbers(
    service: &ArtifactService<SqliteArtifactRepository<'_>>,
    query: &ArtifactListQuery,
) -> Vec<String> {
    service
        .list_artifacts(query)
        .unwrap()
        .items
        .iter()
        .map(|artifact| artifact.full_artifact_no())
        .collect()
}

#[test]
fn created_artifact_carries_its_full_number() {
    let mut conn = open_db_in_memory().unwrap();
    let main_code = seed(&mut conn, "AAB", "Trench 4");
    let service = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());

    let mut draft = ArtifactDraft::new(main_code, 7, date(14));
    draft.form_type = FormType::Sikke;
    draft.details = json!({"obverse": {"legend": "IMP"}});
    draft.images = json!([{"name": "front.jpg"}]);
    let created = service.create_artifact(&draft).unwrap();

    assert_eq!(created.full_artifact_no(), "AAB0007");
    assert_eq!(created.main_code_code, "AAB");
    assert_eq!(created.main_code_finding_place, "Trench 4");
    assert_eq!(created.fields.form_type, FormType::Sikke);
    assert_eq!(created.fields.details["obverse"]["legend"], "IMP");
    assert!(created.fields.is_active);
    assert!(!created.fields.is_inventory);

    let by_full_no = service.get_by_full_no("AAB0007").unwrap().unwrap();
    assert_eq!(by_full_no, created);
    assert!(service.get_by_full_no("AAB0008").unwrap().is_none());
    assert!(matches!(
        service.get_by_full_no("AAB7"),
        Err(ArtifactServiceError::InvalidFullNumber(_))
    ));
}

#[test]
fn numbers_wider_than_four_digits_are_not_truncated() {
    let mut conn = open_db_in_memory().unwrap();
    let main_code = seed(&mut conn, "ZZZ", "Trench 9");
    let service = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());

    let created = service
        .create_artifact(&ArtifactDraft::new(main_code, 12_345, date(1)))
        .unwrap();
    assert_eq!(created.full_artifact_no(), "ZZZ12345");
    assert_eq!(
        service.get_by_full_no("zzz12345").unwrap().map(|a| a.id),
        Some(created.id)
    );
}

#[test]
fn duplicate_number_under_same_main_code_is_rejected_by_precheck() {
    let mut conn = open_db_in_memory().unwrap();
    let main_code = seed(&mut conn, "AAA", "Trench 1");
    let other = seed(&mut conn, "AAB", "Trench 2");
    let service = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());

    service
        .create_artifact(&ArtifactDraft::new(main_code, 1, date(1)))
        .unwrap();
    let err = service
        .create_artifact(&ArtifactDraft::new(main_code, 1, date(2)))
        .unwrap_err();
    assert!(matches!(
        err,
        ArtifactServiceError::DuplicateIdentifier { field: "artifact_no", ref value } if value == "1"
    ));

    service
        .create_artifact(&ArtifactDraft::new(other, 1, date(2)))
        .expect("same number under another main code is allowed");
}

#[test]
fn storage_constraint_catches_duplicates_that_skip_the_precheck() {
    let mut conn = open_db_in_memory().unwrap();
    let main_code = seed(&mut conn, "AAA", "Trench 1");
    let repo = SqliteArtifactRepository::try_new(&conn).unwrap();

    repo.create_artifact(&ArtifactDraft::new(main_code, 3, date(1)))
        .unwrap();
    let err = repo
        .create_artifact(&ArtifactDraft::new(main_code, 3, date(1)))
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::DuplicateIdentifier { field: "artifact_no", .. }
    ));

    let service = ArtifactService::new(repo);
    let page = service.list_artifacts(&ArtifactListQuery::default()).unwrap();
    assert_eq!(page.total, 1);
}

#[test]
fn update_may_keep_its_own_number_but_not_take_anothers() {
    let mut conn = open_db_in_memory().unwrap();
    let main_code = seed(&mut conn, "AAA", "Trench 1");
    let service = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());

    let first = service
        .create_artifact(&ArtifactDraft::new(main_code, 1, date(1)))
        .unwrap();
    let second = service
        .create_artifact(&ArtifactDraft::new(main_code, 2, date(1)))
        .unwrap();

    let mut edit = first.fields.clone();
    edit.notes = Some("rim fragment".to_string());
    let updated = service.update_artifact(first.id, &edit).unwrap();
    assert_eq!(updated.fields.notes.as_deref(), Some("rim fragment"));
    assert_eq!(updated.full_artifact_no(), "AAA0001");

    let mut clash = second.fields.clone();
    clash.artifact_no = 1;
    assert!(matches!(
        service.update_artifact(second.id, &clash),
        Err(ArtifactServiceError::DuplicateIdentifier { .. })
    ));
}

#[test]
fn check_unique_reports_free_numbers_and_ignores_the_edited_artifact() {
    let mut conn = open_db_in_memory().unwrap();
    let main_code = seed(&mut conn, "AAA", "Trench 1");
    let service = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());

    let artifact = service
        .create_artifact(&ArtifactDraft::new(main_code, 5, date(1)))
        .unwrap();

    assert!(!service.check_unique(main_code, 5, None).unwrap());
    assert!(service.check_unique(main_code, 5, Some(artifact.id)).unwrap());
    assert!(service.check_unique(main_code, 6, None).unwrap());
    assert!(service.check_unique(Uuid::new_v4(), 5, None).unwrap());
}

#[test]
fn invalid_drafts_and_missing_parents_are_rejected() {
    let mut conn = open_db_in_memory().unwrap();
    let main_code = seed(&mut conn, "AAA", "Trench 1");
    let service = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());

    let mut zero = ArtifactDraft::new(main_code, 1, date(1));
    zero.artifact_no = 0;
    assert!(matches!(
        service.create_artifact(&zero),
        Err(ArtifactServiceError::Validation(_))
    ));

    let mut wrong_shape = ArtifactDraft::new(main_code, 1, date(1));
    wrong_shape.images = json!({"name": "front.jpg"});
    assert!(matches!(
        service.create_artifact(&wrong_shape),
        Err(ArtifactServiceError::Validation(_))
    ));

    let orphan = ArtifactDraft::new(Uuid::new_v4(), 1, date(1));
    assert!(matches!(
        service.create_artifact(&orphan),
        Err(ArtifactServiceError::MainCodeNotFound(_))
    ));

    assert!(matches!(
        service.delete_artifact(Uuid::new_v4()),
        Err(ArtifactServiceError::ArtifactNotFound(_))
    ));
}

#[test]
fn list_filters_and_orders_artifacts() {
    let mut conn = open_db_in_memory().unwrap();
    let trench = seed(&mut conn, "AAB", "Trench 4");
    let gate = seed(&mut conn, "KAA", "North gate");
    let service = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());

    let mut coin = ArtifactDraft::new(trench, 2, date(10));
    coin.form_type = FormType::Sikke;
    coin.production_material = Some("Bronze".to_string());
    service.create_artifact(&coin).unwrap();

    let mut sherd = ArtifactDraft::new(trench, 1, date(20));
    sherd.form_type = FormType::Seramik;
    sherd.period = Some("Hellenistic".to_string());
    service.create_artifact(&sherd).unwrap();

    let mut grave = ArtifactDraft::new(gate, 1, date(15));
    grave.form_type = FormType::Mezar;
    grave.notes = Some("bronze pin near skull".to_string());
    service.create_artifact(&grave).unwrap();

    let by_number = ArtifactListQuery {
        ordering: ArtifactOrdering::MainCodeAsc,
        ..ArtifactListQuery::default()
    };
    assert_eq!(full_numbers(&service, &by_number), ["AAB0001", "AAB0002", "KAA0001"]);

    let by_date = ArtifactListQuery {
        ordering: ArtifactOrdering::parse("-artifact_date").unwrap(),
        ..ArtifactListQuery::default()
    };
    assert_eq!(full_numbers(&service, &by_date), ["AAB0001", "KAA0001", "AAB0002"]);

    let window = ArtifactListQuery {
        date_from: Some(date(10)),
        date_to: Some(date(15)),
        ordering: ArtifactOrdering::ArtifactDateAsc,
        ..ArtifactListQuery::default()
    };
    assert_eq!(full_numbers(&service, &window), ["AAB0002", "KAA0001"]);

    let by_form = ArtifactListQuery {
        form_type: Some(FormType::Seramik),
        ..ArtifactListQuery::default()
    };
    assert_eq!(full_numbers(&service, &by_form), ["AAB0001"]);

    let by_parent = ArtifactListQuery {
        main_code_id: Some(gate),
        ..ArtifactListQuery::default()
    };
    assert_eq!(full_numbers(&service, &by_parent), ["KAA0001"]);

    let by_place = ArtifactListQuery {
        finding_place: Some("trench".to_string()),
        main_code_code: Some("ab".to_string()),
        ordering: ArtifactOrdering::ArtifactNoDesc,
        ..ArtifactListQuery::default()
    };
    assert_eq!(full_numbers(&service, &by_place), ["AAB0002", "AAB0001"]);

    let free_text = ArtifactListQuery {
        q: Some("BRONZE".to_string()),
        ordering: ArtifactOrdering::MainCodeAsc,
        ..ArtifactListQuery::default()
    };
    assert_eq!(full_numbers(&service, &free_text), ["AAB0002", "KAA0001"]);

    let exact_number = ArtifactListQuery {
        artifact_no: Some(1),
        ordering: ArtifactOrdering::MainCodeDesc,
        ..ArtifactListQuery::default()
    };
    assert_eq!(full_numbers(&service, &exact_number), ["KAA0001", "AAB0001"]);
}

#[test]
fn export_through_the_service_names_the_file_after_the_full_number() {
    let mut conn = open_db_in_memory().unwrap();
    let main_code = seed(&mut conn, "AAC", "Trench 4");
    let service = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());

    let mut draft = ArtifactDraft::new(main_code, 42, date(3));
    draft.measurements = json!({"height_cm": 12.5, "colour": {"munsell": "5YR 6/6"}});
    let artifact = service.create_artifact(&draft).unwrap();

    let csv = service.export_artifact(artifact.id, ExportFormat::Csv).unwrap();
    assert_eq!(csv.filename, "AAC0042.csv");
    assert_eq!(csv.content_type, "text/csv; charset=utf-8");
    let text = String::from_utf8(csv.bytes).unwrap();
    assert!(text.contains("full_artifact_no,AAC0042\r\n"));
    assert!(text.contains("measurements.colour.munsell,5YR 6/6\r\n"));
    assert!(text.contains("measurements.height_cm,12.5\r\n"));

    let html = service
        .export_artifact(artifact.id, ExportFormat::parse("HTML").unwrap())
        .unwrap();
    assert_eq!(html.filename, "AAC0042.html");
    let text = String::from_utf8(html.bytes).unwrap();
    assert!(text.contains("Colour / Munsell"));
    assert!(text.contains("Trench 4"));

    let json = service.export_artifact(artifact.id, ExportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&json.bytes).unwrap();
    assert_eq!(value["full_artifact_no"], "AAC0042");
    assert_eq!(value["main_code_code"], "AAC");

    assert!(matches!(
        service.export_artifact(Uuid::new_v4(), ExportFormat::Csv),
        Err(ArtifactServiceError::ArtifactNotFound(_))
    ));
}
