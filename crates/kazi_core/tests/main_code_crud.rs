use chrono::NaiveDate;
use kazi_core::db::open_db_in_memory;
use kazi_core::{
    ArtifactDraft, ArtifactService, MainCodeDraft, MainCodeListQuery, MainCodeOrdering,
    MainCodeService, MainCodeServiceError, SqliteArtifactRepository, SqliteMainCodeRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn seed(conn: &mut Connection, code: &str, draft: MainCodeDraft) -> Uuid {
    let mut service = MainCodeService::new(SqliteMainCodeRepository::try_new(conn).unwrap());
    service.seed_main_code(code, &draft).unwrap().id
}

fn codes(conn: &mut Connection, query: &MainCodeListQuery) -> (Vec<String>, u64) {
    let service = MainCodeService::new(SqliteMainCodeRepository::try_new(conn).unwrap());
    let page = service.list_main_codes(query).unwrap();
    (
        page.items.into_iter().map(|main_code| main_code.code).collect(),
        page.total,
    )
}

#[test]
fn create_then_lookup_by_id_and_code() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = MainCodeService::new(SqliteMainCodeRepository::try_new(&mut conn).unwrap());

    let mut draft = MainCodeDraft::new("  Trench 4  ");
    draft.layer = Some("Layer III".to_string());
    draft.gis = Some("   ".to_string());
    let created = service.create_main_code(&draft).unwrap();

    assert_eq!(created.code, "AAA");
    assert_eq!(created.attrs.finding_place, "Trench 4");
    assert_eq!(created.attrs.layer.as_deref(), Some("Layer III"));
    assert_eq!(created.attrs.gis, None);
    assert!(created.created_at > 0);

    let by_id = service.get_main_code(created.id).unwrap().unwrap();
    let by_code = service.get_by_code(" aaa ").unwrap().unwrap();
    assert_eq!(by_id, created);
    assert_eq!(by_code, created);
    assert!(service.get_by_code("ZZZ").unwrap().is_none());
    assert!(service.get_main_code(Uuid::new_v4()).unwrap().is_none());
}

#[test]
fn update_replaces_attributes_but_keeps_the_code() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = MainCodeService::new(SqliteMainCodeRepository::try_new(&mut conn).unwrap());

    let mut draft = MainCodeDraft::new("Trench 4");
    draft.plan_square = Some("B7".to_string());
    let created = service.create_main_code(&draft).unwrap();

    let mut edit = MainCodeDraft::new("Trench 5");
    edit.description = Some("Collapsed wall".to_string());
    let updated = service.update_main_code(created.id, &edit).unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.code, "AAA");
    assert_eq!(updated.attrs.finding_place, "Trench 5");
    assert_eq!(updated.attrs.plan_square, None);
    assert_eq!(updated.attrs.description.as_deref(), Some("Collapsed wall"));
    assert!(updated.updated_at >= created.updated_at);
}

#[test]
fn update_and_delete_report_missing_main_codes() {
    let mut conn = open_db_in_memory().unwrap();
    let service = MainCodeService::new(SqliteMainCodeRepository::try_new(&mut conn).unwrap());
    let missing = Uuid::new_v4();

    let err = service
        .update_main_code(missing, &MainCodeDraft::new("Trench 4"))
        .unwrap_err();
    assert!(matches!(err, MainCodeServiceError::NotFound(ref id) if *id == missing.to_string()));

    let err = service.delete_main_code(missing).unwrap_err();
    assert!(matches!(err, MainCodeServiceError::NotFound(_)));
}

#[test]
fn validation_rejects_overlong_fields() {
    let mut conn = open_db_in_memory().unwrap();
    let mut service = MainCodeService::new(SqliteMainCodeRepository::try_new(&mut conn).unwrap());

    let err = service
        .create_main_code(&MainCodeDraft::new("x".repeat(121)))
        .unwrap_err();
    assert!(matches!(err, MainCodeServiceError::Validation(_)));

    let mut draft = MainCodeDraft::new("Trench 4");
    draft.grave_no = Some("9".repeat(61));
    assert!(matches!(
        service.create_main_code(&draft),
        Err(MainCodeServiceError::Validation(_))
    ));
}

#[test]
fn deleting_a_main_code_cascades_to_its_artifacts() {
    let mut conn = open_db_in_memory().unwrap();
    let keep = seed(&mut conn, "AAA", MainCodeDraft::new("Trench 1"));
    let doomed = seed(&mut conn, "AAB", MainCodeDraft::new("Trench 2"));

    {
        let artifacts = ArtifactService::new(SqliteArtifactRepository::try_new(&conn).unwrap());
        let date = NaiveDate::from_ymd_opt(2024, 7, 14).unwrap();
        artifacts
            .create_artifact(&ArtifactDraft::new(keep, 1, date))
            .unwrap();
        artifacts
            .create_artifact(&ArtifactDraft::new(doomed, 1, date))
            .unwrap();
        artifacts
            .create_artifact(&ArtifactDraft::new(doomed, 2, date))
            .unwrap();
    }

    {
        let service = MainCodeService::new(SqliteMainCodeRepository::try_new(&mut conn).unwrap());
        service.delete_main_code(doomed).unwrap();
    }

    let remaining: Vec<String> = conn
        .prepare("SELECT main_code_id FROM artifacts;")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(remaining, [keep.to_string()]);
}

#[test]
fn list_filters_by_code_place_and_free_text() {
    let mut conn = open_db_in_memory().unwrap();
    seed(&mut conn, "AAB", MainCodeDraft::new("Trench 4"));
    let mut gate = MainCodeDraft::new("North gate");
    gate.description = Some("Burnt beam".to_string());
    seed(&mut conn, "KAB", gate);
    seed(&mut conn, "ZZA", MainCodeDraft::new("South trench"));

    let by_code = MainCodeListQuery {
        code: Some("ab".to_string()),
        ordering: MainCodeOrdering::CodeAsc,
        ..MainCodeListQuery::default()
    };
    assert_eq!(codes(&mut conn, &by_code), (vec!["AAB".into(), "KAB".into()], 2));

    let by_place = MainCodeListQuery {
        finding_place: Some("TRENCH".to_string()),
        ordering: MainCodeOrdering::CodeDesc,
        ..MainCodeListQuery::default()
    };
    assert_eq!(codes(&mut conn, &by_place), (vec!["ZZA".into(), "AAB".into()], 2));

    let by_text = MainCodeListQuery {
        q: Some("burnt".to_string()),
        ..MainCodeListQuery::default()
    };
    assert_eq!(codes(&mut conn, &by_text), (vec!["KAB".into()], 1));
}

#[test]
fn list_treats_like_wildcards_literally() {
    let mut conn = open_db_in_memory().unwrap();
    seed(&mut conn, "AAA", MainCodeDraft::new("Sector 50%"));
    seed(&mut conn, "AAB", MainCodeDraft::new("Sector 500"));

    let query = MainCodeListQuery {
        finding_place: Some("50%".to_string()),
        ..MainCodeListQuery::default()
    };
    assert_eq!(codes(&mut conn, &query), (vec!["AAA".into()], 1));
}

#[test]
fn list_paginates_and_defaults_to_newest_first() {
    let mut conn = open_db_in_memory().unwrap();
    for (code, created_at) in [("AAA", 1_000), ("AAB", 3_000), ("AAC", 2_000)] {
        seed(&mut conn, code, MainCodeDraft::new("Trench 4"));
        conn.execute(
            "UPDATE main_codes SET created_at = ?1 WHERE code = ?2;",
            rusqlite::params![created_at, code],
        )
        .unwrap();
    }

    let (all, total) = codes(&mut conn, &MainCodeListQuery::default());
    assert_eq!(all, ["AAB", "AAC", "AAA"]);
    assert_eq!(total, 3);

    let second_page = MainCodeListQuery {
        page: Some(2),
        page_size: Some(2),
        ordering: MainCodeOrdering::CreatedAtAsc,
        ..MainCodeListQuery::default()
    };
    let service = MainCodeService::new(SqliteMainCodeRepository::try_new(&mut conn).unwrap());
    let page = service.list_main_codes(&second_page).unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].code, "AAB");
    assert_eq!(page.total, 3);
    assert_eq!(page.page, 2);
    assert_eq!(page.page_size, 2);
    assert_eq!(page.page_count(), 2);
}
