//! Fast SQLite-based database tests.
//!
//! These mirror the PostgreSQL tests in database_integration.rs but use an
//! in-memory database so they run without Docker.

use chrono::NaiveDate;
use common::config::MatchMode;
use common::database::{Database, is_foreign_key_violation, is_unique_violation};
use common::model::{NewEvent, NewFest, NewRegistration, NewUser};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn fest(id: &str, closing: NaiveDate) -> NewFest {
    NewFest {
        fest_id: id.to_string(),
        title: format!("Fest {id}"),
        description: None,
        opening_date: closing - chrono::Duration::days(2),
        closing_date: closing,
        organizing_dept: Some("Computer Science".to_string()),
        fest_image_url: Some(format!(
            "https://demo.supabase.co/storage/v1/object/public/fest-images/{id}.png"
        )),
    }
}

fn event(id: &str, end: NaiveDate, parent: Option<&str>) -> NewEvent {
    NewEvent {
        event_id: id.to_string(),
        title: format!("Event {id}"),
        description: Some("A test event".to_string()),
        event_date: end,
        end_date: end,
        fest: parent.map(str::to_string),
        event_image_url: None,
        banner_url: None,
        pdf_url: None,
    }
}

async fn database() -> Database {
    Database::new_in_memory()
        .await
        .expect("Failed to create in-memory database")
}

#[tokio::test]
async fn test_fest_operations_sqlite() {
    let db = database().await;

    assert!(db.list_fests().await.unwrap().is_empty());
    let created = db.insert_fest(fest("techfest", date(2025, 3, 9))).await.unwrap();
    assert_eq!(created.closing_date, date(2025, 3, 9));

    let fetched = db.get_fest("techfest").await.unwrap().expect("fest exists");
    assert_eq!(fetched, created);
    assert!(db.get_fest("missing").await.unwrap().is_none());

    let err = db
        .insert_fest(fest("techfest", date(2025, 3, 9)))
        .await
        .unwrap_err();
    assert!(is_unique_violation(&err));
}

#[tokio::test]
async fn test_event_listing_by_fest_sqlite() {
    let db = database().await;
    db.insert_fest(fest("f1", date(2025, 3, 9))).await.unwrap();
    db.insert_event(event("e1", date(2025, 3, 8), Some("f1")))
        .await
        .unwrap();
    db.insert_event(event("e2", date(2025, 3, 9), None))
        .await
        .unwrap();

    assert_eq!(db.list_events(None).await.unwrap().len(), 2);
    let children = db.list_events(Some("f1")).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].event_id, "e1");
    assert!(!children[0].is_standalone());

    let standalone = db.get_event("e2").await.unwrap().unwrap();
    assert!(standalone.is_standalone());
}

#[tokio::test]
async fn test_expired_queries_exact_and_backlog_sqlite() {
    let db = database().await;
    let yesterday = date(2025, 3, 9);

    db.insert_fest(fest("old", date(2025, 3, 1))).await.unwrap();
    db.insert_fest(fest("ended", yesterday)).await.unwrap();
    db.insert_fest(fest("running", date(2025, 3, 12)))
        .await
        .unwrap();
    db.insert_event(event("child-late", date(2025, 3, 15), Some("ended")))
        .await
        .unwrap();
    db.insert_event(event("solo-old", date(2025, 2, 20), None))
        .await
        .unwrap();
    db.insert_event(event("solo", yesterday, None)).await.unwrap();
    db.insert_event(event("child", yesterday, Some("running")))
        .await
        .unwrap();

    let fests = db
        .find_expired_fests(yesterday, MatchMode::Exact)
        .await
        .unwrap();
    assert_eq!(
        fests.iter().map(|f| f.fest_id.as_str()).collect::<Vec<_>>(),
        vec!["ended"]
    );
    assert!(fests[0].fest_image_url.is_some());

    let fests = db
        .find_expired_fests(yesterday, MatchMode::Backlog)
        .await
        .unwrap();
    assert_eq!(fests.len(), 2);

    // children follow their fest, whatever their own end date
    let children = db
        .find_fest_events(&["ended".to_string()])
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].event_id, "child-late");
    assert!(db.find_fest_events(&[]).await.unwrap().is_empty());

    // events of a fest never show up as standalone
    let standalone = db
        .find_expired_standalone_events(yesterday, MatchMode::Exact)
        .await
        .unwrap();
    assert_eq!(
        standalone
            .iter()
            .map(|e| e.event_id.as_str())
            .collect::<Vec<_>>(),
        vec!["solo"]
    );

    let standalone = db
        .find_expired_standalone_events(yesterday, MatchMode::Backlog)
        .await
        .unwrap();
    assert_eq!(standalone.len(), 2);
}

#[tokio::test]
async fn test_bottom_up_deletes_sqlite() {
    let db = database().await;
    db.insert_fest(fest("f1", date(2025, 3, 9))).await.unwrap();
    db.insert_event(event("e1", date(2025, 3, 9), Some("f1")))
        .await
        .unwrap();
    db.insert_registration(NewRegistration {
        event_id: "e1".to_string(),
        user_email: "a@christuniversity.in".to_string(),
    })
    .await
    .unwrap();

    let ids = vec!["e1".to_string()];

    // parent rows can't go while children still reference them
    let err = db.delete_events(&ids).await.unwrap_err();
    assert!(is_foreign_key_violation(&err));

    assert_eq!(db.delete_registrations(&ids).await.unwrap(), 1);
    assert_eq!(db.delete_events(&ids).await.unwrap(), 1);
    assert_eq!(db.delete_fests(&["f1".to_string()]).await.unwrap(), 1);
    assert_eq!(db.delete_fests(&[]).await.unwrap(), 0);
    assert!(db.list_fests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_registration_operations_sqlite() {
    let db = database().await;
    db.insert_event(event("e1", date(2025, 3, 9), None))
        .await
        .unwrap();

    let registration = db
        .insert_registration(NewRegistration {
            event_id: "e1".to_string(),
            user_email: " Student@ChristUniversity.in ".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(registration.user_email, "student@christuniversity.in");

    let duplicate = db
        .insert_registration(NewRegistration {
            event_id: "e1".to_string(),
            user_email: "student@christuniversity.in".to_string(),
        })
        .await
        .unwrap_err();
    assert!(is_unique_violation(&duplicate));

    let listed = db.list_registrations("e1").await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].registration_id, registration.registration_id);

    assert!(
        db.delete_registration(&registration.registration_id)
            .await
            .unwrap()
    );
    assert!(
        !db.delete_registration(&registration.registration_id)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_user_upsert_sqlite() {
    let db = database().await;

    let user = db
        .upsert_user(NewUser {
            email: "Student@christuniversity.in".to_string(),
            name: Some("Student".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(user.email, "student@christuniversity.in");
    assert!(!user.is_organiser);

    // a later sign-in without a name keeps the stored one
    let again = db
        .upsert_user(NewUser {
            email: "student@christuniversity.in".to_string(),
            name: None,
        })
        .await
        .unwrap();
    assert_eq!(again.name.as_deref(), Some("Student"));
    assert_eq!(again.created_at, user.created_at);

    let fetched = db
        .get_user("STUDENT@christuniversity.in")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.email, user.email);
    assert!(db.get_user("nobody@christuniversity.in").await.unwrap().is_none());
}

#[tokio::test]
async fn test_set_organiser_sqlite() {
    let db = database().await;
    db.upsert_user(NewUser {
        email: "Organiser@ChristUniversity.in".to_string(),
        name: None,
    })
    .await
    .unwrap();

    assert!(db.set_organiser("organiser@christuniversity.in", true).await.unwrap());
    let user = db.get_user("organiser@christuniversity.in").await.unwrap().unwrap();
    assert!(user.is_organiser);

    // a later sign-in keeps the flag
    db.upsert_user(NewUser {
        email: "organiser@christuniversity.in".to_string(),
        name: Some("Organiser".to_string()),
    })
    .await
    .unwrap();
    let user = db.get_user("organiser@christuniversity.in").await.unwrap().unwrap();
    assert!(user.is_organiser);

    assert!(db.set_organiser("organiser@christuniversity.in", false).await.unwrap());
    assert!(!db.set_organiser("nobody@christuniversity.in", true).await.unwrap());
}

#[tokio::test]
async fn test_file_database_is_created() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let dsn = format!("sqlite:{}", temp_dir.path().join("socio.db").display());

    let db = Database::new(&dsn, 2).await.unwrap();
    db.init_schema().await.unwrap();
    db.ping().await.unwrap();
    assert!(temp_dir.path().join("socio.db").exists());
}
