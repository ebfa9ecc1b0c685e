//! Runs against PostgreSQL when `VELLUM__DATABASE__TEST_DATABASE_URL` (or `DATABASE_URL`) is set.

#[allow(unused)]
mod support;

use serde_json::json;
use support::*;
use vellum_core::ErrorKind;

#[tokio::test]
async fn ledger_round_trip_on_postgres() -> anyhow::Result<()> {
    let Some(db) = TestDb::connect().await? else {
        return Ok(());
    };
    let versions = &db.core.versions;

    versions
        .record_create("Patient", "p1", json!({"resourceType": "Patient", "id": "p1"}))
        .await?;
    versions
        .record_update(
            "Patient",
            "p1",
            1,
            json!({"resourceType": "Patient", "id": "p1", "active": true}),
        )
        .await?;

    let err = versions
        .record_update("Patient", "p1", 1, json!({}))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionConflict);

    assert_eq!(versions.record_delete("Patient", "p1", 2).await?, 3);
    assert_eq!(
        versions.get_current("Patient", "p1").await.unwrap_err().kind(),
        ErrorKind::Gone
    );
    assert_eq!(
        versions
            .record_create("Patient", "p1", json!({}))
            .await
            .unwrap_err()
            .kind(),
        ErrorKind::AlreadyExists
    );

    let page = versions.list_versions("Patient", "p1", Some(2), 0).await?;
    assert_eq!(page.total, 3);
    let ids: Vec<i32> = page.entries.iter().map(|e| e.version_id).collect();
    assert_eq!(ids, vec![3, 2]);
    assert_eq!(versions.get_version("Patient", "p1", 2).await?.resource["active"], true);
    assert_eq!(
        versions.get_version("Patient", "p1", 4).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );

    db.cleanup().await
}

#[tokio::test]
async fn concurrent_updates_on_postgres_have_one_winner() -> anyhow::Result<()> {
    let Some(db) = TestDb::connect().await? else {
        return Ok(());
    };
    db.core
        .versions
        .record_create("Basic", "race", json!({"n": 0}))
        .await?;

    let mut handles = Vec::new();
    for n in 0..8 {
        let versions = db.core.versions.clone();
        handles.push(tokio::spawn(async move {
            versions
                .record_update("Basic", "race", 1, json!({"n": n}))
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await? {
            Ok(_) => winners += 1,
            Err(e) => assert_eq!(e.kind(), ErrorKind::VersionConflict),
        }
    }
    assert_eq!(winners, 1);

    db.cleanup().await
}

#[tokio::test]
async fn history_rows_cannot_be_rewritten() -> anyhow::Result<()> {
    let Some(db) = TestDb::connect().await? else {
        return Ok(());
    };
    db.core
        .versions
        .record_create("Basic", "b1", json!({"n": 1}))
        .await?;

    let pool = db
        .core
        .db_pool
        .clone()
        .ok_or_else(|| anyhow::anyhow!("postgres core without pool"))?;
    let rewrite = sqlx::query("UPDATE resource_history SET resource = '{}' WHERE id = 'b1'")
        .execute(&pool)
        .await;
    assert!(rewrite.is_err());
    let erase = sqlx::query("DELETE FROM resource_history WHERE id = 'b1'")
        .execute(&pool)
        .await;
    assert!(erase.is_err());

    db.cleanup().await
}

#[tokio::test]
async fn matching_and_links_on_postgres() -> anyhow::Result<()> {
    let Some(db) = TestDb::connect().await? else {
        return Ok(());
    };
    let core = &db.core;

    let doe = || {
        PatientBuilder::new()
            .family("Doe")
            .given("John")
            .gender("male")
    };
    create_patient(core, "p1", doe()).await?;
    create_patient(core, "p2", doe()).await?;
    create_patient(core, "p3", PatientBuilder::new().family(" DOE ").given("Jane")).await?;

    let candidates = core.matcher.find_candidates("p1").await?;
    let ids: Vec<&str> = candidates.iter().map(|c| c.candidate_id.as_str()).collect();
    assert_eq!(ids, vec!["p2"]);
    assert_eq!(candidates[0].score, 0.75);

    let link_id = core
        .links
        .link("p1", "p2", "seealso", candidates[0].score, "demographic", "mpi")
        .await?;
    let links = core.links.list_links("p1").await?;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].id, link_id);

    core.links.unlink(uuid::Uuid::new_v4()).await?;
    core.links.unlink(link_id).await?;
    assert!(core.links.list_links("p1").await?.is_empty());

    let precomposed = PatientBuilder::new().family("Ren\u{e9}").given("Zo\u{eb}");
    let decomposed = PatientBuilder::new().family("RENE\u{301}").given("zoe\u{308}");
    create_patient(core, "nfc", precomposed).await?;
    create_patient(core, "nfd", decomposed).await?;
    let candidates = core.matcher.find_candidates("nfc").await?;
    let ids: Vec<&str> = candidates.iter().map(|c| c.candidate_id.as_str()).collect();
    assert_eq!(ids, vec!["nfd"]);
    assert_eq!(candidates[0].score, 0.60);

    db.cleanup().await
}
