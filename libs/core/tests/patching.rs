#[allow(unused)]
mod support;

use serde_json::json;
use support::*;
use vellum_core::ErrorKind;

const JSON_PATCH: &str = "application/json-patch+json";
const MERGE_PATCH: &str = "application/merge-patch+json";

#[tokio::test]
async fn json_patch_replace_records_next_version() -> anyhow::Result<()> {
    let core = memory_core();
    core.versions
        .record_create(
            "Patient",
            "p1",
            json!({"resourceType": "Patient", "id": "p1", "active": false}),
        )
        .await?;

    let patched = core
        .patcher
        .patch_resource(
            "Patient",
            "p1",
            br#"[{"op":"replace","path":"/active","value":true}]"#,
            JSON_PATCH,
            Some(1),
        )
        .await?;

    assert_eq!(patched.version_id, 2);
    assert_eq!(
        patched.resource,
        json!({"resourceType": "Patient", "id": "p1", "active": true})
    );
    let stored = core.versions.get_current("Patient", "p1").await?;
    assert_eq!(stored.resource, patched.resource);
    Ok(())
}

#[tokio::test]
async fn merge_patch_sets_and_deletes_keys() -> anyhow::Result<()> {
    let core = memory_core();
    core.versions
        .record_create(
            "Patient",
            "p1",
            json!({"resourceType": "Patient", "id": "p1", "active": false, "extra": 1}),
        )
        .await?;

    let patched = core
        .patcher
        .patch_resource(
            "Patient",
            "p1",
            br#"{"active":true,"extra":null}"#,
            "application/merge-patch+json; charset=utf-8",
            None,
        )
        .await?;

    assert_eq!(
        patched.resource,
        json!({"resourceType": "Patient", "id": "p1", "active": true})
    );
    Ok(())
}

#[tokio::test]
async fn identity_cannot_be_patched() -> anyhow::Result<()> {
    let core = memory_core();
    core.versions
        .record_create("Patient", "p1", json!({"resourceType": "Patient", "id": "p1"}))
        .await?;

    let patched = core
        .patcher
        .patch_resource(
            "Patient",
            "p1",
            br#"{"id":"other","resourceType":"Group"}"#,
            MERGE_PATCH,
            None,
        )
        .await?;

    assert_eq!(patched.resource["id"], "p1");
    assert_eq!(patched.resource["resourceType"], "Patient");
    Ok(())
}

#[tokio::test]
async fn failing_test_op_leaves_ledger_untouched() -> anyhow::Result<()> {
    let core = memory_core();
    let original = json!({"resourceType": "Patient", "id": "p1", "active": false});
    core.versions
        .record_create("Patient", "p1", original.clone())
        .await?;

    let err = core
        .patcher
        .patch_resource(
            "Patient",
            "p1",
            br#"[
                {"op":"replace","path":"/active","value":true},
                {"op":"test","path":"/active","value":false}
            ]"#,
            JSON_PATCH,
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPatch);
    assert_eq!(err.location(), Some("/active"));

    let current = core.versions.get_current("Patient", "p1").await?;
    assert_eq!(current.version_id, 1);
    assert_eq!(current.resource, original);
    Ok(())
}

#[tokio::test]
async fn stale_if_match_is_rejected_before_patching() -> anyhow::Result<()> {
    let core = memory_core();
    core.versions
        .record_create("Patient", "p1", json!({"resourceType": "Patient", "id": "p1"}))
        .await?;
    core.versions
        .record_update(
            "Patient",
            "p1",
            1,
            json!({"resourceType": "Patient", "id": "p1", "active": true}),
        )
        .await?;

    let err = core
        .patcher
        .patch_resource("Patient", "p1", br#"{"active":false}"#, MERGE_PATCH, Some(1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VersionConflict);
    assert_eq!(core.versions.get_current("Patient", "p1").await?.version_id, 2);
    Ok(())
}

#[tokio::test]
async fn patch_result_must_be_an_object() -> anyhow::Result<()> {
    let core = memory_core();
    core.versions
        .record_create("Patient", "p1", json!({"resourceType": "Patient", "id": "p1"}))
        .await?;

    let err = core
        .patcher
        .patch_resource("Patient", "p1", b"[1, 2]", MERGE_PATCH, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPatch);
    Ok(())
}

#[tokio::test]
async fn patch_errors_surface_their_kind() -> anyhow::Result<()> {
    let core = memory_core();
    core.versions
        .record_create("Patient", "p1", json!({"resourceType": "Patient", "id": "p1"}))
        .await?;
    core.versions.record_delete("Patient", "p1", 1).await?;

    let cases: [(&str, &[u8], &str, ErrorKind); 4] = [
        ("p1", b"{}", MERGE_PATCH, ErrorKind::Gone),
        ("missing", b"{}", MERGE_PATCH, ErrorKind::NotFound),
        ("p1", b"{}", "text/plain", ErrorKind::UnsupportedMediaType),
        ("p1", b"{", "", ErrorKind::UnsupportedMediaType),
    ];
    for (id, body, content_type, kind) in cases {
        let err = core
            .patcher
            .patch_resource("Patient", id, body, content_type, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "{} {}", id, content_type);
    }

    core.versions
        .record_create("Patient", "p2", json!({"resourceType": "Patient", "id": "p2"}))
        .await?;
    let err = core
        .patcher
        .patch_resource("Patient", "p2", b"{not json", MERGE_PATCH, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidMergePatch);
    let err = core
        .patcher
        .patch_resource("Patient", "p2", br#"[{"op":"jump","path":"/a"}]"#, JSON_PATCH, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPatch);
    Ok(())
}
