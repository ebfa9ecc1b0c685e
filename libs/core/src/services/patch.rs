//! Patch workflow: load the current version, apply a patch document, record the result

use serde_json::json;
use std::sync::Arc;
use vellum_patch::PatchFormat;

use crate::{
    metrics::{status_label, PATCH_APPLICATIONS_TOTAL},
    models::VersionedResource,
    services::VersionService,
    Error, Result,
};

pub struct ResourcePatcher {
    versions: Arc<VersionService>,
    drop_narrative: bool,
}

impl ResourcePatcher {
    pub fn new(versions: Arc<VersionService>, drop_narrative: bool) -> Self {
        Self {
            versions,
            drop_narrative,
        }
    }

    /// Apply a JSON Patch or Merge Patch body to the current version of a resource.
    ///
    /// With `if_match`, the patch is only applied when it names the current version. Without
    /// it, the version read here is the expected version of the write. Either way a concurrent
    /// writer surfaces as `VersionConflict`; nothing is retried.
    pub async fn patch_resource(
        &self,
        resource_type: &str,
        id: &str,
        body: &[u8],
        content_type: &str,
        if_match: Option<i32>,
    ) -> Result<VersionedResource> {
        let format = PatchFormat::from_content_type(content_type)?;

        let current = self.versions.get_current(resource_type, id).await?;
        if let Some(expected) = if_match {
            if expected != current.version_id {
                return Err(Error::conflict(
                    resource_type,
                    id,
                    expected,
                    current.version_id,
                ));
            }
        }

        let applied = format.apply(&current.resource, body);
        PATCH_APPLICATIONS_TOTAL
            .with_label_values(&[format.as_str(), status_label(&applied)])
            .inc();
        let mut patched = applied?;

        // Identity is owned by the ledger, not by the document
        let obj = patched.as_object_mut().ok_or_else(|| {
            Error::InvalidPatchResult("patched resource must be a JSON object".to_string())
        })?;
        obj.insert("resourceType".to_string(), json!(resource_type));
        obj.insert("id".to_string(), json!(id));
        if self.drop_narrative {
            // The narrative no longer reflects the patched data
            obj.shift_remove("text");
        }

        let entry = self
            .versions
            .append_update(
                resource_type,
                id,
                if_match.unwrap_or(current.version_id),
                patched,
            )
            .await?;

        tracing::info!(
            resource_type,
            id,
            format = %format,
            version_id = entry.version_id,
            "Patched resource"
        );

        Ok(VersionedResource {
            resource_type: entry.resource_type,
            id: entry.id,
            version_id: entry.version_id,
            resource: entry.resource,
            last_updated: entry.recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::HistoryConfig, db::MemoryStore, ErrorKind};
    use serde_json::json;

    async fn patcher_with(resource: serde_json::Value, drop_narrative: bool) -> ResourcePatcher {
        let versions = Arc::new(VersionService::new(
            Arc::new(MemoryStore::new()),
            HistoryConfig::default(),
        ));
        versions
            .record_create("Patient", "p1", resource)
            .await
            .unwrap();
        ResourcePatcher::new(versions, drop_narrative)
    }

    #[tokio::test]
    async fn narrative_is_dropped_only_when_configured() {
        let original = json!({
            "resourceType": "Patient",
            "id": "p1",
            "text": {"status": "generated"},
            "active": false
        });
        let body = br#"{"active": true}"#;

        let patcher = patcher_with(original.clone(), true).await;
        let patched = patcher
            .patch_resource("Patient", "p1", body, "application/merge-patch+json", None)
            .await
            .unwrap();
        assert!(patched.resource.get("text").is_none());

        let patcher = patcher_with(original, false).await;
        let patched = patcher
            .patch_resource("Patient", "p1", body, "application/merge-patch+json", None)
            .await
            .unwrap();
        assert_eq!(patched.resource["text"]["status"], "generated");
    }

    #[tokio::test]
    async fn unsupported_media_type_is_rejected_before_reading() {
        let patcher = patcher_with(json!({"resourceType": "Patient", "id": "p1"}), true).await;
        let err = patcher
            .patch_resource("Patient", "missing", b"{}", "application/json", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedMediaType);
    }
}
