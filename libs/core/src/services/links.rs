//! Identity links between patients

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    db::LinkStore,
    metrics::LINKS_TOTAL,
    models::{LinkType, PatientLink},
    Error, Result,
};

/// Directed, typed links with provenance. Links are never reciprocated automatically.
pub struct LinkGraph {
    store: Arc<dyn LinkStore>,
}

impl LinkGraph {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }

    /// Persist a link from `source_id` to `target_id`.
    ///
    /// # Errors
    /// * `InvalidArgument` - self-link, blank id, unknown link type, or a confidence
    ///   that is not a finite number in `[0, 1]`
    pub async fn link(
        &self,
        source_id: &str,
        target_id: &str,
        link_type: &str,
        confidence: f64,
        match_method: &str,
        created_by: &str,
    ) -> Result<Uuid> {
        let source_id = source_id.trim();
        let target_id = target_id.trim();
        if source_id.is_empty() {
            return Err(Error::invalid_argument("source_id", "must not be blank"));
        }
        if target_id.is_empty() {
            return Err(Error::invalid_argument("target_id", "must not be blank"));
        }
        if source_id == target_id {
            return Err(Error::invalid_argument(
                "target_id",
                format!("a patient cannot be linked to itself ({})", source_id),
            ));
        }
        let link_type: LinkType = link_type.parse()?;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(Error::invalid_argument(
                "confidence",
                format!("must be between 0 and 1 (got {})", confidence),
            ));
        }

        let link = PatientLink {
            id: Uuid::new_v4(),
            source_patient_id: source_id.to_string(),
            target_patient_id: target_id.to_string(),
            link_type,
            confidence,
            match_method: match_method.to_string(),
            created_at: Utc::now(),
            created_by: created_by.to_string(),
        };
        self.store.insert_link(&link).await?;

        LINKS_TOTAL.with_label_values(&["link"]).inc();
        tracing::info!(
            link_id = %link.id,
            source_id,
            target_id,
            link_type = %link_type,
            confidence,
            "Linked patients"
        );

        Ok(link.id)
    }

    /// Links whose source is `patient_id`, newest first.
    pub async fn list_links(&self, patient_id: &str) -> Result<Vec<PatientLink>> {
        tracing::debug!(patient_id, "Listing patient links");
        self.store.links_from(patient_id).await
    }

    pub async fn get_link(&self, link_id: Uuid) -> Result<PatientLink> {
        self.store
            .get_link(link_id)
            .await?
            .ok_or(Error::LinkNotFound(link_id))
    }

    /// Remove a link. Removing a link that does not exist is not an error.
    pub async fn unlink(&self, link_id: Uuid) -> Result<()> {
        let removed = self.store.delete_link(link_id).await?;

        LINKS_TOTAL.with_label_values(&["unlink"]).inc();
        if removed {
            tracing::info!(link_id = %link_id, "Removed patient link");
        } else {
            tracing::debug!(link_id = %link_id, "Unlink of absent link ignored");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use tokio_test::{assert_err, assert_ok, block_on};

    #[test]
    fn confidence_bounds_are_inclusive() {
        let graph = LinkGraph::new(Arc::new(MemoryStore::new()));
        block_on(async {
            assert_ok!(graph.link("a", "b", "refer", 0.0, "manual", "admin").await);
            assert_ok!(graph.link("a", "c", "refer", 1.0, "manual", "admin").await);
            assert_err!(graph.link("a", "d", "refer", -0.01, "manual", "admin").await);
            assert_err!(
                graph
                    .link("a", "d", "refer", f64::INFINITY, "manual", "admin")
                    .await
            );
        });
    }

    #[test]
    fn ids_are_trimmed_before_the_self_link_check() {
        let graph = LinkGraph::new(Arc::new(MemoryStore::new()));
        let err = block_on(graph.link("a", " a ", "seealso", 0.5, "manual", "admin"));
        assert!(matches!(
            err,
            Err(Error::InvalidArgument {
                field: "target_id",
                ..
            })
        ));
    }
}
