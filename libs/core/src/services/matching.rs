//! Deterministic patient matching
//!
//! Candidates share the source patient's last name. Each candidate is scored by adding a fixed
//! weight for every agreeing demographic field; scores are kept in hundredths so the weights
//! sum to exactly 1.0.

use std::sync::Arc;

use crate::{
    db::PatientDirectory,
    metrics::MATCH_CANDIDATES,
    models::{normalize_name, MatchField, PatientDemographics, PatientMatchCandidate},
    Error, Result,
};

pub const WEIGHT_LAST_NAME: u32 = 30;
pub const WEIGHT_FIRST_NAME: u32 = 30;
pub const WEIGHT_BIRTH_DATE: u32 = 25;
pub const WEIGHT_GENDER: u32 = 15;
/// Candidates scoring below this (in hundredths) are discarded.
pub const MATCH_THRESHOLD: u32 = 50;

pub struct MatchEngine {
    directory: Arc<dyn PatientDirectory>,
    candidate_pool_limit: i64,
}

impl MatchEngine {
    pub fn new(directory: Arc<dyn PatientDirectory>, candidate_pool_limit: i64) -> Self {
        Self {
            directory,
            candidate_pool_limit,
        }
    }

    /// Potential duplicates of `source_id`, highest score first, ties by candidate id.
    ///
    /// # Errors
    /// * `PatientNotFound` - if the source patient does not exist or is deleted
    pub async fn find_candidates(&self, source_id: &str) -> Result<Vec<PatientMatchCandidate>> {
        let source = self
            .directory
            .get_patient(source_id)
            .await?
            .ok_or_else(|| Error::PatientNotFound(source_id.to_string()))?;

        let Some(last_name) = source.last_name.as_deref() else {
            tracing::debug!(source_id, "Source patient has no last name; nothing to match");
            MATCH_CANDIDATES.observe(0.0);
            return Ok(Vec::new());
        };

        let pool = self
            .directory
            .find_by_last_name(last_name, self.candidate_pool_limit)
            .await?;
        let pool_size = pool.len();

        let mut scored: Vec<(u32, PatientMatchCandidate)> = pool
            .into_iter()
            .filter(|candidate| candidate.id != source.id)
            .filter_map(|candidate| {
                let (score, matched_fields) = score(&source, &candidate);
                (score >= MATCH_THRESHOLD).then(|| {
                    (
                        score,
                        PatientMatchCandidate {
                            candidate_id: candidate.id,
                            score: f64::from(score) / 100.0,
                            matched_fields,
                        },
                    )
                })
            })
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .cmp(a_score)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });

        let candidates: Vec<PatientMatchCandidate> = scored.into_iter().map(|(_, c)| c).collect();

        MATCH_CANDIDATES.observe(candidates.len() as f64);
        tracing::debug!(
            source_id,
            pool_size,
            returned = candidates.len(),
            "Scored match candidates"
        );

        Ok(candidates)
    }
}

/// Weighted agreement between two patients, in hundredths, with the fields that agreed.
pub fn score(source: &PatientDemographics, candidate: &PatientDemographics) -> (u32, Vec<MatchField>) {
    let mut total = 0;
    let mut matched = Vec::new();

    let mut check = |agrees: bool, field: MatchField, weight: u32| {
        if agrees {
            total += weight;
            matched.push(field);
        }
    };

    check(
        names_match(&source.last_name, &candidate.last_name),
        MatchField::LastName,
        WEIGHT_LAST_NAME,
    );
    check(
        names_match(&source.first_name, &candidate.first_name),
        MatchField::FirstName,
        WEIGHT_FIRST_NAME,
    );
    check(
        both_equal(&source.birth_date, &candidate.birth_date),
        MatchField::BirthDate,
        WEIGHT_BIRTH_DATE,
    );
    check(
        both_equal(&source.gender, &candidate.gender),
        MatchField::Gender,
        WEIGHT_GENDER,
    );

    (total, matched)
}

fn names_match(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => normalize_name(a) == normalize_name(b),
        _ => false,
    }
}

fn both_equal(a: &Option<String>, b: &Option<String>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a.trim() == b.trim())
}
