//! Domain models for the record core

pub mod history;
pub mod patient;

pub use history::{
    tombstone, HistoryAction, HistoryEntry, HistoryPage, ToRepresentation, VersionedResource,
};
pub use patient::{
    normalize_name, LinkType, MatchField, PatientDemographics, PatientLink, PatientMatchCandidate,
    PATIENT_RESOURCE_TYPE,
};
