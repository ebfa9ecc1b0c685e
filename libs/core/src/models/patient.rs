//! Patient identity models used by matching and linking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::fmt;
use std::str::FromStr;
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use super::ToRepresentation;
use crate::Error;

/// Resource type whose representations feed the patient directory.
pub const PATIENT_RESOURCE_TYPE: &str = "Patient";

/// The demographic fields compared by the matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientDemographics {
    pub id: String,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub birth_date: Option<String>,
    pub gender: Option<String>,
}

impl PatientDemographics {
    /// Extracts demographics from a Patient representation.
    ///
    /// Uses the first `name` entry (`family`, first `given`), `birthDate` and `gender`.
    /// Blank strings count as absent.
    pub fn from_representation(id: &str, resource: &JsonValue) -> Self {
        let name = resource.get("name").and_then(|n| n.get(0));
        let text = |v: Option<&JsonValue>| {
            v.and_then(JsonValue::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            id: id.to_string(),
            last_name: text(name.and_then(|n| n.get("family"))),
            first_name: text(name.and_then(|n| n.get("given")).and_then(|g| g.get(0))),
            birth_date: text(resource.get("birthDate")),
            gender: text(resource.get("gender")),
        }
    }
}

impl ToRepresentation for PatientDemographics {
    fn to_representation(&self) -> JsonValue {
        let mut obj = serde_json::Map::new();
        obj.insert("resourceType".to_string(), json!(PATIENT_RESOURCE_TYPE));
        obj.insert("id".to_string(), json!(self.id));

        if self.last_name.is_some() || self.first_name.is_some() {
            let mut name = serde_json::Map::new();
            if let Some(family) = &self.last_name {
                name.insert("family".to_string(), json!(family));
            }
            if let Some(given) = &self.first_name {
                name.insert("given".to_string(), json!([given]));
            }
            obj.insert("name".to_string(), json!([name]));
        }
        if let Some(gender) = &self.gender {
            obj.insert("gender".to_string(), json!(gender));
        }
        if let Some(birth_date) = &self.birth_date {
            obj.insert("birthDate".to_string(), json!(birth_date));
        }
        JsonValue::Object(obj)
    }
}

/// Comparison key for names: trimmed, NFC-normalised, lowercased.
///
/// The candidate lookup and the scorer both compare through this, so a name that scores as a
/// match is also found by the lookup.
pub fn normalize_name(name: &str) -> String {
    name.trim().nfc().collect::<String>().to_lowercase()
}

/// Comparator that contributed to a match score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    LastName,
    FirstName,
    BirthDate,
    Gender,
}

impl MatchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchField::LastName => "last_name",
            MatchField::FirstName => "first_name",
            MatchField::BirthDate => "birth_date",
            MatchField::Gender => "gender",
        }
    }
}

impl fmt::Display for MatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scored potential duplicate. Computed per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientMatchCandidate {
    pub candidate_id: String,
    pub score: f64,
    pub matched_fields: Vec<MatchField>,
}

/// Relationship carried by a patient link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkType {
    #[serde(rename = "replaces")]
    Replaces,
    #[serde(rename = "replaced-by")]
    ReplacedBy,
    #[serde(rename = "refer")]
    Refer,
    #[serde(rename = "seealso")]
    SeeAlso,
}

impl LinkType {
    pub const ALL: [LinkType; 4] = [
        LinkType::Replaces,
        LinkType::ReplacedBy,
        LinkType::Refer,
        LinkType::SeeAlso,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::Replaces => "replaces",
            LinkType::ReplacedBy => "replaced-by",
            LinkType::Refer => "refer",
            LinkType::SeeAlso => "seealso",
        }
    }
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LinkType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LinkType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                Error::invalid_argument(
                    "link_type",
                    format!(
                        "unknown link type '{}' (expected one of: replaces, replaced-by, refer, seealso)",
                        s
                    ),
                )
            })
    }
}

/// A directed identity link between two patients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientLink {
    pub id: Uuid,
    pub source_patient_id: String,
    pub target_patient_id: String,
    pub link_type: LinkType,
    pub confidence: f64,
    pub match_method: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demographics_from_patient_representation() {
        let patient = json!({
            "resourceType": "Patient",
            "name": [
                {"family": " Doe ", "given": ["John", "Q"]},
                {"family": "Other"}
            ],
            "birthDate": "1990-05-15",
            "gender": ""
        });
        let d = PatientDemographics::from_representation("p1", &patient);
        assert_eq!(d.last_name.as_deref(), Some("Doe"));
        assert_eq!(d.first_name.as_deref(), Some("John"));
        assert_eq!(d.birth_date.as_deref(), Some("1990-05-15"));
        assert_eq!(d.gender, None);
    }

    #[test]
    fn demographics_round_trip_through_representation() {
        let d = PatientDemographics {
            id: "p1".into(),
            last_name: Some("Doe".into()),
            first_name: Some("Jane".into()),
            birth_date: None,
            gender: Some("female".into()),
        };
        let back = PatientDemographics::from_representation("p1", &d.to_representation());
        assert_eq!(back, d);
    }

    #[test]
    fn link_types_parse_only_the_fixed_set() {
        assert_eq!("replaced-by".parse::<LinkType>().unwrap(), LinkType::ReplacedBy);
        assert_eq!("seealso".parse::<LinkType>().unwrap(), LinkType::SeeAlso);
        assert!("see-also".parse::<LinkType>().is_err());
        assert!("Replaces".parse::<LinkType>().is_err());
    }
}
