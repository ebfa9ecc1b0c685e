//! Service layer - validation, logging and metrics around the storage traits

pub mod links;
pub mod matching;
pub mod patch;
pub mod versions;

pub use links::LinkGraph;
pub use matching::{
    MatchEngine, MATCH_THRESHOLD, WEIGHT_BIRTH_DATE, WEIGHT_FIRST_NAME, WEIGHT_GENDER,
    WEIGHT_LAST_NAME,
};
pub use patch::ResourcePatcher;
pub use versions::VersionService;
