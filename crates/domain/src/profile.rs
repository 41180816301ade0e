use serde::{Deserialize, Serialize};

use crate::capsule::TargetCriteria;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Read-only view of a user as a potential recipient. Sourced from the
/// profile store; `receive_bottles=false` excludes the user entirely.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CandidateProfile {
    pub id: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub birth_year: Option<i32>,
    pub gender: Option<Gender>,
    pub receive_bottles: bool,
}

impl CandidateProfile {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }
}

/// Age window, gender target, and location-present checks. Distance is
/// checked separately because it needs the store-side RPC.
pub fn eligible(candidate: &CandidateProfile, criteria: &TargetCriteria, current_year: i32) -> bool {
    let Some(birth_year) = candidate.birth_year else {
        return false;
    };
    let age = current_year - birth_year;
    if age < criteria.min_age || age > criteria.max_age {
        return false;
    }
    if !criteria.target_gender.accepts(candidate.gender) {
        return false;
    }
    candidate.location().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule::TargetGender;

    const YEAR: i32 = 2026;

    fn criteria() -> TargetCriteria {
        TargetCriteria {
            min_age: 18,
            max_age: 30,
            target_gender: TargetGender::Female,
            max_distance_km: 50.0,
        }
    }

    fn candidate(birth_year: Option<i32>, gender: Option<Gender>) -> CandidateProfile {
        CandidateProfile {
            id: "candidate-1".to_string(),
            lat: Some(1.0),
            lng: Some(2.0),
            birth_year,
            gender,
            receive_bottles: true,
        }
    }

    #[test]
    fn accepts_candidate_inside_age_window_with_matching_gender() {
        assert!(eligible(
            &candidate(Some(YEAR - 25), Some(Gender::Female)),
            &criteria(),
            YEAR
        ));
    }

    #[test]
    fn rejects_unknown_birth_year() {
        assert!(!eligible(&candidate(None, Some(Gender::Female)), &criteria(), YEAR));
    }

    #[test]
    fn rejects_age_outside_window() {
        assert!(!eligible(
            &candidate(Some(YEAR - 17), Some(Gender::Female)),
            &criteria(),
            YEAR
        ));
        assert!(!eligible(
            &candidate(Some(YEAR - 31), Some(Gender::Female)),
            &criteria(),
            YEAR
        ));
    }

    #[test]
    fn rejects_gender_mismatch() {
        assert!(!eligible(
            &candidate(Some(YEAR - 25), Some(Gender::Male)),
            &criteria(),
            YEAR
        ));
    }

    #[test]
    fn rejects_missing_location() {
        let mut profile = candidate(Some(YEAR - 25), Some(Gender::Female));
        profile.lng = None;
        assert!(!eligible(&profile, &criteria(), YEAR));
    }
}
