//! Facility profiles: the keyword model behind relevance ranking.
//!
//! A [`FacilityCatalog`] is built once at startup (built-in profiles or a TOML override) and
//! shared read-only by every query.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, ValidationError};

/// Keyword model for one facility type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityProfile {
    /// Normalized facility name, e.g. `movie theater`.
    pub name: String,
    /// Terms that mark a regulatory title as the right domain.
    pub allowed_title_keywords: Vec<String>,
    /// Terms that mark section content as operationally relevant.
    pub operational_keywords: Vec<String>,
    /// Terms that mark a regulatory title as clearly unrelated.
    #[serde(default = "default_disallowed_titles")]
    pub disallowed_title_keywords: Vec<String>,
    /// Questions shown after every answer to refine guidance.
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}

impl FacilityProfile {
    /// Lower-cases and de-duplicates keyword lists so matching is case-insensitive and each
    /// term counts once.
    fn normalized(mut self) -> Self {
        self.name = normalize_facility(&self.name);
        for list in [
            &mut self.allowed_title_keywords,
            &mut self.operational_keywords,
            &mut self.disallowed_title_keywords,
        ] {
            let mut seen = Vec::with_capacity(list.len());
            for term in list.drain(..) {
                let term = term.trim().to_lowercase();
                if !term.is_empty() && !seen.contains(&term) {
                    seen.push(term);
                }
            }
            *list = seen;
        }
        self
    }
}

fn default_disallowed_titles() -> Vec<String> {
    ["investment", "finance", "securities"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Trims, lower-cases and collapses inner whitespace.
pub fn normalize_facility(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Immutable set of facility profiles keyed by normalized name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilityCatalog {
    profiles: Vec<FacilityProfile>,
}

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    facility: Vec<FacilityProfile>,
}

impl FacilityCatalog {
    /// Builds a catalog, rejecting empty catalogs, blank names and duplicate names.
    pub fn new(profiles: Vec<FacilityProfile>) -> Result<Self, CatalogError> {
        if profiles.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut normalized: Vec<FacilityProfile> = Vec::with_capacity(profiles.len());
        for profile in profiles {
            let profile = profile.normalized();
            if profile.name.is_empty() {
                return Err(CatalogError::BlankName);
            }
            if normalized.iter().any(|p| p.name == profile.name) {
                return Err(CatalogError::Duplicate(profile.name));
            }
            normalized.push(profile);
        }
        Ok(Self {
            profiles: normalized,
        })
    }

    /// Parses a TOML document with one `[[facility]]` table per profile.
    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(source)?;
        Self::new(file.facility)
    }

    /// Loads a TOML catalog from disk.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let source = fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Looks up a facility type, case-insensitively and ignoring surrounding whitespace.
    pub fn resolve(&self, facility_type: &str) -> Result<&FacilityProfile, ValidationError> {
        let key = normalize_facility(facility_type);
        self.profiles
            .iter()
            .find(|profile| profile.name == key)
            .ok_or_else(|| ValidationError::UnknownFacility {
                given: facility_type.trim().to_string(),
                supported: self.names().join(", "),
            })
    }

    /// Supported facility names in configuration order.
    pub fn names(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.name.as_str()).collect()
    }

    /// All profiles in configuration order.
    pub fn profiles(&self) -> &[FacilityProfile] {
        &self.profiles
    }
}

impl Default for FacilityCatalog {
    /// Restaurant, farm and movie theater profiles.
    fn default() -> Self {
        Self::new(builtin_profiles()).expect("built-in facility profiles are valid")
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin_profiles() -> Vec<FacilityProfile> {
    vec![
        FacilityProfile {
            name: "restaurant".into(),
            allowed_title_keywords: strings(&[
                "Public Health",
                "Food",
                "Agriculture",
                "Alcoholic Beverage",
                "Labor",
                "Occupational Safety",
                "Health",
            ]),
            operational_keywords: strings(&[
                "food",
                "restaurant",
                "sanitation",
                "hygiene",
                "kitchen",
                "employee",
                "health",
                "permit",
                "alcohol",
                "beverage",
                "refrigeration",
                "inspection",
            ]),
            disallowed_title_keywords: default_disallowed_titles(),
            follow_up_questions: strings(&[
                "Do you prepare food on-site?",
                "Do you serve alcohol?",
                "How many employees work at the facility?",
                "Is food stored or refrigerated on the premises?",
            ]),
        },
        FacilityProfile {
            name: "farm".into(),
            allowed_title_keywords: strings(&[
                "Food",
                "Agriculture",
                "Environmental Protection",
                "Labor",
                "Pesticide",
            ]),
            operational_keywords: strings(&[
                "farm",
                "agriculture",
                "pesticide",
                "fertilizer",
                "livestock",
                "worker",
                "environment",
            ]),
            disallowed_title_keywords: default_disallowed_titles(),
            follow_up_questions: strings(&[
                "Do you use pesticides or fertilizers?",
                "Do you employ seasonal or migrant workers?",
                "Do you raise livestock?",
            ]),
        },
        FacilityProfile {
            name: "movie theater".into(),
            allowed_title_keywords: strings(&[
                "Public Safety",
                "Fire",
                "Building Standards",
                "Labor",
            ]),
            operational_keywords: strings(&[
                "theater",
                "public assembly",
                "fire safety",
                "occupancy",
                "emergency",
                "employee",
            ]),
            disallowed_title_keywords: default_disallowed_titles(),
            follow_up_questions: strings(&[
                "What is the seating capacity?",
                "Do you sell food or beverages?",
                "Do you employ security staff?",
            ]),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_case_insensitively_and_trimmed() {
        let catalog = FacilityCatalog::default();
        assert_eq!(catalog.resolve("  Restaurant ").unwrap().name, "restaurant");
        assert_eq!(catalog.resolve("MOVIE   theater").unwrap().name, "movie theater");
    }

    #[test]
    fn unknown_facility_is_a_validation_error() {
        let catalog = FacilityCatalog::default();
        let err = catalog.resolve("spaceport").unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownFacility {
                given: "spaceport".into(),
                supported: "restaurant, farm, movie theater".into(),
            }
        );
        assert!(catalog.resolve("").is_err());
    }

    #[test]
    fn keywords_are_lowercased_and_deduplicated() {
        let catalog = FacilityCatalog::default();
        let restaurant = catalog.resolve("restaurant").unwrap();
        assert!(restaurant
            .allowed_title_keywords
            .contains(&"public health".to_string()));
        assert_eq!(
            restaurant
                .allowed_title_keywords
                .iter()
                .filter(|k| k.as_str() == "health")
                .count(),
            1
        );
    }

    #[test]
    fn loads_toml_override() {
        let catalog = FacilityCatalog::from_toml_str(
            r#"
            [[facility]]
            name = "Dry Cleaner"
            allowed_title_keywords = ["Environmental Protection"]
            operational_keywords = ["solvent", "Solvent"]
            follow_up_questions = ["Do you use perchloroethylene?"]
            "#,
        )
        .unwrap();

        let profile = catalog.resolve("dry cleaner").unwrap();
        assert_eq!(profile.operational_keywords, ["solvent"]);
        assert_eq!(
            profile.disallowed_title_keywords,
            ["investment", "finance", "securities"]
        );
    }

    #[test]
    fn rejects_empty_and_duplicate_catalogs() {
        assert!(matches!(
            FacilityCatalog::from_toml_str(""),
            Err(CatalogError::Empty)
        ));
        let dup = r#"
            [[facility]]
            name = "farm"
            allowed_title_keywords = []
            operational_keywords = []
            [[facility]]
            name = "Farm "
            allowed_title_keywords = []
            operational_keywords = []
        "#;
        assert!(matches!(
            FacilityCatalog::from_toml_str(dup),
            Err(CatalogError::Duplicate(name)) if name == "farm"
        ));
    }

    #[test]
    fn rejects_blank_facility_names() {
        let blank = r#"
            [[facility]]
            name = "  "
            allowed_title_keywords = ["Food"]
            operational_keywords = ["food"]
        "#;
        assert!(matches!(
            FacilityCatalog::from_toml_str(blank),
            Err(CatalogError::BlankName)
        ));
    }

    #[test]
    fn builtin_profiles_keep_configuration_order() {
        let catalog = FacilityCatalog::default();
        let names: Vec<_> = catalog.profiles().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, catalog.names());
        assert_eq!(names, ["restaurant", "farm", "movie theater"]);
        assert!(catalog
            .profiles()
            .iter()
            .all(|p| !p.follow_up_questions.is_empty()));
    }
}
