//! Facility relevance scoring and ranking.
//!
//! Scoring is driven by an explicit rule list built from a [`FacilityProfile`]:
//!
//! | signal            | field   | weight | applied                     |
//! |-------------------|---------|--------|-----------------------------|
//! | `TitleKeyword`    | title   | +3     | once per matching term      |
//! | `ContentKeyword`  | content | +2     | once per matching term      |
//! | `DisallowedTitle` | title   | -3     | once if any term matches    |
//!
//! Matching is a case-insensitive substring test. A title that trips the disallowed rule is
//! out of domain: content keywords do not count for it and it is never admitted. Every other
//! candidate is admitted when its score is strictly positive.

use tracing::debug;

use crate::facility::FacilityProfile;
use crate::record::Candidate;

/// Points per allowed title keyword.
pub const TITLE_KEYWORD_WEIGHT: i32 = 3;
/// Points per operational keyword found in the body.
pub const CONTENT_KEYWORD_WEIGHT: i32 = 2;
/// Flat penalty for an out-of-domain title.
pub const DISALLOWED_TITLE_WEIGHT: i32 = 3;
/// Results shown when the caller does not pick a limit.
pub const DEFAULT_DISPLAY_LIMIT: usize = 5;

/// What a rule looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// One allowed term in the regulatory title.
    TitleKeyword(String),
    /// One operational term in the section body.
    ContentKeyword(String),
    /// Any of these terms in the regulatory title.
    DisallowedTitle(Vec<String>),
}

/// Direction a matching rule moves the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Adds the weight.
    Boost,
    /// Subtracts the weight.
    Penalty,
}

/// One weighted scoring rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringRule {
    /// Matched signal.
    pub signal: Signal,
    /// Absolute weight.
    pub weight: i32,
    /// Sign applied to the weight.
    pub polarity: Polarity,
}

impl ScoringRule {
    /// Tests the rule against lower-cased title and content.
    pub fn matches(&self, title: &str, content: &str) -> bool {
        match &self.signal {
            Signal::TitleKeyword(term) => title.contains(term.as_str()),
            Signal::ContentKeyword(term) => content.contains(term.as_str()),
            Signal::DisallowedTitle(terms) => terms.iter().any(|term| title.contains(term.as_str())),
        }
    }

    /// Signed contribution of this rule when it matches.
    pub fn signed_weight(&self) -> i32 {
        match self.polarity {
            Polarity::Boost => self.weight,
            Polarity::Penalty => -self.weight,
        }
    }
}

/// Expands a profile into its scoring rules.
pub fn rules_for(profile: &FacilityProfile) -> Vec<ScoringRule> {
    let mut rules = Vec::with_capacity(
        profile.allowed_title_keywords.len() + profile.operational_keywords.len() + 1,
    );
    rules.extend(
        profile
            .allowed_title_keywords
            .iter()
            .map(|term| ScoringRule {
                signal: Signal::TitleKeyword(term.to_lowercase()),
                weight: TITLE_KEYWORD_WEIGHT,
                polarity: Polarity::Boost,
            }),
    );
    rules.extend(profile.operational_keywords.iter().map(|term| ScoringRule {
        signal: Signal::ContentKeyword(term.to_lowercase()),
        weight: CONTENT_KEYWORD_WEIGHT,
        polarity: Polarity::Boost,
    }));
    if !profile.disallowed_title_keywords.is_empty() {
        rules.push(ScoringRule {
            signal: Signal::DisallowedTitle(
                profile
                    .disallowed_title_keywords
                    .iter()
                    .map(|term| term.to_lowercase())
                    .collect(),
            ),
            weight: DISALLOWED_TITLE_WEIGHT,
            polarity: Polarity::Penalty,
        });
    }
    rules
}

/// Score plus the admission verdict for one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// Summed rule contributions; may be negative.
    pub score: i32,
    /// True when the title matched a disallowed term.
    pub disallowed: bool,
}

impl Assessment {
    /// Whether the candidate enters the ranked result.
    pub fn admitted(&self) -> bool {
        !self.disallowed && self.score > 0
    }
}

/// Candidate that passed admission, with its reader-facing explanation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredCandidate {
    /// Retrieved section.
    pub candidate: Candidate,
    /// Relevance score. Used for ordering only, never shown to readers.
    pub score: i32,
    /// Why the section applies to the facility.
    pub explanation: String,
}

/// Ordered, truncated ranking outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedSections {
    /// Candidates admitted before truncation.
    pub admitted: usize,
    /// Top admitted candidates, best first.
    pub shown: Vec<ScoredCandidate>,
}

impl RankedSections {
    /// True when no candidate was strong enough to show.
    pub fn is_empty(&self) -> bool {
        self.shown.is_empty()
    }
}

/// Rule set compiled for a single facility profile.
#[derive(Debug, Clone)]
pub struct Ranker<'a> {
    profile: &'a FacilityProfile,
    rules: Vec<ScoringRule>,
}

impl<'a> Ranker<'a> {
    /// Compiles the profile's rules.
    pub fn new(profile: &'a FacilityProfile) -> Self {
        Self {
            profile,
            rules: rules_for(profile),
        }
    }

    /// The compiled rules, in evaluation order.
    pub fn rules(&self) -> &[ScoringRule] {
        &self.rules
    }

    /// Scores one candidate.
    pub fn assess(&self, candidate: &Candidate) -> Assessment {
        let title = candidate.title_name.to_lowercase();
        let content = candidate.content.to_lowercase();

        let disallowed = self.rules.iter().any(|rule| {
            matches!(rule.signal, Signal::DisallowedTitle(_)) && rule.matches(&title, &content)
        });
        let score = self
            .rules
            .iter()
            .filter(|rule| !(disallowed && matches!(rule.signal, Signal::ContentKeyword(_))))
            .filter(|rule| rule.matches(&title, &content))
            .map(ScoringRule::signed_weight)
            .sum();
        Assessment { score, disallowed }
    }

    /// Filters, orders and truncates a retrieval pool.
    ///
    /// Equal scores keep their retrieval order.
    pub fn rank(&self, candidates: Vec<Candidate>, limit: usize) -> RankedSections {
        let pool = candidates.len();
        let mut admitted: Vec<ScoredCandidate> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let assessment = self.assess(&candidate);
                if !assessment.admitted() {
                    return None;
                }
                let explanation = explain(&candidate, &self.profile.name);
                Some(ScoredCandidate {
                    candidate,
                    score: assessment.score,
                    explanation,
                })
            })
            .collect();
        admitted.sort_by(|a, b| b.score.cmp(&a.score));

        let total = admitted.len();
        admitted.truncate(limit);
        debug!(
            facility = %self.profile.name,
            pool,
            admitted = total,
            shown = admitted.len(),
            "ranked candidate pool"
        );
        RankedSections {
            admitted: total,
            shown: admitted,
        }
    }
}

/// Scores `candidate` against `profile`.
pub fn score(candidate: &Candidate, profile: &FacilityProfile) -> i32 {
    Ranker::new(profile).assess(candidate).score
}

/// Ranks `candidates` for `profile`, keeping at most `limit` results.
pub fn rank(candidates: Vec<Candidate>, profile: &FacilityProfile, limit: usize) -> RankedSections {
    Ranker::new(profile).rank(candidates, limit)
}

/// Reader-facing reason a section applies to a facility.
pub fn explain(candidate: &Candidate, facility: &str) -> String {
    let title = non_empty(&candidate.title_name).unwrap_or("this CCR title");
    let section = non_empty(&candidate.section_number).unwrap_or("an unnumbered section");
    format!(
        "This section applies because {facility}s are regulated under {title}. \
         Section {section} contains provisions that may affect operational, safety, or \
         compliance requirements for this type of facility."
    )
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facility::FacilityCatalog;

    fn candidate(title: &str, section: &str, content: &str) -> Candidate {
        Candidate {
            title_name: title.into(),
            section_number: section.into(),
            content: content.into(),
            source_url: format!("https://ccr/{section}"),
            ..Candidate::default()
        }
    }

    fn synthetic_profile() -> FacilityProfile {
        FacilityProfile {
            name: "bakery".into(),
            allowed_title_keywords: vec!["food".into()],
            operational_keywords: vec!["oven".into(), "flour".into()],
            disallowed_title_keywords: vec!["securities".into()],
            follow_up_questions: vec![],
        }
    }

    #[test]
    fn restaurant_public_health_title_and_content_scores() {
        let catalog = FacilityCatalog::default();
        let restaurant = catalog.resolve("restaurant").unwrap();
        let c = candidate(
            "Public Health",
            "100",
            "Kitchen surfaces must meet SANITATION standards.",
        );
        // "public health" and "health" both hit the title, then kitchen and sanitation.
        let assessment = Ranker::new(restaurant).assess(&c);
        assert!(assessment.admitted());
        assert_eq!(assessment.score, 3 + 3 + 2 + 2);

        let only_public = FacilityProfile {
            allowed_title_keywords: vec!["Public Health".into()],
            ..restaurant.clone()
        };
        assert_eq!(score(&c, &only_public), 3 + 2 + 2);
    }

    #[test]
    fn disallowed_title_is_excluded_regardless_of_content() {
        let catalog = FacilityCatalog::default();
        let restaurant = catalog.resolve("restaurant").unwrap();
        let c = candidate(
            "Securities and Investment Code",
            "260",
            "food kitchen sanitation hygiene employee permit inspection",
        );
        let assessment = Ranker::new(restaurant).assess(&c);
        assert!(assessment.disallowed);
        assert!(assessment.score <= -3);
        assert!(rank(vec![c], restaurant, 5).is_empty());
    }

    #[test]
    fn disallowed_penalty_is_flat() {
        let profile = FacilityProfile {
            disallowed_title_keywords: vec!["securities".into(), "finance".into()],
            ..synthetic_profile()
        };
        let c = candidate("Finance and Securities", "1", "");
        assert_eq!(score(&c, &profile), -DISALLOWED_TITLE_WEIGHT);
    }

    #[test]
    fn each_rule_is_evaluated_independently() {
        let profile = synthetic_profile();
        let ranker = Ranker::new(&profile);
        let rules = ranker.rules();
        assert_eq!(rules, rules_for(&profile).as_slice());
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].signal, Signal::TitleKeyword("food".into()));
        assert!(rules[0].matches("food and agriculture", ""));
        assert!(rules[1].matches("", "preheat the oven"));
        assert!(!rules[2].matches("flour", "oven"));
        assert_eq!(rules[3].signed_weight(), -3);
    }

    #[test]
    fn adding_content_keyword_never_lowers_score() {
        let profile = synthetic_profile();
        let base = candidate("Food", "1", "oven");
        let richer = candidate("Food", "1", "oven and flour");
        assert!(score(&richer, &profile) >= score(&base, &profile));
        assert_eq!(score(&richer, &profile) - score(&base, &profile), 2);
    }

    #[test]
    fn non_positive_scores_are_not_admitted() {
        let profile = synthetic_profile();
        let zero = candidate("Vehicles", "1", "nothing relevant");
        assert_eq!(score(&zero, &profile), 0);
        let ranked = rank(vec![zero], &profile, 5);
        assert_eq!(ranked.admitted, 0);
        assert!(ranked.is_empty());
    }

    #[test]
    fn ties_keep_retrieval_order_and_limit_truncates() {
        let profile = synthetic_profile();
        let pool = vec![
            candidate("Vehicles", "1", "oven"),
            candidate("Food", "2", ""),
            candidate("Vehicles", "3", "flour"),
            candidate("Food", "4", "oven flour"),
            candidate("Vehicles", "5", "oven"),
        ];
        let ranked = rank(pool, &profile, 3);

        assert_eq!(ranked.admitted, 5);
        let order: Vec<_> = ranked
            .shown
            .iter()
            .map(|s| s.candidate.section_number.as_str())
            .collect();
        assert_eq!(order, ["4", "2", "1"]);
        assert_eq!(ranked.shown[0].score, 7);
    }

    #[test]
    fn all_tied_candidates_keep_retrieval_order() {
        let profile = synthetic_profile();
        let pool = vec![
            candidate("Vehicles", "1", "oven"),
            candidate("Food", "2", ""),
            candidate("Vehicles", "3", "flour"),
            candidate("Food", "4", "oven flour"),
            candidate("Vehicles", "5", "oven"),
        ];
        let ranked = rank(pool, &profile, 5);

        let order: Vec<_> = ranked
            .shown
            .iter()
            .map(|s| s.candidate.section_number.as_str())
            .collect();
        assert_eq!(order, ["4", "2", "1", "3", "5"]);
        let tied: Vec<_> = ranked.shown.iter().filter(|s| s.score == 2).collect();
        assert_eq!(tied.len(), 3);
    }

    #[test]
    fn explanation_names_facility_and_title_but_not_score() {
        let profile = synthetic_profile();
        let ranked = rank(vec![candidate("Food", "4242", "oven")], &profile, 5);
        let explanation = &ranked.shown[0].explanation;
        assert!(explanation.contains("bakerys are regulated under Food"));
        assert!(explanation.contains("Section 4242"));
        assert!(!explanation.contains(&ranked.shown[0].score.to_string()));
    }

    #[test]
    fn explanation_falls_back_for_missing_fields() {
        let text = explain(&Candidate::default(), "farm");
        assert!(text.contains("regulated under this CCR title"));
        assert!(text.contains("Section an unnumbered section"));
    }
}
