//! Facility question answering: retrieval, ranking and presentation.

use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::embedder::Embedder;
use crate::error::{AdvisorError, ValidationError};
use crate::facility::{FacilityCatalog, FacilityProfile};
use crate::ranker::{RankedSections, Ranker, DEFAULT_DISPLAY_LIMIT};
use crate::store::VectorIndex;

/// Appended verbatim to every user-facing answer.
pub const DISCLAIMER: &str = "Disclaimer: This information is for educational purposes only and \
does not constitute legal advice. Please consult a qualified attorney or compliance professional \
for official guidance.";

/// Candidates fetched from the index before ranking.
pub const CANDIDATE_POOL: usize = 25;

const NO_RESULTS: &str = "No strongly relevant sections found with current information.";

/// One displayed citation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationRow {
    /// Compact citation.
    pub citation: String,
    /// Hierarchy path.
    pub breadcrumb_path: String,
    /// Why the section applies.
    pub explanation: String,
    /// Source page.
    pub source_url: String,
}

/// Answer for one facility type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    /// Normalized facility name.
    pub facility: String,
    /// Ranked sections.
    pub ranked: RankedSections,
    /// Follow-up questions from the facility profile.
    pub follow_up_questions: Vec<String>,
    /// Always [`DISCLAIMER`].
    pub disclaimer: &'static str,
}

impl QueryResult {
    /// True when ranking admitted nothing.
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Displayed rows with placeholders for fields the index had no value for.
    pub fn results(&self) -> Vec<CitationRow> {
        self.ranked
            .shown
            .iter()
            .map(|scored| {
                let candidate = &scored.candidate;
                CitationRow {
                    citation: or_placeholder(&candidate.citation, "CCR § (see source)"),
                    breadcrumb_path: or_placeholder(
                        &candidate.breadcrumb_path,
                        "CCR hierarchy unavailable",
                    ),
                    explanation: scored.explanation.clone(),
                    source_url: or_placeholder(&candidate.source_url, "Source unavailable"),
                }
            })
            .collect()
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.trim().is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}

fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Applicable CCR Sections for {}:",
            capitalize(&self.facility)
        )?;
        writeln!(f)?;
        if self.is_empty() {
            writeln!(f, "{NO_RESULTS}")?;
            writeln!(f)?;
        } else {
            for row in self.results() {
                writeln!(f, "{}", row.citation)?;
                writeln!(f, "  Path: {}", row.breadcrumb_path)?;
                writeln!(f, "  Why it applies: {}", row.explanation)?;
                writeln!(f, "  Source: {}", row.source_url)?;
                writeln!(f)?;
            }
            writeln!(
                f,
                "Showing {} of {} relevant sections.",
                self.ranked.shown.len(),
                self.ranked.admitted
            )?;
            writeln!(f)?;
        }
        writeln!(f, "Follow-up questions to refine compliance guidance:")?;
        for question in &self.follow_up_questions {
            writeln!(f, "  - {question}")?;
        }
        writeln!(f)?;
        write!(f, "{}", self.disclaimer)
    }
}

/// Answers "which regulations apply to facility X".
///
/// Holds only shared, read-only state, so one advisor can serve concurrent queries.
#[derive(Clone)]
pub struct Advisor {
    catalog: Arc<FacilityCatalog>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    pool_size: usize,
    display_limit: usize,
}

impl Advisor {
    /// Creates an advisor with the default pool (25) and display limit (5).
    pub fn new(
        catalog: Arc<FacilityCatalog>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
    ) -> Self {
        Self {
            catalog,
            embedder,
            index,
            pool_size: CANDIDATE_POOL,
            display_limit: DEFAULT_DISPLAY_LIMIT,
        }
    }

    /// Overrides how many ranked sections are shown.
    pub fn with_display_limit(mut self, limit: usize) -> Self {
        self.display_limit = limit.max(1);
        self
    }

    /// Overrides how many candidates are retrieved before ranking.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    /// The facility catalog in use.
    pub fn catalog(&self) -> &FacilityCatalog {
        &self.catalog
    }

    /// Checks a facility type without doing any retrieval.
    pub fn validate(&self, facility_type: &str) -> Result<&FacilityProfile, ValidationError> {
        self.catalog.resolve(facility_type)
    }

    /// Retrieves, ranks and packages the answer for `facility_type`.
    pub async fn answer(&self, facility_type: &str) -> Result<QueryResult, AdvisorError> {
        let profile = self.validate(facility_type)?;
        let query = self.embedder.embed_one(&profile.name).await?;
        let pool = self.index.query(&query, self.pool_size).await?;
        let retrieved = pool.len();

        let ranked = Ranker::new(profile).rank(pool, self.display_limit);
        info!(
            facility = %profile.name,
            retrieved,
            admitted = ranked.admitted,
            shown = ranked.shown.len(),
            "answered facility query"
        );
        Ok(QueryResult {
            facility: profile.name.clone(),
            ranked,
            follow_up_questions: profile.follow_up_questions.clone(),
            disclaimer: DISCLAIMER,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use crate::record::Candidate;
    use crate::ranker::ScoredCandidate;
    use crate::enricher::enrich;
    use crate::record::StructuredRecord;
    use crate::store::{CorpusIndexer, MemoryIndex};

    fn advisor() -> Advisor {
        Advisor::new(
            Arc::new(FacilityCatalog::default()),
            Arc::new(HashingEmbedder::new(32)),
            Arc::new(MemoryIndex::new()),
        )
    }

    #[tokio::test]
    async fn unknown_facility_fails_before_retrieval() {
        let err = advisor().answer("casino").await.unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::Validation(ValidationError::UnknownFacility { .. })
        ));
    }

    #[tokio::test]
    async fn empty_index_yields_explicit_no_results() {
        let result = advisor().answer(" FARM ").await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.facility, "farm");
        assert_eq!(result.follow_up_questions.len(), 3);

        let rendered = result.to_string();
        assert!(rendered.starts_with("Applicable CCR Sections for Farm:"));
        assert!(rendered.contains(NO_RESULTS));
        assert!(rendered.contains("  - Do you raise livestock?"));
        assert!(rendered.ends_with(DISCLAIMER));
    }

    #[tokio::test]
    async fn ranking_only_sees_the_retrieved_pool() {
        let mut finance = StructuredRecord::new("https://ccr/10/1", "farm");
        finance.title_name = Some("Finance".into());
        let mut pesticide = StructuredRecord::new("https://ccr/3/6000", "pesticide records");
        pesticide.title_name = Some("Food and Agriculture".into());
        let corpus = vec![enrich(finance), enrich(pesticide)];

        let embedder = Arc::new(HashingEmbedder::new(1024));
        let index = Arc::new(MemoryIndex::new());
        CorpusIndexer::new(embedder.as_ref(), index.as_ref())
            .index(&corpus)
            .await
            .unwrap();
        let advisor = Advisor::new(Arc::new(FacilityCatalog::default()), embedder, index);

        // The finance record embeds identically to the query, so a pool of one holds only it.
        let narrow = advisor.clone().with_pool_size(1).answer("farm").await.unwrap();
        assert!(narrow.is_empty());

        let wide = advisor.answer("farm").await.unwrap();
        assert_eq!(wide.ranked.admitted, 1);
        assert_eq!(wide.results()[0].source_url, "https://ccr/3/6000");
    }

    #[test]
    fn rows_use_placeholders_for_blank_fields() {
        let result = QueryResult {
            facility: "movie theater".into(),
            ranked: RankedSections {
                admitted: 1,
                shown: vec![ScoredCandidate {
                    candidate: Candidate::default(),
                    score: 3,
                    explanation: "because".into(),
                }],
            },
            follow_up_questions: vec![],
            disclaimer: DISCLAIMER,
        };
        let rows = result.results();
        assert_eq!(rows[0].citation, "CCR § (see source)");
        assert_eq!(rows[0].breadcrumb_path, "CCR hierarchy unavailable");
        assert_eq!(rows[0].source_url, "Source unavailable");

        let rendered = result.to_string();
        assert!(rendered.starts_with("Applicable CCR Sections for Movie theater:"));
        assert!(rendered.contains("Showing 1 of 1 relevant sections."));
    }
}
