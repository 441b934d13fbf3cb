//! Deterministic evidence grading.
//!
//! Grades a set of retrieved documents in three stages:
//!
//! 1. **Factor analysis** ([`analyze_factors`]): study types in input order,
//!    reported sample sizes, mean age, conflict and design flags.
//! 2. **Score** ([`calculate_score`]): four additive bands.
//!
//!    | Band | Rule | Points |
//!    |------|------|--------|
//!    | Study type | Meta-Analysis / RCT / Systematic Review / Cohort / Case-Control / other | 40 / 30 / 25 / 20 / 15 / 10 |
//!    | Sample size | mean ≥1000 / ≥500 / ≥100 / below; 0 if none reported | 25 / 20 / 15 / 10 |
//!    | Recency | mean age ≤2 / ≤5 / ≤10 / older | 20 / 15 / 10 / 5 |
//!    | Conflicts | none / any | 15 / 5 |
//!
//! 3. **Strength** ([`determine_strength`]): Strong needs a meta-analysis at
//!    80+ or a meta-analysis/RCT at 70+; then Moderate at 60+, Weak at 40+.
//!
//! Study-type points reward presence anywhere in the set, while sample size
//! and recency average over it. One meta-analysis among many small, old
//! studies still earns the full 40 design points.
//!
//! The grader never calls a model. See [`crate::completion`] for the
//! optional model-based estimate.

use chrono::{Datelike, Utc};

use crate::models::{Document, EvidenceFactors, EvidenceGrade, EvidenceStrength, StudyType};

const NO_EVIDENCE: &str = "No evidence available";
const LIMITED_EVIDENCE: &str = "Limited evidence available";

/// Grade documents against the current calendar year (UTC).
pub fn grade_evidence(docs: &[Document]) -> EvidenceGrade {
    grade_evidence_as_of(docs, Utc::now().year())
}

/// Grade documents with recency measured from `current_year`.
pub fn grade_evidence_as_of(docs: &[Document], current_year: i32) -> EvidenceGrade {
    if docs.is_empty() {
        return EvidenceGrade {
            strength: EvidenceStrength::Insufficient,
            score: 0,
            factors: EvidenceFactors::empty(),
            reasoning: NO_EVIDENCE.to_string(),
        };
    }

    let factors = analyze_factors(docs, current_year);
    let score = calculate_score(&factors);
    let strength = determine_strength(score, &factors);
    let reasoning = generate_reasoning(&factors);

    EvidenceGrade {
        strength,
        score,
        factors,
        reasoning,
    }
}

pub fn analyze_factors(docs: &[Document], current_year: i32) -> EvidenceFactors {
    let study_types: Vec<StudyType> = docs.iter().map(|d| d.study_type).collect();
    let sample_sizes: Vec<u32> = docs.iter().filter_map(|d| d.sample_size).collect();

    let recency = if docs.is_empty() {
        0.0
    } else {
        let total_age: i64 = docs
            .iter()
            .map(|d| i64::from(current_year) - i64::from(d.publication_year()))
            .sum();
        total_age as f64 / docs.len() as f64
    };

    EvidenceFactors {
        meta_analysis_present: study_types.contains(&StudyType::MetaAnalysis),
        rct_present: study_types.contains(&StudyType::RandomizedControlledTrial),
        conflicts_of_interest: docs.iter().any(Document::has_conflicts),
        study_types,
        sample_sizes,
        recency,
    }
}

/// Sum of the four bands, clamped to 100.
pub fn calculate_score(factors: &EvidenceFactors) -> u8 {
    let total = study_type_points(factors)
        + sample_size_points(factors)
        + recency_points(factors)
        + conflict_points(factors);
    total.min(100) as u8
}

fn study_type_points(factors: &EvidenceFactors) -> u32 {
    let has = |t: StudyType| factors.study_types.contains(&t);
    if factors.meta_analysis_present {
        40
    } else if factors.rct_present {
        30
    } else if has(StudyType::SystematicReview) {
        25
    } else if has(StudyType::CohortStudy) {
        20
    } else if has(StudyType::CaseControlStudy) {
        15
    } else {
        10
    }
}

fn sample_size_points(factors: &EvidenceFactors) -> u32 {
    match factors.mean_sample_size() {
        None => 0,
        Some(mean) if mean >= 1000.0 => 25,
        Some(mean) if mean >= 500.0 => 20,
        Some(mean) if mean >= 100.0 => 15,
        Some(_) => 10,
    }
}

fn recency_points(factors: &EvidenceFactors) -> u32 {
    if factors.recency <= 2.0 {
        20
    } else if factors.recency <= 5.0 {
        15
    } else if factors.recency <= 10.0 {
        10
    } else {
        5
    }
}

fn conflict_points(factors: &EvidenceFactors) -> u32 {
    if factors.conflicts_of_interest {
        5
    } else {
        15
    }
}

/// First matching rule wins.
pub fn determine_strength(score: u8, factors: &EvidenceFactors) -> EvidenceStrength {
    if score >= 80 && factors.meta_analysis_present {
        EvidenceStrength::Strong
    } else if score >= 70 && (factors.meta_analysis_present || factors.rct_present) {
        EvidenceStrength::Strong
    } else if score >= 60 {
        EvidenceStrength::Moderate
    } else if score >= 40 {
        EvidenceStrength::Weak
    } else {
        EvidenceStrength::Insufficient
    }
}

pub fn generate_reasoning(factors: &EvidenceFactors) -> String {
    let mut notes: Vec<&str> = Vec::new();

    if factors.meta_analysis_present {
        notes.push("Meta-analysis provides highest level of evidence");
    } else if factors.rct_present {
        notes.push("Randomized controlled trials provide strong evidence");
    }
    if factors.mean_sample_size().is_some_and(|m| m >= 500.0) {
        notes.push("Large sample sizes increase reliability");
    }
    if factors.recency <= 5.0 {
        notes.push("Recent studies reflect current knowledge");
    }
    if factors.conflicts_of_interest {
        notes.push("Some studies have conflicts of interest");
    }

    if notes.is_empty() {
        LIMITED_EVIDENCE.to_string()
    } else {
        notes.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const YEAR: i32 = 2024;

    fn doc(study_type: StudyType, sample_size: Option<u32>, year: i32, conflicted: bool) -> Document {
        Document {
            id: format!("{}-{}", study_type.as_str(), year),
            title: "Study".to_string(),
            abstract_text: String::new(),
            authors: vec![],
            journal: "Journal".to_string(),
            publication_date: NaiveDate::from_ymd_opt(year, 6, 1).unwrap(),
            doi: None,
            pmid: None,
            url: None,
            study_type,
            sample_size,
            conflicts_of_interest: if conflicted {
                vec!["Industry funding".to_string()]
            } else {
                vec![]
            },
            keywords: vec![],
        }
    }

    fn factors(meta: bool, rct: bool) -> EvidenceFactors {
        EvidenceFactors {
            meta_analysis_present: meta,
            rct_present: rct,
            ..EvidenceFactors::empty()
        }
    }

    #[test]
    fn test_empty_input_sentinel() {
        let grade = grade_evidence(&[]);
        assert_eq!(grade.score, 0);
        assert_eq!(grade.strength, EvidenceStrength::Insufficient);
        assert_eq!(grade.reasoning, "No evidence available");
        assert!(grade.factors.study_types.is_empty());
        assert!(grade.factors.sample_sizes.is_empty());
    }

    #[test]
    fn test_recent_large_meta_analysis_is_strong() {
        let grade = grade_evidence_as_of(&[doc(StudyType::MetaAnalysis, Some(3000), YEAR, false)], YEAR);
        assert_eq!(grade.score, 100);
        assert_eq!(grade.strength, EvidenceStrength::Strong);
        assert_eq!(
            grade.reasoning,
            "Meta-analysis provides highest level of evidence; \
             Large sample sizes increase reliability; \
             Recent studies reflect current knowledge"
        );
    }

    #[test]
    fn test_current_year_default() {
        let this_year = Utc::now().year();
        let grade = grade_evidence(&[doc(StudyType::MetaAnalysis, Some(3000), this_year, false)]);
        assert_eq!(grade.score, 100);
    }

    #[test]
    fn test_old_small_conflicted_case_study_is_insufficient() {
        let grade = grade_evidence_as_of(&[doc(StudyType::CaseStudy, Some(20), YEAR - 15, true)], YEAR);
        assert_eq!(grade.score, 30);
        assert_eq!(grade.strength, EvidenceStrength::Insufficient);
        assert_eq!(grade.reasoning, "Some studies have conflicts of interest");
    }

    #[test]
    fn test_rct_dominates_cohort() {
        let docs = [
            doc(StudyType::RandomizedControlledTrial, Some(50), YEAR, false),
            doc(StudyType::CohortStudy, Some(5000), YEAR, false),
        ];
        let f = analyze_factors(&docs, YEAR);
        assert_eq!(study_type_points(&f), 30);
        assert!(f.rct_present);
        assert!(!f.meta_analysis_present);
    }

    #[test]
    fn test_study_type_priority() {
        let cases = [
            (StudyType::SystematicReview, 25),
            (StudyType::CohortStudy, 20),
            (StudyType::CaseControlStudy, 15),
            (StudyType::CrossSectionalStudy, 10),
            (StudyType::Review, 10),
            (StudyType::Other, 10),
        ];
        for (t, points) in cases {
            let f = analyze_factors(&[doc(t, None, YEAR, false)], YEAR);
            assert_eq!(study_type_points(&f), points, "{}", t);
        }
    }

    #[test]
    fn test_missing_sample_sizes_skip_band() {
        let docs = [
            doc(StudyType::CohortStudy, None, YEAR, false),
            doc(StudyType::CohortStudy, None, YEAR, false),
        ];
        let f = analyze_factors(&docs, YEAR);
        assert!(f.sample_sizes.is_empty());
        // 20 + 0 + 20 + 15
        assert_eq!(calculate_score(&f), 55);
    }

    #[test]
    fn test_sample_sizes_omit_missing_not_zero() {
        let docs = [
            doc(StudyType::CohortStudy, Some(1200), YEAR, false),
            doc(StudyType::CohortStudy, None, YEAR, false),
        ];
        let f = analyze_factors(&docs, YEAR);
        assert_eq!(f.sample_sizes, vec![1200]);
        assert_eq!(sample_size_points(&f), 25);
    }

    #[test]
    fn test_sample_size_bands() {
        for (n, points) in [(1000, 25), (999, 20), (500, 20), (499, 15), (100, 15), (99, 10)] {
            let f = analyze_factors(&[doc(StudyType::Other, Some(n), YEAR, false)], YEAR);
            assert_eq!(sample_size_points(&f), points, "n={}", n);
        }
    }

    #[test]
    fn test_recency_is_mean_age() {
        let docs = [
            doc(StudyType::Other, None, YEAR, false),
            doc(StudyType::Other, None, YEAR - 6, false),
        ];
        let f = analyze_factors(&docs, YEAR);
        assert_eq!(f.recency, 3.0);
        assert_eq!(recency_points(&f), 15);
    }

    #[test]
    fn test_recency_bands() {
        for (age, points) in [(0, 20), (2, 20), (3, 15), (5, 15), (6, 10), (10, 10), (11, 5)] {
            let f = analyze_factors(&[doc(StudyType::Other, None, YEAR - age, false)], YEAR);
            assert_eq!(recency_points(&f), points, "age={}", age);
        }
    }

    #[test]
    fn test_any_conflict_flags_set() {
        let docs = [
            doc(StudyType::Other, None, YEAR, false),
            doc(StudyType::Other, None, YEAR, true),
        ];
        let f = analyze_factors(&docs, YEAR);
        assert!(f.conflicts_of_interest);
        assert_eq!(conflict_points(&f), 5);
    }

    #[test]
    fn test_study_types_keep_duplicates_in_order() {
        let docs = [
            doc(StudyType::Review, None, YEAR, false),
            doc(StudyType::CohortStudy, None, YEAR, false),
            doc(StudyType::Review, None, YEAR, false),
        ];
        let f = analyze_factors(&docs, YEAR);
        assert_eq!(
            f.study_types,
            vec![StudyType::Review, StudyType::CohortStudy, StudyType::Review]
        );
    }

    #[test]
    fn test_strength_gates_on_design() {
        assert_eq!(determine_strength(85, &factors(true, false)), EvidenceStrength::Strong);
        assert_eq!(determine_strength(75, &factors(false, true)), EvidenceStrength::Strong);
        assert_eq!(determine_strength(75, &factors(true, false)), EvidenceStrength::Strong);
        assert_eq!(determine_strength(75, &factors(false, false)), EvidenceStrength::Moderate);
        assert_eq!(determine_strength(95, &factors(false, false)), EvidenceStrength::Moderate);
        assert_eq!(determine_strength(69, &factors(true, true)), EvidenceStrength::Moderate);
        assert_eq!(determine_strength(40, &factors(false, false)), EvidenceStrength::Weak);
        assert_eq!(determine_strength(39, &factors(true, true)), EvidenceStrength::Insufficient);
    }

    #[test]
    fn test_strength_monotonic_in_score() {
        for (meta, rct) in [(false, false), (true, false), (false, true), (true, true)] {
            let f = factors(meta, rct);
            let mut previous = EvidenceStrength::Insufficient;
            for score in 0..=100u8 {
                let s = determine_strength(score, &f);
                assert!(s >= previous, "score {} lowered strength for meta={} rct={}", score, meta, rct);
                previous = s;
            }
        }
    }

    #[test]
    fn test_rct_reasoning_excludes_meta_note() {
        let docs = [
            doc(StudyType::MetaAnalysis, Some(10), YEAR - 20, false),
            doc(StudyType::RandomizedControlledTrial, Some(10), YEAR - 20, false),
        ];
        let reasoning = grade_evidence_as_of(&docs, YEAR).reasoning;
        assert_eq!(reasoning, "Meta-analysis provides highest level of evidence");

        let rct_only = [doc(StudyType::RandomizedControlledTrial, Some(10), YEAR - 20, false)];
        assert_eq!(
            grade_evidence_as_of(&rct_only, YEAR).reasoning,
            "Randomized controlled trials provide strong evidence"
        );
    }

    #[test]
    fn test_limited_evidence_reasoning() {
        let docs = [doc(StudyType::CohortStudy, Some(50), YEAR - 12, false)];
        assert_eq!(
            grade_evidence_as_of(&docs, YEAR).reasoning,
            "Limited evidence available"
        );
    }

    #[test]
    fn test_score_never_exceeds_100() {
        let docs: Vec<Document> = (0..20)
            .map(|_| doc(StudyType::MetaAnalysis, Some(u32::MAX), YEAR, false))
            .collect();
        assert_eq!(grade_evidence_as_of(&docs, YEAR).score, 100);
    }

    #[test]
    fn test_future_dates_count_as_recent() {
        let docs = [doc(StudyType::Other, None, YEAR + 1, false)];
        let f = analyze_factors(&docs, YEAR);
        assert_eq!(f.recency, -1.0);
        assert_eq!(recency_points(&f), 20);
    }
}
