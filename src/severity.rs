use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Priority tier derived from the numeric severity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Low,
    Medium,
    High,
    Critical,
}

impl SeverityTier {
    pub fn for_score(score: u8) -> Self {
        match score {
            0..=39 => Self::Low,
            40..=59 => Self::Medium,
            60..=79 => Self::High,
            _ => Self::Critical,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub score: u8,
    pub tier: SeverityTier,
    pub advice: String,
}

/// Symptom scorer seam. Implementations may be remote; dispatch never
/// blocks on their failure — callers go through [`assess_or_fallback`].
pub trait SeverityScorer: Send + Sync {
    fn assess(&self, symptoms: &str) -> Result<Assessment>;
}

/// Fixed deterministic fallback used whenever the scorer is unavailable or
/// no symptoms were reported.
pub fn fallback_assessment() -> Assessment {
    Assessment {
        score: 50,
        tier: SeverityTier::Medium,
        advice: "Stay calm and remain where you are. Help has been dispatched.".to_string(),
    }
}

/// Runs the scorer best-effort, absorbing any failure behind the fixed
/// fallback so emergency creation always completes.
pub fn assess_or_fallback(scorer: &dyn SeverityScorer, symptoms: Option<&str>) -> Assessment {
    let text = match symptoms {
        Some(s) if !s.trim().is_empty() => s,
        _ => return fallback_assessment(),
    };
    match scorer.assess(text) {
        Ok(assessment) => assessment,
        Err(err) => {
            tracing::warn!("severity scorer unavailable, using fallback: {err:#}");
            fallback_assessment()
        }
    }
}

/// Local deterministic scorer: a fixed keyword table mapped to scores.
/// Stands in for the external AI scorer behind the same trait.
#[derive(Debug, Default)]
pub struct KeywordScorer;

const KEYWORD_SCORES: &[(&str, u8)] = &[
    ("unconscious", 95),
    ("not breathing", 95),
    ("cardiac", 90),
    ("chest pain", 85),
    ("stroke", 85),
    ("seizure", 80),
    ("bleeding", 70),
    ("breath", 70),
    ("fracture", 60),
    ("burn", 60),
    ("fever", 45),
    ("vomiting", 45),
    ("pain", 40),
];

impl SeverityScorer for KeywordScorer {
    fn assess(&self, symptoms: &str) -> Result<Assessment> {
        let lower = symptoms.to_lowercase();
        let score = KEYWORD_SCORES
            .iter()
            .filter(|(kw, _)| lower.contains(kw))
            .map(|&(_, s)| s)
            .max()
            .unwrap_or(35);
        let tier = SeverityTier::for_score(score);
        let advice = match tier {
            SeverityTier::Critical => {
                "Critical symptoms reported. Do not move the patient unless in danger."
            }
            SeverityTier::High => "Serious symptoms reported. Keep the patient still and warm.",
            SeverityTier::Medium => "Monitor the patient and keep them comfortable.",
            SeverityTier::Low => "Keep the patient at rest until the ambulance arrives.",
        };
        Ok(Assessment {
            score,
            tier,
            advice: advice.to_string(),
        })
    }
}

/// Scorer that always fails. Exercises the degradation path in tests.
#[derive(Debug, Default)]
pub struct UnavailableScorer;

impl SeverityScorer for UnavailableScorer {
    fn assess(&self, _symptoms: &str) -> Result<Assessment> {
        Err(anyhow::anyhow!("scorer endpoint unreachable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_fixed() {
        let a = fallback_assessment();
        assert_eq!(a.score, 50);
        assert_eq!(a.tier, SeverityTier::Medium);
    }

    #[test]
    fn test_no_symptoms_uses_fallback() {
        let a = assess_or_fallback(&KeywordScorer, None);
        assert_eq!(a.score, 50);
        let a = assess_or_fallback(&KeywordScorer, Some("   "));
        assert_eq!(a.score, 50);
    }

    #[test]
    fn test_scorer_failure_is_absorbed() {
        let a = assess_or_fallback(&UnavailableScorer, Some("chest pain"));
        assert_eq!(a.score, 50);
        assert_eq!(a.tier, SeverityTier::Medium);
    }

    #[test]
    fn test_keyword_scoring_is_deterministic() {
        let a = KeywordScorer.assess("severe chest pain").unwrap();
        let b = KeywordScorer.assess("severe chest pain").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.score, 85);
        assert_eq!(a.tier, SeverityTier::Critical);
    }

    #[test]
    fn test_highest_keyword_wins() {
        let a = KeywordScorer.assess("fever and not breathing").unwrap();
        assert_eq!(a.score, 95);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(SeverityTier::for_score(39), SeverityTier::Low);
        assert_eq!(SeverityTier::for_score(40), SeverityTier::Medium);
        assert_eq!(SeverityTier::for_score(60), SeverityTier::High);
        assert_eq!(SeverityTier::for_score(80), SeverityTier::Critical);
    }
}
