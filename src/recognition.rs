//! Face-recognition results as delivered by `POST /attendance/mark_face`.
//!
//! Tier thresholds belong to the backend. This module only decodes the tier
//! tag into typed variants; it never recomputes a match.

use crate::model::StudentId;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---- wire shapes ----

#[derive(Debug, Clone, Deserialize)]
pub struct MarkFaceResponse {
    #[serde(default)]
    pub high_confidence_matches: Vec<WireHighConfidence>,
    #[serde(default)]
    pub uncertain_matches: Vec<WireUncertain>,
    #[serde(default)]
    pub unknown_faces: Vec<WireUnknownFace>,
    #[serde(default)]
    pub summary: Option<WireSummary>,
    #[serde(default)]
    pub rate_limit: Option<RateLimitSnapshot>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireHighConfidence {
    pub student_id: StudentId,
    pub confidence: f64,
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUncertain {
    pub student_id: StudentId,
    #[serde(default)]
    pub student_name: String,
    #[serde(default)]
    pub roll_no: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub distance: Option<f64>,
    pub tier: u8,
    #[serde(default)]
    pub photo_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireUnknownFace {
    #[serde(default)]
    pub distance: Option<f64>,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireSummary {
    #[serde(default)]
    pub present: u32,
    #[serde(default)]
    pub absent: u32,
    #[serde(default)]
    pub unknown_faces: u32,
    #[serde(default)]
    pub total_students: u32,
}

// ---- domain ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReviewTier {
    /// Roughly 40-55% confidence; high-priority review.
    Tier2,
    /// Roughly 30-40% confidence; optional edge cases.
    Tier3,
}

impl ReviewTier {
    pub fn from_wire(tier: u8) -> Option<Self> {
        match tier {
            2 => Some(ReviewTier::Tier2),
            3 => Some(ReviewTier::Tier3),
            _ => None,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            ReviewTier::Tier2 => 2,
            ReviewTier::Tier3 => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighConfidenceMatch {
    pub student_id: StudentId,
    pub confidence: f64,
    /// `None` when the backend did not report one.
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UncertainMatch {
    pub student_id: StudentId,
    pub student_name: String,
    pub roll_number: Option<String>,
    pub confidence: f64,
    pub distance: Option<f64>,
    pub tier: ReviewTier,
    pub photo_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownFace {
    pub distance: Option<f64>,
    pub confidence: f64,
}

/// One recognized face, tagged by the tier the backend assigned it.
#[derive(Debug, Clone, PartialEq)]
pub enum FaceMatch<'a> {
    HighConfidence(&'a HighConfidenceMatch),
    Tier2(&'a UncertainMatch),
    Tier3(&'a UncertainMatch),
    Unknown(&'a UnknownFace),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionSummary {
    pub present: u32,
    pub absent: u32,
    pub unknown_faces: u32,
    pub total_students: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    pub remaining: u32,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuotaLevel {
    Normal,
    Low,
    Critical,
}

/// Low-water marks for the passive quota banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaMarks {
    pub low_water: u32,
    pub critical_water: u32,
}

impl Default for QuotaMarks {
    fn default() -> Self {
        Self {
            low_water: 20,
            critical_water: 10,
        }
    }
}

impl RateLimitSnapshot {
    pub fn level(&self, marks: &QuotaMarks) -> QuotaLevel {
        if self.remaining < marks.critical_water {
            QuotaLevel::Critical
        } else if self.remaining < marks.low_water {
            QuotaLevel::Low
        } else {
            QuotaLevel::Normal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionResult {
    pub high_confidence: Vec<HighConfidenceMatch>,
    pub uncertain: Vec<UncertainMatch>,
    pub unknown_faces: Vec<UnknownFace>,
    pub summary: RecognitionSummary,
    pub rate_limit: Option<RateLimitSnapshot>,
}

impl RecognitionResult {
    pub fn from_wire(wire: MarkFaceResponse) -> Self {
        let high_confidence = wire
            .high_confidence_matches
            .into_iter()
            .map(|m| HighConfidenceMatch {
                student_id: m.student_id,
                confidence: m.confidence,
                distance: m.distance,
            })
            .collect();

        let mut uncertain = Vec::with_capacity(wire.uncertain_matches.len());
        for m in wire.uncertain_matches {
            let Some(tier) = ReviewTier::from_wire(m.tier) else {
                warn!(
                    student_id = %m.student_id,
                    tier = m.tier,
                    "dropping uncertain match with unexpected tier"
                );
                continue;
            };
            uncertain.push(UncertainMatch {
                student_id: m.student_id,
                student_name: m.student_name,
                roll_number: m.roll_no,
                confidence: m.confidence,
                distance: m.distance,
                tier,
                photo_path: m.photo_path,
            });
        }

        let unknown_faces: Vec<UnknownFace> = wire
            .unknown_faces
            .into_iter()
            .map(|f| UnknownFace {
                distance: f.distance,
                confidence: f.confidence,
            })
            .collect();

        let summary = wire
            .summary
            .map(|s| RecognitionSummary {
                present: s.present,
                absent: s.absent,
                unknown_faces: s.unknown_faces,
                total_students: s.total_students,
            })
            .unwrap_or(RecognitionSummary {
                unknown_faces: unknown_faces.len() as u32,
                ..RecognitionSummary::default()
            });

        Self {
            high_confidence,
            uncertain,
            unknown_faces,
            summary,
            rate_limit: wire.rate_limit,
        }
    }

    /// Every face in backend order, tier 1 first, then review tiers, then unknowns.
    pub fn faces(&self) -> impl Iterator<Item = FaceMatch<'_>> {
        let high = self.high_confidence.iter().map(FaceMatch::HighConfidence);
        let review = self.uncertain.iter().map(|m| match m.tier {
            ReviewTier::Tier2 => FaceMatch::Tier2(m),
            ReviewTier::Tier3 => FaceMatch::Tier3(m),
        });
        let unknown = self.unknown_faces.iter().map(FaceMatch::Unknown);
        high.chain(review).chain(unknown)
    }

    pub fn needs_review(&self) -> bool {
        !self.uncertain.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode(v: serde_json::Value) -> RecognitionResult {
        let wire: MarkFaceResponse = serde_json::from_value(v).expect("decode wire");
        RecognitionResult::from_wire(wire)
    }

    #[test]
    fn decodes_all_four_tiers() {
        let result = decode(json!({
            "high_confidence_matches": [{ "student_id": 1, "confidence": 92.0, "distance": 0.31 }],
            "uncertain_matches": [
                { "student_id": 2, "student_name": "Bea", "roll_no": "R2", "confidence": 45.0,
                  "distance": 0.52, "tier": 2, "photo_path": "uploads/2.jpg" },
                { "student_id": 3, "student_name": "Cy", "confidence": 33.0, "distance": 0.58, "tier": 3 }
            ],
            "unknown_faces": [{ "distance": 0.81, "confidence": 12.5 }],
            "summary": { "present": 1, "absent": 2, "unknown_faces": 1, "total_students": 3 },
            "rate_limit": { "remaining": 42, "limit": 80 }
        }));

        let tags: Vec<&str> = result
            .faces()
            .map(|f| match f {
                FaceMatch::HighConfidence(_) => "t1",
                FaceMatch::Tier2(_) => "t2",
                FaceMatch::Tier3(_) => "t3",
                FaceMatch::Unknown(_) => "t4",
            })
            .collect();
        assert_eq!(tags, vec!["t1", "t2", "t3", "t4"]);
        assert_eq!(result.summary.total_students, 3);
        assert_eq!(result.rate_limit, Some(RateLimitSnapshot { remaining: 42, limit: 80 }));
        assert!(result.needs_review());
    }

    #[test]
    fn unexpected_review_tier_is_dropped_not_reinterpreted() {
        let result = decode(json!({
            "uncertain_matches": [
                { "student_id": 7, "confidence": 20.0, "distance": 0.9, "tier": 4 },
                { "student_id": 8, "confidence": 50.0, "distance": 0.5, "tier": 2 }
            ]
        }));
        assert_eq!(result.uncertain.len(), 1);
        assert_eq!(result.uncertain[0].student_id, StudentId(8));
    }

    #[test]
    fn missing_distance_stays_absent() {
        let result = decode(json!({
            "high_confidence_matches": [{ "student_id": 1, "confidence": 92.0 }],
            "uncertain_matches": [{ "student_id": 2, "confidence": 45.0, "tier": 2 }],
            "unknown_faces": [{ "confidence": 12.5 }]
        }));
        assert_eq!(result.high_confidence[0].distance, None);
        assert_eq!(result.uncertain[0].distance, None);
        assert_eq!(result.unknown_faces[0].distance, None);
    }

    #[test]
    fn missing_sections_decode_as_empty() {
        let result = decode(json!({}));
        assert!(result.high_confidence.is_empty());
        assert!(!result.needs_review());
        assert_eq!(result.rate_limit, None);
    }

    #[test]
    fn quota_levels_follow_low_water_marks() {
        let marks = QuotaMarks::default();
        let at = |remaining| RateLimitSnapshot { remaining, limit: 80 }.level(&marks);
        assert_eq!(at(20), QuotaLevel::Normal);
        assert_eq!(at(19), QuotaLevel::Low);
        assert_eq!(at(10), QuotaLevel::Low);
        assert_eq!(at(9), QuotaLevel::Critical);
        assert_eq!(at(0), QuotaLevel::Critical);
    }
}
