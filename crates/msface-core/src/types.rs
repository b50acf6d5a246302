use serde::{Deserialize, Serialize};

/// Pixel rectangle of a detected face, as reported by the detect endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceRectangle {
    pub top: u32,
    pub left: u32,
    pub width: u32,
    pub height: u32,
}

/// A face found by the detect endpoint.
///
/// The face id is only valid on the service side for the configured
/// time-to-live; it is never persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedFace {
    pub face_id: String,
    #[serde(default)]
    pub face_rectangle: Option<FaceRectangle>,
}

/// One candidate identity for a detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub person_id: String,
    /// Service confidence in [0, 1].
    pub confidence: f64,
}

/// Identify response entry: one per submitted face id, candidates in server order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyResult {
    #[serde(default)]
    pub face_id: String,
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl IdentifyResult {
    /// Highest-ranked candidate, if the service returned any.
    pub fn top_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }
}

/// A person enrolled in a person group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub person_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub user_data: Option<String>,
}

/// A face joined against the identity store, ready to be reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFace {
    /// Person name, or an empty string when the person id is unknown.
    pub name: String,
    /// Confidence in percent [0, 100].
    pub confidence: f64,
}

impl ResolvedFace {
    /// Build from a candidate, rescaling the service confidence to percent.
    pub fn from_candidate(name: String, candidate: &Candidate) -> Self {
        Self {
            name,
            confidence: candidate.confidence * 100.0,
        }
    }
}

/// Result of processing one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceList {
    pub faces: Vec<ResolvedFace>,
    /// Number of faces seen, including faces without any candidate.
    pub total_faces: usize,
}

impl FaceList {
    pub fn empty() -> Self {
        Self::default()
    }
}
