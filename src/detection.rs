//! Detector boundary types: raw detections in, identified detections out.

use serde::{Deserialize, Serialize};

use crate::track::TrackId;
use crate::BoundingBox;

/// One object reported by the detector for a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label, e.g. `"person"`.
    #[serde(rename = "class")]
    pub class_label: String,

    /// Detector confidence in `[0, 1]`.
    pub score: f64,

    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, score: f64, bbox: BoundingBox) -> Self {
        Self {
            class_label: class_label.into(),
            score,
            bbox,
        }
    }
}

/// Selects the detections that are fed to the tracker.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionFilter {
    pub target_class: String,
    /// Exclusive lower bound on the detection score.
    pub min_confidence: f64,
}

impl DetectionFilter {
    pub fn new(target_class: impl Into<String>, min_confidence: f64) -> Self {
        Self {
            target_class: target_class.into(),
            min_confidence,
        }
    }

    /// Whether `detection` has the target class and a score above the minimum.
    #[inline]
    pub fn accepts(&self, detection: &Detection) -> bool {
        detection.class_label == self.target_class && detection.score > self.min_confidence
    }

    /// Keep accepted detections, preserving detector order.
    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections.into_iter().filter(|d| self.accepts(d)).collect()
    }
}

/// A detection paired with its track identity.
///
/// Serialises with the field names downstream alert consumers expect:
/// `{"person_id", "bbox": {"x", "y", "w", "h"}, "confidence", "class"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedDetection {
    pub person_id: TrackId,
    pub bbox: BoundingBox,
    pub confidence: f64,
    #[serde(rename = "class")]
    pub class_label: String,
}

impl TrackedDetection {
    pub fn new(detection: Detection, person_id: TrackId) -> Self {
        Self {
            person_id,
            bbox: detection.bbox,
            confidence: detection.score,
            class_label: detection.class_label,
        }
    }

    /// Zip detections with the identities returned for them.
    ///
    /// `ids` must be the output of an assignment over exactly these detections.
    pub fn pair(detections: Vec<Detection>, ids: &[TrackId]) -> Vec<Self> {
        debug_assert_eq!(detections.len(), ids.len());
        detections
            .into_iter()
            .zip(ids.iter())
            .map(|(detection, &id)| Self::new(detection, id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &str, score: f64) -> Detection {
        Detection::new(label, score, BoundingBox::new(1.0, 2.0, 3.0, 4.0))
    }

    // ===== Filter =====

    #[test]
    fn test_filter_class_and_score() {
        let filter = DetectionFilter::new("person", 0.1);
        assert!(filter.accepts(&det("person", 0.5)));
        assert!(!filter.accepts(&det("car", 0.9)));
        assert!(!filter.accepts(&det("person", 0.05)));
    }

    #[test]
    fn test_filter_min_confidence_is_exclusive() {
        let filter = DetectionFilter::new("person", 0.1);
        assert!(!filter.accepts(&det("person", 0.1)));
    }

    #[test]
    fn test_filter_apply_keeps_order() {
        let filter = DetectionFilter::new("person", 0.1);
        let kept = filter.apply(vec![
            det("person", 0.9),
            det("dog", 0.9),
            det("person", 0.05),
            det("person", 0.4),
        ]);
        let scores: Vec<f64> = kept.iter().map(|d| d.score).collect();
        assert_eq!(scores, vec![0.9, 0.4]);
    }

    // ===== Output Records =====

    #[test]
    fn test_pair() {
        let records = TrackedDetection::pair(vec![det("person", 0.9), det("person", 0.4)], &[3, 1]);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].person_id, 3);
        assert_eq!(records[1].person_id, 1);
        assert_eq!(records[1].confidence, 0.4);
    }

    #[test]
    fn test_tracked_detection_json() {
        let record = TrackedDetection::new(det("person", 0.5), 1);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "person_id": 1,
                "bbox": {"x": 1.0, "y": 2.0, "w": 3.0, "h": 4.0},
                "confidence": 0.5,
                "class": "person"
            })
        );
    }

    #[test]
    fn test_detection_json() {
        let parsed: Detection = serde_json::from_str(
            r#"{"class": "person", "score": 0.7, "bbox": {"x": 0, "y": 0, "w": 10, "h": 20}}"#,
        )
        .unwrap();
        assert_eq!(parsed.class_label, "person");
        assert_eq!(parsed.bbox, BoundingBox::new(0.0, 0.0, 10.0, 20.0));
    }
}
