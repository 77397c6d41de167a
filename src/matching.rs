//! Detection-to-track matching algorithms.

use nalgebra::DMatrix;

use crate::BoundingBox;

/// Build the IoU score matrix (n_detections x n_tracks).
pub fn iou_matrix(detections: &[BoundingBox], tracks: &[BoundingBox]) -> DMatrix<f64> {
    DMatrix::from_fn(detections.len(), tracks.len(), |i, j| detections[i].iou(&tracks[j]))
}

/// Match detections to tracks using greedy highest-score-first matching.
///
/// Candidate pairs are enumerated detection-major, sorted by descending score
/// with a stable sort (exact ties keep enumeration order), then walked until
/// the first pair scoring below `threshold`. A pair is committed only if
/// neither its detection nor its track has been consumed already.
///
/// # Arguments
/// * `score_matrix` - Score matrix (n_detections x n_tracks), higher is better
/// * `threshold` - Minimum score for a valid match
///
/// # Returns
/// Tuple of (matched_det_indices, matched_track_indices) in commit order.
pub fn match_detections_and_tracks(
    score_matrix: &DMatrix<f64>,
    threshold: f64,
) -> (Vec<usize>, Vec<usize>) {
    let n_detections = score_matrix.nrows();
    let n_tracks = score_matrix.ncols();

    if n_detections == 0 || n_tracks == 0 {
        return (Vec::new(), Vec::new());
    }

    // Non-finite scores never match
    let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(n_detections * n_tracks);
    for i in 0..n_detections {
        for j in 0..n_tracks {
            let score = score_matrix[(i, j)];
            if score.is_finite() {
                pairs.push((score, i, j));
            }
        }
    }

    pairs.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut used_dets = vec![false; n_detections];
    let mut used_tracks = vec![false; n_tracks];

    let mut matched_dets = Vec::new();
    let mut matched_tracks = Vec::new();

    for (score, det_idx, track_idx) in pairs {
        if score < threshold {
            break;
        }
        if used_dets[det_idx] || used_tracks[track_idx] {
            continue;
        }

        matched_dets.push(det_idx);
        matched_tracks.push(track_idx);
        used_dets[det_idx] = true;
        used_tracks[track_idx] = true;
    }

    (matched_dets, matched_tracks)
}

/// Get unmatched indices from a match result.
pub fn get_unmatched(total: usize, matched: &[usize]) -> Vec<usize> {
    let mut is_matched = vec![false; total];
    for &idx in matched {
        is_matched[idx] = true;
    }
    (0..total).filter(|&i| !is_matched[i]).collect()
}
