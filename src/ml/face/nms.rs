use crate::ml::types::{BoundingBox, Detection};

pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.4;

/// Greedy non-maximum suppression.
///
/// Returns indices into `detections` in the order they were kept, highest
/// score first. Equal scores keep their input order.
pub fn select_detections(detections: &[Detection], overlap_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&a, &b| detections[b].score.total_cmp(&detections[a].score));

    let mut suppressed = vec![false; detections.len()];
    let mut keep = Vec::new();
    for (rank, &a) in order.iter().enumerate() {
        if suppressed[a] {
            continue;
        }
        keep.push(a);

        for &b in &order[rank + 1..] {
            if suppressed[b] {
                continue;
            }
            if overlap_ratio(&detections[a].bbox, &detections[b].bbox) > overlap_threshold {
                suppressed[b] = true;
            }
        }
    }
    keep
}

/// Intersection over union with inclusive pixel edges (`x2 - x1 + 1` wide).
pub fn overlap_ratio(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let intersection_width = (a.x2.min(b.x2) - a.x1.max(b.x1) + 1.0).max(0.0);
    let intersection_height = (a.y2.min(b.y2) - a.y1.max(b.y1) + 1.0).max(0.0);
    let intersection = intersection_width * intersection_height;

    let area_a = (a.x2 - a.x1 + 1.0) * (a.y2 - a.y1 + 1.0);
    let area_b = (b.x2 - b.x1 + 1.0) * (b.y2 - b.y1 + 1.0);
    let union = area_a + area_b - intersection;
    if union <= 0.0 {
        return 0.0;
    }
    intersection / union
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_OVERLAP_THRESHOLD, overlap_ratio, select_detections};
    use crate::ml::types::{BoundingBox, Detection, Point2D};

    fn detection(bbox: BoundingBox, score: f32) -> Detection {
        Detection {
            bbox,
            score,
            keypoints: [Point2D::default(); 5].into(),
        }
    }

    #[test]
    fn empty_input_keeps_nothing() {
        assert!(select_detections(&[], DEFAULT_OVERLAP_THRESHOLD).is_empty());
    }

    #[test]
    fn disjoint_boxes_are_all_kept_by_descending_score() {
        let detections = vec![
            detection(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.6),
            detection(BoundingBox::new(50.0, 50.0, 60.0, 60.0), 0.9),
            detection(BoundingBox::new(100.0, 0.0, 110.0, 10.0), 0.7),
        ];

        assert_eq!(
            select_detections(&detections, DEFAULT_OVERLAP_THRESHOLD),
            vec![1, 2, 0]
        );
    }

    #[test]
    fn identical_boxes_keep_only_the_higher_score() {
        let bbox = BoundingBox::new(10.0, 10.0, 40.0, 40.0);
        let detections = vec![detection(bbox, 0.55), detection(bbox, 0.95)];

        assert_eq!(
            select_detections(&detections, DEFAULT_OVERLAP_THRESHOLD),
            vec![1]
        );
    }

    #[test]
    fn equal_scores_break_ties_by_input_order() {
        let bbox = BoundingBox::new(0.0, 0.0, 20.0, 20.0);
        let detections = vec![detection(bbox, 0.8), detection(bbox, 0.8)];

        assert_eq!(
            select_detections(&detections, DEFAULT_OVERLAP_THRESHOLD),
            vec![0]
        );
    }

    #[test]
    fn suppressed_boxes_do_not_suppress_others() {
        // b overlaps a and c, but a and c barely touch.
        let detections = vec![
            detection(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.9),
            detection(BoundingBox::new(3.0, 0.0, 13.0, 10.0), 0.8),
            detection(BoundingBox::new(7.0, 0.0, 17.0, 10.0), 0.7),
        ];

        assert_eq!(
            select_detections(&detections, DEFAULT_OVERLAP_THRESHOLD),
            vec![0, 2]
        );
    }

    #[test]
    fn overlap_uses_inclusive_pixel_edges() {
        let a = BoundingBox::new(0.0, 0.0, 9.0, 9.0);
        let b = BoundingBox::new(5.0, 0.0, 14.0, 9.0);

        // 5x10 intersection over 100 + 100 - 50.
        let ratio = overlap_ratio(&a, &b);
        assert!((ratio - 50.0 / 150.0).abs() < 1e-6);

        // Touching edges still share one pixel column.
        let c = BoundingBox::new(9.0, 0.0, 18.0, 9.0);
        assert!(overlap_ratio(&a, &c) > 0.0);
    }
}
