//! Euclidean distance transforms over binary masks.
//!
//! Both the morphological cleaner and the feather engine are built on one
//! primitive: the exact squared Euclidean distance from every pixel to the
//! nearest pixel of a chosen class, computed by
//! [`imageproc::distance_transform::euclidean_squared_distance_transform`].
//!
//! [`signed_distance`] combines two such unsigned passes, one towards the
//! background and one towards the foreground, into a single field that is
//! positive inside the mask and negative outside.

use image::{GrayImage, Luma};

use crate::types::BinaryMask;

/// Squared Euclidean distance from every pixel to the nearest pixel whose
/// mask value equals `target`, row-major.
///
/// Pixels of the target class have distance `0.0`. Only pixels inside the
/// image are considered; nothing beyond the border counts as either class.
///
/// Returns `None` when no pixel of the target class exists, since the
/// distance is then undefined everywhere.
#[must_use = "returns the squared distance field"]
pub fn squared_distance_to(mask: &BinaryMask, target: bool) -> Option<Vec<f64>> {
    if !mask.pixels().contains(&target) {
        return None;
    }

    let dimensions = mask.dimensions();
    let features = GrayImage::from_fn(dimensions.width, dimensions.height, |x, y| {
        Luma([if mask.get(x, y) == target { 255 } else { 0 }])
    });

    let field = imageproc::distance_transform::euclidean_squared_distance_transform(&features);
    Some(field.into_raw())
}

/// Euclidean distance from every pixel to the nearest pixel of class
/// `target`, row-major. `None` when the class is absent.
#[must_use = "returns the distance field"]
pub fn distance_to(mask: &BinaryMask, target: bool) -> Option<Vec<f64>> {
    squared_distance_to(mask, target).map(|field| field.into_iter().map(f64::sqrt).collect())
}

/// Signed distance to the mask boundary, row-major.
///
/// Foreground pixels carry their distance to the nearest background pixel
/// (always `>= 1`); background pixels carry the negated distance to the
/// nearest foreground pixel (always `<= -1`). When the opposite class is
/// absent from the image the distance is `+inf` or `-inf` respectively.
#[must_use = "returns the signed distance field"]
pub fn signed_distance(mask: &BinaryMask) -> Vec<f64> {
    let inside = distance_to(mask, false);
    let outside = distance_to(mask, true);

    mask.pixels()
        .iter()
        .enumerate()
        .map(|(i, &foreground)| {
            if foreground {
                inside.as_ref().map_or(f64::INFINITY, |d| d[i])
            } else {
                outside.as_ref().map_or(f64::NEG_INFINITY, |d| -d[i])
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    #[test]
    fn absent_class_has_no_distance() {
        let mask = BinaryMask::filled(Dimensions::new(4, 4), true);
        assert!(squared_distance_to(&mask, false).is_none());
        assert!(squared_distance_to(&mask, true).is_some());
    }

    #[test]
    fn single_seed_distances_are_euclidean() {
        let mask = BinaryMask::from_fn(5, 5, |x, y| x == 0 && y == 0);
        let field = squared_distance_to(&mask, true).unwrap();
        assert!((field[0] - 0.0).abs() < f64::EPSILON);
        // (3, 4) is 5 pixels from the origin.
        assert!((field[4 * 5 + 3] - 25.0).abs() < 1e-9);
        // (1, 1) is sqrt(2) away.
        let d = distance_to(&mask, true).unwrap();
        assert!((d[6] - 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn signed_distance_sign_follows_class() {
        // Left half foreground, right half background.
        let mask = BinaryMask::from_fn(6, 1, |x, _| x < 3);
        let sd = signed_distance(&mask);
        assert_eq!(sd, vec![3.0, 2.0, 1.0, -1.0, -2.0, -3.0]);
    }

    #[test]
    fn signed_distance_without_boundary_is_infinite() {
        let full = BinaryMask::filled(Dimensions::new(3, 3), true);
        assert!(signed_distance(&full).iter().all(|&d| d == f64::INFINITY));

        let empty = BinaryMask::filled(Dimensions::new(3, 3), false);
        assert!(signed_distance(&empty).iter().all(|&d| d == f64::NEG_INFINITY));
    }
}
