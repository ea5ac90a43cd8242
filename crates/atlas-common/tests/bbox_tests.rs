//! Tests for BoundingBox operations.

use atlas_common::bbox::{BboxParseError, BoundingBox};

// ============================================================================
// Parsing tests
// ============================================================================

#[test]
fn test_parse_region_with_spaces() {
    let bbox: BoundingBox = " 8.5, 49.8 ,9.2,50.3".parse().unwrap();
    assert!((bbox.min_x - 8.5).abs() < 1e-12);
    assert!((bbox.max_y - 50.3).abs() < 1e-12);
}

#[test]
fn test_parse_region_wrong_count() {
    let result = BoundingBox::from_region_string("1,2,3");
    assert!(matches!(result, Err(BboxParseError::InvalidFormat(_))));
}

#[test]
fn test_parse_region_bad_number() {
    let result = BoundingBox::from_region_string("1,2,east,4");
    assert!(matches!(result, Err(BboxParseError::InvalidNumber(ref s)) if s == "east"));
}

#[test]
fn test_parse_region_degenerate() {
    let result = BoundingBox::from_region_string("10,50,10,51");
    assert!(matches!(result, Err(BboxParseError::Degenerate(_))));
}

// ============================================================================
// Well-formedness tests
// ============================================================================

#[test]
fn test_well_formed() {
    assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_well_formed());
    assert!(!BoundingBox::new(1.0, 0.0, 1.0, 1.0).is_well_formed());
    assert!(!BoundingBox::new(0.0, 2.0, 1.0, 1.0).is_well_formed());
    assert!(!BoundingBox::new(f64::NAN, 0.0, 1.0, 1.0).is_well_formed());
}

#[test]
fn test_valid_wgs84() {
    assert!(BoundingBox::new(-180.0, -90.0, 180.0, 90.0).is_valid_wgs84());
    assert!(!BoundingBox::new(-181.0, 0.0, 0.0, 1.0).is_valid_wgs84());
    assert!(!BoundingBox::new(0.0, 0.0, 1.0, 90.5).is_valid_wgs84());
}

#[test]
fn test_clamp_to_wgs84() {
    let clamped = BoundingBox::new(-200.0, -95.0, 10.0, 100.0).clamp_to_wgs84();
    assert_eq!(clamped, BoundingBox::new(-180.0, -90.0, 10.0, 90.0));
    assert!(clamped.is_valid_wgs84());
}

// ============================================================================
// Set operations
// ============================================================================

#[test]
fn test_union_contains_both() {
    let a = BoundingBox::new(8.0, 49.0, 9.0, 50.0);
    let b = BoundingBox::new(8.5, 48.0, 10.0, 49.5);
    let u = a.union(&b);
    assert_eq!(u, BoundingBox::new(8.0, 48.0, 10.0, 50.0));
}

#[test]
fn test_touching_boxes_do_not_intersect() {
    let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
    let b = BoundingBox::new(1.0, 0.0, 2.0, 1.0);
    assert!(!a.intersects(&b));
    assert!(a.intersection(&b).is_none());
}

#[test]
fn test_contains_point_edges() {
    let bbox = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
    assert!(bbox.contains_point(0.0, 0.0));
    assert!(bbox.contains_point(10.0, 10.0));
    assert!(!bbox.contains_point(10.1, 5.0));
}

#[test]
fn test_center_and_array_roundtrip() {
    let bbox = BoundingBox::from_array([2.0, 4.0, 6.0, 8.0]);
    assert_eq!(bbox.center(), (4.0, 6.0));
    assert_eq!(bbox.to_array(), [2.0, 4.0, 6.0, 8.0]);
}

#[test]
fn test_cache_key_stability() {
    let a = BoundingBox::new(8.1234567, 49.0, 9.0, 50.0);
    let b = BoundingBox::new(8.12345671, 49.0, 9.0, 50.0);
    assert_eq!(a.cache_key(), b.cache_key());
}
