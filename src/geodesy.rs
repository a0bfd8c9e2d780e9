//! Distance oracle on the WGS-84 ellipsoid
//!
//! Karney's geodesic solution from the `geo` crate: symmetric, zero for identical
//! points and accurate to well below a metre at anchoring scales.

use crate::types::GeoPoint;
use geo::{GeodesicDistance, Point};

/// Geodesic distance between two points in metres
pub fn distance(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let pa = Point::new(a.longitude, a.latitude);
    let pb = Point::new(b.longitude, b.latitude);
    pa.geodesic_distance(&pb)
}

/// Geodesic distance rounded to the nearest whole metre
pub fn rounded_distance(a: &GeoPoint, b: &GeoPoint) -> u32 {
    let d = distance(a, b).round();
    if d.is_finite() && d >= 0.0 {
        d.min(u32::MAX as f64) as u32
    } else {
        0
    }
}
