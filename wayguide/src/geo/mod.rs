//! Geometry kernel.
//!
//! Pure functions over WGS84 coordinates used by both evaluators:
//! great-circle and planar distances, bearings, angle normalization,
//! point-to-segment projection and destination points.
//!
//! All functions use the fixed [`EARTH_RADIUS_M`] so results are
//! reproducible bit-for-bit for identical inputs.
//!
//! # Angle conventions
//!
//! - Bearings and orientations are degrees clockwise from north in `[0, 360)`.
//! - Signed differences (turn angles) are degrees in `(-180, 180]`, positive
//!   meaning "turn right".

mod location;

pub use location::{Location, LocationStatus};

/// Earth radius used by every distance calculation (meters).
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Great-circle distance between two coordinates (haversine, meters).
pub fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Equirectangular distance approximation (meters).
///
/// Cheaper than [`distance`] and accurate to well under a meter for the
/// short spans evaluated on every fix.
pub fn fast_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let mean_lat = ((lat1 + lat2) / 2.0).to_radians();
    let x = (lng2 - lng1).to_radians() * mean_lat.cos();
    let y = (lat2 - lat1).to_radians();
    EARTH_RADIUS_M * (x * x + y * y).sqrt()
}

/// Initial bearing from the first coordinate to the second, in `[0, 360)`.
pub fn bearing(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dlambda = (lng2 - lng1).to_radians();

    let y = dlambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlambda.cos();
    normalize_heading(y.atan2(x).to_degrees())
}

/// Final bearing on arrival at the second coordinate, in `[0, 360)`.
pub fn final_bearing(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    normalize_heading(bearing(lat2, lng2, lat1, lng1) + 180.0)
}

/// Normalize an angle to the signed range `(-180, 180]`.
///
/// Used for turn angles: `normalize_degree(target - current)` is the
/// shortest signed rotation from `current` to `target`.
pub fn normalize_degree(degree: f64) -> f64 {
    let d = degree % 360.0;
    if d > 180.0 {
        d - 360.0
    } else if d <= -180.0 {
        d + 360.0
    } else {
        d
    }
}

/// Normalize an angle to the compass range `[0, 360)`.
pub fn normalize_heading(degree: f64) -> f64 {
    let d = ((degree % 360.0) + 360.0) % 360.0;
    // -1e-14 % 360 + 360 rounds to exactly 360.0
    if d >= 360.0 {
        0.0
    } else {
        d
    }
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
pub fn angle_difference(to: f64, from: f64) -> f64 {
    normalize_degree(to - from)
}

/// Nearest point on the segment `a`-`b` to point `p`.
///
/// Projects in a local planar frame anchored at `a`, which is exact enough
/// for link-length segments. Returns `(lat, lng, t)` where `t` in `[0, 1]` is
/// the fraction along the segment. A degenerate segment returns `a`.
pub fn nearest_point_on_segment(
    p: (f64, f64),
    a: (f64, f64),
    b: (f64, f64),
) -> (f64, f64, f64) {
    let cos_lat = a.0.to_radians().cos();
    let to_xy = |lat: f64, lng: f64| {
        (
            (lng - a.1).to_radians() * cos_lat * EARTH_RADIUS_M,
            (lat - a.0).to_radians() * EARTH_RADIUS_M,
        )
    };

    let (bx, by) = to_xy(b.0, b.1);
    let (px, py) = to_xy(p.0, p.1);

    let len2 = bx * bx + by * by;
    if len2 <= f64::EPSILON {
        return (a.0, a.1, 0.0);
    }

    let t = ((px * bx + py * by) / len2).clamp(0.0, 1.0);
    (a.0 + t * (b.0 - a.0), a.1 + t * (b.1 - a.1), t)
}

/// Destination reached from an origin after `distance` meters on `bearing`.
pub fn destination(lat: f64, lng: f64, distance: f64, bearing: f64) -> (f64, f64) {
    let delta = distance / EARTH_RADIUS_M;
    let theta = bearing.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lng.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    (phi2.to_degrees(), normalize_degree(lambda2.to_degrees()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_distance_one_degree_latitude() {
        // One degree of arc on the fixed radius
        let expected = EARTH_RADIUS_M * 1.0_f64.to_radians();
        assert!((distance(0.0, 0.0, 1.0, 0.0) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_distance_zero_for_same_point() {
        assert_eq!(distance(35.6, 139.7, 35.6, 139.7), 0.0);
        assert_eq!(fast_distance(35.6, 139.7, 35.6, 139.7), 0.0);
    }

    #[test]
    fn test_fast_distance_close_to_haversine() {
        let exact = distance(35.6812, 139.7671, 35.6830, 139.7690);
        let fast = fast_distance(35.6812, 139.7671, 35.6830, 139.7690);
        assert!((exact - fast).abs() < 0.05, "exact={exact}, fast={fast}");
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        assert!((bearing(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < EPS);
        assert!((bearing(0.0, 0.0, 0.0, 1.0) - 90.0).abs() < EPS);
        assert!((bearing(0.0, 0.0, -1.0, 0.0) - 180.0).abs() < EPS);
        assert!((bearing(0.0, 0.0, 0.0, -1.0) - 270.0).abs() < EPS);
    }

    #[test]
    fn test_final_bearing_on_meridian() {
        assert!((final_bearing(0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_degree() {
        assert!((normalize_degree(0.0) - 0.0).abs() < EPS);
        assert!((normalize_degree(180.0) - 180.0).abs() < EPS);
        assert!((normalize_degree(-180.0) - 180.0).abs() < EPS);
        assert!((normalize_degree(190.0) - (-170.0)).abs() < EPS);
        assert!((normalize_degree(-190.0) - 170.0).abs() < EPS);
        assert!((normalize_degree(720.0 + 45.0) - 45.0).abs() < EPS);
    }

    #[test]
    fn test_normalize_heading() {
        assert!((normalize_heading(360.0) - 0.0).abs() < EPS);
        assert!((normalize_heading(-90.0) - 270.0).abs() < EPS);
        assert!((normalize_heading(450.0) - 90.0).abs() < EPS);
        assert!((normalize_heading(-450.0) - 270.0).abs() < EPS);
        assert!(normalize_heading(-1e-15) < 360.0);
    }

    #[test]
    fn test_angle_difference_wraparound() {
        assert!((angle_difference(10.0, 350.0) - 20.0).abs() < EPS);
        assert!((angle_difference(350.0, 10.0) - (-20.0)).abs() < EPS);
        assert!((angle_difference(90.0, 0.0) - 90.0).abs() < EPS);
    }

    #[test]
    fn test_nearest_point_inside_segment() {
        let a = (0.0, 0.0);
        let b = (0.0, 0.001);
        let (lat, lng, t) = nearest_point_on_segment((0.0001, 0.0005), a, b);
        assert!(lat.abs() < EPS);
        assert!((lng - 0.0005).abs() < 1e-12);
        assert!((t - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_point_clamped_to_endpoints() {
        let a = (0.0, 0.0);
        let b = (0.0, 0.001);
        let (_, lng, t) = nearest_point_on_segment((0.0, 0.002), a, b);
        assert_eq!(t, 1.0);
        assert!((lng - 0.001).abs() < 1e-12);

        let (_, lng, t) = nearest_point_on_segment((0.0, -0.002), a, b);
        assert_eq!(t, 0.0);
        assert_eq!(lng, 0.0);
    }

    #[test]
    fn test_nearest_point_degenerate_segment() {
        let (lat, lng, t) = nearest_point_on_segment((1.0, 1.0), (0.5, 0.5), (0.5, 0.5));
        assert_eq!((lat, lng, t), (0.5, 0.5, 0.0));
    }

    #[test]
    fn test_destination_north() {
        let (lat, lng) = destination(0.0, 0.0, 1000.0, 0.0);
        assert!(lng.abs() < 1e-12);
        assert!((distance(0.0, 0.0, lat, lng) - 1000.0).abs() < 1e-6);
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_fast_distance_agrees_under_one_km(
                lat in -80.0..80.0_f64,
                lng in -179.0..179.0_f64,
                dist in 0.0..1000.0_f64,
                brg in 0.0..360.0_f64,
            ) {
                let (lat2, lng2) = destination(lat, lng, dist, brg);
                let exact = distance(lat, lng, lat2, lng2);
                let fast = fast_distance(lat, lng, lat2, lng2);
                prop_assert!(
                    (exact - fast).abs() <= 1e-3 * exact + 1e-6,
                    "exact={} fast={}", exact, fast
                );
            }

            #[test]
            fn test_destination_inverts_distance_and_bearing(
                lat in -80.0..80.0_f64,
                lng in -179.0..179.0_f64,
                dist in 1.0..1000.0_f64,
                brg in 0.0..360.0_f64,
            ) {
                let (lat2, lng2) = destination(lat, lng, dist, brg);
                prop_assert!((distance(lat, lng, lat2, lng2) - dist).abs() < 1e-6);
                let back = bearing(lat, lng, lat2, lng2);
                prop_assert!(angle_difference(back, brg).abs() < 1e-4);
            }

            #[test]
            fn test_normalized_ranges(deg in -10_000.0..10_000.0_f64) {
                let h = normalize_heading(deg);
                prop_assert!((0.0..360.0).contains(&h));
                let d = normalize_degree(deg);
                prop_assert!(d > -180.0 && d <= 180.0);
            }
        }
    }
}
