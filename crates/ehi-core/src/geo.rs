//! Great-circle distance helpers for the occurrence proximity join.

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Radius within which an occurrence counts toward a site.
pub const OCCURRENCE_RADIUS_KM: f64 = 10.0;

/// Haversine distance in kilometres between two `(lon, lat)` points given in
/// degrees.
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
  let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
  let d_phi = (lat2 - lat1).to_radians();
  let d_lambda = (lon2 - lon1).to_radians();

  let a = (d_phi / 2.0).sin().powi(2)
    + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
  2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Axis-aligned box in degrees that contains every point within some radius
/// of a centre. Used as the index prefilter before the exact distance check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
  pub min_lon: f64,
  pub max_lon: f64,
  pub min_lat: f64,
  pub max_lat: f64,
}

impl BoundingBox {
  /// The tightest box enclosing the spherical cap of `radius_km` around
  /// `(lon, lat)`.
  ///
  /// Longitudes are left unwrapped, so a cap that crosses the antimeridian
  /// yields `min_lon < -180` or `max_lon > 180`. Use [`BoundingBox::pieces`]
  /// to get boxes that lie within [-180, 180].
  pub fn around(lon: f64, lat: f64, radius_km: f64) -> Self {
    let angular = radius_km / EARTH_RADIUS_KM;
    let d_lat = angular.to_degrees();

    let min_lat = (lat - d_lat).max(-90.0);
    let max_lat = (lat + d_lat).min(90.0);

    // Near a pole the cap covers every meridian.
    let cos_lat = lat.to_radians().cos();
    let (min_lon, max_lon) = if min_lat <= -90.0 || max_lat >= 90.0 || cos_lat <= angular.sin() {
      (-180.0, 180.0)
    } else {
      let d_lon = (angular.sin() / cos_lat).asin().to_degrees();
      (lon - d_lon, lon + d_lon)
    };

    Self { min_lon, max_lon, min_lat, max_lat }
  }

  /// The box split at the antimeridian: one piece normally, two when it
  /// crosses ±180.
  pub fn pieces(&self) -> Vec<BoundingBox> {
    let part = |min_lon, max_lon| BoundingBox { min_lon, max_lon, ..*self };
    if self.max_lon - self.min_lon >= 360.0 {
      vec![part(-180.0, 180.0)]
    } else if self.min_lon < -180.0 {
      vec![part(self.min_lon + 360.0, 180.0), part(-180.0, self.max_lon)]
    } else if self.max_lon > 180.0 {
      vec![part(self.min_lon, 180.0), part(-180.0, self.max_lon - 360.0)]
    } else {
      vec![*self]
    }
  }

  pub fn contains(&self, lon: f64, lat: f64) -> bool {
    self.pieces().iter().any(|b| {
      (b.min_lon..=b.max_lon).contains(&lon) && (b.min_lat..=b.max_lat).contains(&lat)
    })
  }
}

/// Whether `(lon, lat)` lies within `radius_km` of `(centre_lon, centre_lat)`.
pub fn within_radius(centre_lon: f64, centre_lat: f64, lon: f64, lat: f64, radius_km: f64) -> bool {
  haversine_km(centre_lon, centre_lat, lon, lat) <= radius_km
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn haversine_matches_known_distance() {
    // Phoenix to Tucson, roughly 171 km as the crow flies.
    let d = haversine_km(-112.074, 33.448, -110.974, 32.222);
    assert!((d - 171.0).abs() < 5.0, "distance {d}");
  }

  #[test]
  fn haversine_of_identical_points_is_zero() {
    assert_eq!(haversine_km(-105.0, 40.0, -105.0, 40.0), 0.0);
  }

  #[test]
  fn one_tenth_degree_of_latitude_is_about_eleven_km() {
    let d = haversine_km(-105.0, 40.0, -105.0, 40.1);
    assert!((d - 11.12).abs() < 0.05, "distance {d}");
    assert!(!within_radius(-105.0, 40.0, -105.0, 40.1, OCCURRENCE_RADIUS_KM));
    assert!(within_radius(-105.0, 40.0, -105.0, 40.05, OCCURRENCE_RADIUS_KM));
  }

  #[test]
  fn bounding_box_encloses_the_radius() {
    let bbox = BoundingBox::around(-105.0, 40.0, OCCURRENCE_RADIUS_KM);
    // Points exactly on the radius in each cardinal direction.
    let d_lat = (OCCURRENCE_RADIUS_KM / EARTH_RADIUS_KM).to_degrees();
    assert!(bbox.contains(-105.0, 40.0 + d_lat * 0.999));
    assert!(bbox.contains(-105.0, 40.0 - d_lat * 0.999));
    // Longitude degrees shrink with latitude, so the box is wider than tall.
    assert!(bbox.max_lon - bbox.min_lon > bbox.max_lat - bbox.min_lat);
    assert!(!bbox.contains(-104.5, 40.0));
  }

  #[test]
  fn bounding_box_near_pole_spans_all_longitudes() {
    let bbox = BoundingBox::around(10.0, 89.95, OCCURRENCE_RADIUS_KM);
    assert_eq!((bbox.min_lon, bbox.max_lon), (-180.0, 180.0));
    assert_eq!(bbox.max_lat, 90.0);
  }

  #[test]
  fn bounding_box_splits_at_the_antimeridian() {
    let bbox = BoundingBox::around(179.97, -16.8, OCCURRENCE_RADIUS_KM);
    assert!(bbox.max_lon > 180.0);

    let pieces = bbox.pieces();
    assert_eq!(pieces.len(), 2);
    assert!(pieces.iter().all(|p| p.min_lon >= -180.0 && p.max_lon <= 180.0));
    assert!(bbox.contains(-179.97, -16.8));
    assert!(bbox.contains(179.99, -16.8));
    assert!(!bbox.contains(-179.5, -16.8));

    let west = BoundingBox::around(-179.97, -16.8, OCCURRENCE_RADIUS_KM);
    assert_eq!(west.pieces().len(), 2);
    assert!(west.contains(179.97, -16.8));
  }

  #[test]
  fn haversine_is_short_across_the_antimeridian() {
    let d = haversine_km(179.97, -16.8, -179.97, -16.8);
    assert!(d < OCCURRENCE_RADIUS_KM, "distance {d}");
  }
}
