use crate::error::PlannerError;
use crate::models::Coordinates;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance in km (haversine).
pub fn distance_km(a: &Coordinates, b: &Coordinates) -> Result<f64, PlannerError> {
    for point in [a, b] {
        if !point.is_valid() {
            return Err(PlannerError::InvalidInput(format!(
                "invalid coordinates ({}, {})",
                point.lat, point.lon
            )));
        }
    }

    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    Ok(EARTH_RADIUS_KM * c)
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn around(origin: &Coordinates, radius_km: f64) -> Self {
        let delta = radius_km.max(0.0) / KM_PER_DEGREE;
        Self {
            south: origin.lat - delta,
            west: origin.lon - delta,
            north: origin.lat + delta,
            east: origin.lon + delta,
        }
    }

    /// Overpass order: south,west,north,east.
    pub fn to_overpass(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_between_identical_points_is_zero() {
        let p = Coordinates::new(10.77, 106.69);
        assert_eq!(distance_km(&p, &p).unwrap(), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let a = Coordinates::new(10.0, 106.0);
        let b = Coordinates::new(11.0, 106.0);
        let d = distance_km(&a, &b).unwrap();
        assert!((d - 111.19).abs() < 0.01, "got {d}");
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        let a = Coordinates::new(f64::NAN, 106.0);
        let b = Coordinates::new(10.0, 106.0);
        assert!(distance_km(&a, &b).is_err());
        assert!(distance_km(&b, &Coordinates::new(91.0, 0.0)).is_err());
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(2.005_1), 2.01);
    }

    #[test]
    fn bounding_box_uses_degree_approximation() {
        let bbox = BoundingBox::around(&Coordinates::new(10.0, 106.0), 11.1);
        assert!((bbox.north - 10.1).abs() < 1e-9);
        assert!((bbox.west - 105.9).abs() < 1e-9);
    }
}
