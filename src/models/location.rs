//! Location model for geographic coordinates and city suggestions

use serde::{Deserialize, Serialize};

/// Tolerance under which two coordinate reads count as the same place
pub const COORDINATE_TOLERANCE: f64 = 1e-6;

/// Geographic coordinates in decimal degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    #[must_use]
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Both axes are finite numbers
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite()
    }

    /// Fuzzy equality: true when neither axis moved by more than [`COORDINATE_TOLERANCE`].
    /// Repeated geolocation reads jitter in the last digits.
    #[must_use]
    pub fn approx_eq(&self, other: &Coordinates) -> bool {
        (self.lat - other.lat).abs() <= COORDINATE_TOLERANCE
            && (self.lon - other.lon).abs() <= COORDINATE_TOLERANCE
    }

    /// Format location as coordinates string
    #[must_use]
    pub fn format_coordinates(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lon)
    }

    /// Cache key for the weather snapshot at exactly these coordinates
    #[must_use]
    pub fn cache_key(&self) -> String {
        // Adding 0.0 turns -0.0 into 0.0
        format!("weather:{}:{}", self.lat + 0.0, self.lon + 0.0)
    }
}

/// A candidate place returned by city search
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CitySuggestion {
    pub name: String,
    /// Country code (ISO 3166-1 alpha-2)
    pub country: String,
    pub lat: f64,
    pub lon: f64,
}

impl CitySuggestion {
    #[must_use]
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lon)
    }

    /// "Paris, FR"
    #[must_use]
    pub fn display_name(&self) -> String {
        if self.country.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.country)
        }
    }
}

/// Normalize a free-text query the way city cache keys expect it
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_coordinates_cache_key() {
        let coords = Coordinates::new(12.9, 77.6);
        assert_eq!(coords.cache_key(), "weather:12.9:77.6");
    }

    #[test]
    fn test_cache_key_ignores_sign_of_zero() {
        let negative = Coordinates::new(-0.0, -0.0);
        let positive = Coordinates::new(0.0, 0.0);
        assert!(negative.approx_eq(&positive));
        assert_eq!(negative.cache_key(), positive.cache_key());
        assert_eq!(negative.cache_key(), "weather:0:0");
        assert_eq!(Coordinates::new(-1.5, 0.0).cache_key(), "weather:-1.5:0");
    }

    #[rstest]
    #[case(12.9, 77.6, 12.900_000_1, 77.600_000_1, true)]
    #[case(12.9, 77.6, 12.9, 77.600_01, false)]
    #[case(12.9, 77.6, 12.91, 77.6, false)]
    #[case(-33.86, 151.2, -33.86, 151.2, true)]
    fn test_approx_eq(
        #[case] lat_a: f64,
        #[case] lon_a: f64,
        #[case] lat_b: f64,
        #[case] lon_b: f64,
        #[case] expected: bool,
    ) {
        let a = Coordinates::new(lat_a, lon_a);
        let b = Coordinates::new(lat_b, lon_b);
        assert_eq!(a.approx_eq(&b), expected);
    }

    #[test]
    fn test_is_finite() {
        assert!(Coordinates::new(1.0, 2.0).is_finite());
        assert!(!Coordinates::new(f64::NAN, 2.0).is_finite());
        assert!(!Coordinates::new(1.0, f64::INFINITY).is_finite());
    }

    #[test]
    fn test_normalize_query() {
        assert_eq!(normalize_query("  PaRis "), "paris");
    }

    #[test]
    fn test_suggestion_display_name() {
        let city = CitySuggestion {
            name: "Paris".to_string(),
            country: "FR".to_string(),
            lat: 48.8566,
            lon: 2.3522,
        };
        assert_eq!(city.display_name(), "Paris, FR");
        assert_eq!(city.coordinates(), Coordinates::new(48.8566, 2.3522));
    }
}
