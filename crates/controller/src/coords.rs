//! Coordinate and altitude extraction from free text.

use regex::Regex;

/// Pulls decimal coordinates and an altitude out of mission or context text.
///
/// Only numbers with a fractional part count as coordinates, so agent ids and
/// whole-meter altitudes are never mistaken for latitude or longitude.
pub struct CoordinateParser {
    decimal: Regex,
    altitude: Regex,
}

impl Default for CoordinateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl CoordinateParser {
    pub fn new() -> Self {
        Self {
            decimal: Regex::new(r"[-+]?\d+\.\d+").expect("decimal pattern is valid"),
            altitude: Regex::new(r"(\d+(?:\.\d+)?)\s*m").expect("altitude pattern is valid"),
        }
    }

    /// Every decimal number, left to right.
    pub fn decimals(&self, text: &str) -> Vec<f64> {
        self.decimal
            .find_iter(text)
            .filter_map(|m| m.as_str().parse().ok())
            .collect()
    }

    /// Consecutive decimals paired as (lat, lon). A trailing odd number is dropped.
    pub fn pairs(&self, text: &str) -> Vec<(f64, f64)> {
        self.decimals(text)
            .chunks_exact(2)
            .map(|c| (c[0], c[1]))
            .collect()
    }

    pub fn first_pair(&self, text: &str) -> Option<(f64, f64)> {
        self.pairs(text).into_iter().next()
    }

    /// First number followed by `m`, in meters.
    pub fn altitude(&self, text: &str) -> Option<f64> {
        self.altitude
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MISSION: &str = "Takeoff and scan the area. Agent 1 goes to Sector A (Lat 47.396716, Lon 8.549858). \
                           Agent 2 goes to Sector B (Lat 47.396735, Lon 8.549883).";

    #[test]
    fn test_pairs_left_to_right() {
        let parser = CoordinateParser::new();
        assert_eq!(
            parser.pairs(MISSION),
            vec![(47.396716, 8.549858), (47.396735, 8.549883)]
        );
        assert_eq!(parser.altitude(MISSION), None);
    }

    #[test]
    fn test_odd_decimal_dropped_and_signs_kept() {
        let parser = CoordinateParser::new();
        assert_eq!(parser.pairs("-33.5, +151.25 then 1.5"), vec![(-33.5, 151.25)]);
        assert_eq!(parser.first_pair("no numbers here"), None);
    }

    #[test]
    fn test_altitude() {
        let parser = CoordinateParser::new();
        assert_eq!(parser.altitude("fly at 25m over 47.1, 8.2"), Some(25.0));
        assert_eq!(parser.altitude("hold 12.5 m"), Some(12.5));
    }
}
