//! Physical units for page and template geometry.
//!
//! Everything downstream of the template parser works in tenths of
//! millimetres ("tmm"): fine enough to express inch-based sizes exactly
//! (1 inch = 254 tmm) while staying integral.

use crate::error::Error;

/// Physical unit accepted by template descriptors and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Millimeters,
    Centimeters,
    Inches,
}

impl Unit {
    /// Multiplier from one unit to tenths of millimetres.
    pub fn tmm_factor(self) -> f64 {
        match self {
            Unit::Millimeters => 10.0,
            Unit::Centimeters => 100.0,
            Unit::Inches => 254.0,
        }
    }

    /// Parse the unit strings allowed in template files.
    pub fn parse(raw: &str) -> Result<Self, Error> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mm" => Ok(Unit::Millimeters),
            "cm" => Ok(Unit::Centimeters),
            "inch" | "inches" => Ok(Unit::Inches),
            _ => Err(Error::BadUnit(raw.to_string())),
        }
    }
}

/// Round half away from zero. All pixel-rectangle derivations go through
/// this so edge pixels stay deterministic across repeated calls.
pub fn round_half_up(x: f64) -> i32 {
    if x >= 0.0 {
        (x + 0.5).floor() as i32
    } else {
        (x - 0.5).ceil() as i32
    }
}

/// Convert a dimension in `unit` to tenths of millimetres.
pub fn to_tmm(value: f64, unit: Unit) -> i32 {
    round_half_up(value * unit.tmm_factor())
}

/// Tenths of millimetres to inches.
pub fn tmm_to_inches(tmm: i32) -> f64 {
    tmm as f64 / 254.0
}

/// Tenths of millimetres to device pixels at the given DPI.
pub fn tmm_to_px(tmm: i32, dpi: f64) -> u32 {
    round_half_up(tmm_to_inches(tmm) * dpi).max(1) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_strings() {
        assert_eq!(Unit::parse("mm").unwrap(), Unit::Millimeters);
        assert_eq!(Unit::parse("CM").unwrap(), Unit::Centimeters);
        assert_eq!(Unit::parse("inches").unwrap(), Unit::Inches);
        assert!(matches!(Unit::parse("furlong"), Err(Error::BadUnit(_))));
    }

    #[test]
    fn inch_is_exact_in_tmm() {
        assert_eq!(to_tmm(1.0, Unit::Inches), 254);
        assert_eq!(to_tmm(10.0, Unit::Millimeters), 100);
        assert_eq!(tmm_to_px(254, 300.0), 300);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round_half_up(1.5), 2);
        assert_eq!(round_half_up(2.4999), 2);
        assert_eq!(round_half_up(-1.5), -2);
    }
}
