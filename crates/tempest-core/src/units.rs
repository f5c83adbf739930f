//! Unit conversion utilities
//!
//! Stored observations are in US customary units (°F, inHg, mph, in).

pub const HPA_PER_INHG: f64 = 33.8639;

/// Relative pressure from hPa to inHg
pub fn hpa_to_inhg(hpa: f64) -> f64 {
    hpa / HPA_PER_INHG
}

pub const MM_PER_INCH: f64 = 25.4;
pub const CM_PER_INCH: f64 = 2.54;

/// Length unit of a precipitation quantity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrecipUnit {
    Millimeters,
    Centimeters,
    Inches,
}

impl PrecipUnit {
    /// Interpret a unit code such as `wmoUnit:mm`
    ///
    /// Unrecognized codes are treated as millimeters.
    pub fn from_code(unit_code: &str) -> Self {
        let code = unit_code.rsplit(':').next().unwrap_or(unit_code);
        let code = code.trim().to_ascii_lowercase();
        if code.contains("mm") {
            PrecipUnit::Millimeters
        } else if code.contains("cm") {
            PrecipUnit::Centimeters
        } else if code.contains("in") {
            PrecipUnit::Inches
        } else {
            PrecipUnit::Millimeters
        }
    }

    pub fn to_inches(self, value: f64) -> f64 {
        match self {
            PrecipUnit::Millimeters => value / MM_PER_INCH,
            PrecipUnit::Centimeters => value / CM_PER_INCH,
            PrecipUnit::Inches => value,
        }
    }
}

/// Convert a precipitation amount with a unit code to inches
pub fn precip_to_inches(value: f64, unit_code: &str) -> f64 {
    PrecipUnit::from_code(unit_code).to_inches(value)
}
