//! Receiver-side distance estimation from calibrated TX power

use serde::{Deserialize, Serialize};

/// Path-loss exponent for free space; indoor cabins sit between 2 and 4
const PATH_LOSS_EXPONENT: f64 = 2.0;

/// Coarse proximity zones as reported by iBeacon receivers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proximity {
    Immediate,
    Near,
    Far,
    Unknown,
}

impl Proximity {
    pub fn from_distance(distance: f64) -> Self {
        if !distance.is_finite() || distance < 0.0 {
            Proximity::Unknown
        } else if distance < 0.5 {
            Proximity::Immediate
        } else if distance < 4.0 {
            Proximity::Near
        } else {
            Proximity::Far
        }
    }
}

/// Estimate distance in meters from the advertised 1 m RSSI and the measured RSSI
///
/// Returns `None` for an RSSI of 0, which scanners report when no value was
/// measured.
pub fn estimate_distance(calibrated_tx_power: i8, rssi: i16) -> Option<f64> {
    if rssi == 0 {
        return None;
    }
    let exponent = (f64::from(calibrated_tx_power) - f64::from(rssi)) / (10.0 * PATH_LOSS_EXPONENT);
    Some(10f64.powf(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_at_calibration_point() {
        let distance = estimate_distance(-59, -59).unwrap();
        assert!((distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_grows_with_attenuation() {
        let distance = estimate_distance(-59, -79).unwrap();
        assert!((distance - 10.0).abs() < 1e-9);
        assert!(estimate_distance(-59, -40).unwrap() < 1.0);
        assert_eq!(estimate_distance(-59, 0), None);
    }

    #[test]
    fn test_proximity_zones() {
        assert_eq!(Proximity::from_distance(0.2), Proximity::Immediate);
        assert_eq!(Proximity::from_distance(1.0), Proximity::Near);
        assert_eq!(Proximity::from_distance(12.0), Proximity::Far);
        assert_eq!(Proximity::from_distance(f64::NAN), Proximity::Unknown);
    }
}
