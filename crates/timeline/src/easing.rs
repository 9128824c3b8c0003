use std::fmt;

use serde::{Deserialize, Serialize};

/// Remaps the normalised fraction between two keyframes before interpolation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Easing {
    #[default]
    Linear,
    /// `f²(3 − 2f)`.
    Smooth,
    /// Holds the earlier value until the later keyframe's own time.
    Step,
}

impl Easing {
    pub const ALL: [Easing; 3] = [Easing::Linear, Easing::Smooth, Easing::Step];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "linear" => Some(Easing::Linear),
            "smooth" => Some(Easing::Smooth),
            "step" => Some(Easing::Step),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::Smooth => "smooth",
            Easing::Step => "step",
        }
    }

    pub fn apply(self, fraction: f32) -> f32 {
        let clamped = fraction.clamp(0.0, 1.0);
        match self {
            Easing::Linear => clamped,
            Easing::Smooth => clamped * clamped * (3.0 - 2.0 * clamped),
            Easing::Step => {
                if clamped < 1.0 {
                    0.0
                } else {
                    1.0
                }
            }
        }
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_curve_increases_monotonically() {
        let mut last = 0.0;
        for step in 0..=10 {
            let sample = Easing::Linear.apply(step as f32 / 10.0);
            assert!(sample >= last - f32::EPSILON);
            last = sample;
        }
    }

    #[test]
    fn smooth_matches_expected_values() {
        assert_eq!(Easing::Smooth.apply(0.0), 0.0);
        assert_eq!(Easing::Smooth.apply(0.5), 0.5);
        assert_eq!(Easing::Smooth.apply(1.0), 1.0);
        assert!(Easing::Smooth.apply(0.25) < 0.25);
        assert!(Easing::Smooth.apply(0.75) > 0.75);
    }

    #[test]
    fn step_only_jumps_at_the_end() {
        assert_eq!(Easing::Step.apply(0.0), 0.0);
        assert_eq!(Easing::Step.apply(0.9999), 0.0);
        assert_eq!(Easing::Step.apply(1.0), 1.0);
    }

    #[test]
    fn fractions_outside_unit_range_are_clamped() {
        for easing in Easing::ALL {
            assert_eq!(easing.apply(-2.0), 0.0);
            assert_eq!(easing.apply(3.0), 1.0);
        }
    }

    #[test]
    fn names_round_trip() {
        for easing in Easing::ALL {
            assert_eq!(Easing::from_name(easing.name()), Some(easing));
        }
        assert_eq!(Easing::from_name(" Smooth "), Some(Easing::Smooth));
        assert_eq!(Easing::from_name("bounce"), None);
    }
}
