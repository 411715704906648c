//! Simulation-wide configuration.

use crate::network::LateralDirection;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The side of the road on which traffic keeps, which determines
/// the preferred lane change direction and on which side overtaking is forbidden.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Handedness {
    /// Keep right, overtake on the left.
    #[default]
    Right,
    /// Keep left, overtake on the right.
    Left,
}

impl Handedness {
    /// The direction drivers drift back to when there is no reason to stay.
    pub fn preferred(self) -> LateralDirection {
        match self {
            Self::Right => LateralDirection::Right,
            Self::Left => LateralDirection::Left,
        }
    }

    /// The direction in which drivers overtake.
    pub fn overtaking(self) -> LateralDirection {
        self.preferred().flip()
    }
}

/// The configuration of a [crate::Simulation].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SimulationConfig {
    /// How far ahead in time the route navigator looks for branches, in s.
    pub time_horizon: f64,
    /// The maximum distance at which leaders are perceived, in m.
    pub forward_headway: f64,
    /// The maximum distance at which followers are perceived, in m.
    pub reverse_headway: f64,
    /// The side of the road on which traffic keeps.
    pub handedness: Handedness,
    /// The maximum deceleration of any vehicle, a positive number in m/s^2.
    /// The collision sentinel of the car following models is clamped to this value.
    pub max_deceleration: f64,
    /// The seed of the random number generator.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            time_horizon: 90.0,
            forward_headway: 500.0,
            reverse_headway: 200.0,
            handedness: Handedness::Right,
            max_deceleration: 6.0,
            seed: 0,
        }
    }
}

impl SimulationConfig {
    /// Reads a configuration from a JSON document.
    /// Fields missing from the document take their default values.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> crate::SimResult<Self> {
        serde_json::from_str(json).map_err(|err| crate::SimError::Config(err.to_string()))
    }
}

#[cfg(all(test, feature = "serde"))]
mod test {
    use super::*;

    #[test]
    fn partial_json() {
        let config =
            SimulationConfig::from_json(r#"{ "handedness": "Left", "seed": 42 }"#).unwrap();
        assert_eq!(config.handedness, Handedness::Left);
        assert_eq!(config.seed, 42);
        assert_eq!(config.time_horizon, 90.0);
        assert_eq!(config.handedness.overtaking(), LateralDirection::Right);
    }

    #[test]
    fn invalid_json() {
        assert!(matches!(
            SimulationConfig::from_json("{ \"seed\": -1 }"),
            Err(crate::SimError::Config(_))
        ));
    }
}
