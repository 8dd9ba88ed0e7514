//! Easing curves for camera transitions.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Named easing curve mapping normalized progress `[0, 1]` onto itself.
///
/// Every curve satisfies `f(0) == 0` and `f(1) == 1`. `Bounce` and `Elastic`
/// leave `[0, 1]` in between on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Easing {
    Linear,
    Ease,
    EaseIn,
    #[default]
    EaseOut,
    EaseInOut,
    Bounce,
    Elastic,
}

impl Easing {
    pub const ALL: [Easing; 7] = [
        Easing::Linear,
        Easing::Ease,
        Easing::EaseIn,
        Easing::EaseOut,
        Easing::EaseInOut,
        Easing::Bounce,
        Easing::Elastic,
    ];

    /// Evaluate the curve. Progress outside `[0, 1]` is clamped first.
    pub fn apply(self, t: f64) -> f64 {
        if t.is_nan() || t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Easing::Linear => t,
            Easing::Ease => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
                }
            }
            Easing::EaseIn => t * t,
            Easing::EaseOut => t * (2.0 - t),
            Easing::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
            Easing::Bounce => bounce_out(t),
            Easing::Elastic => {
                let c4 = (2.0 * PI) / 3.0;
                2f64.powf(-10.0 * t) * ((t * 10.0 - 0.75) * c4).sin() + 1.0
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Easing::Linear => "linear",
            Easing::Ease => "ease",
            Easing::EaseIn => "ease-in",
            Easing::EaseOut => "ease-out",
            Easing::EaseInOut => "ease-in-out",
            Easing::Bounce => "bounce",
            Easing::Elastic => "elastic",
        }
    }
}

fn bounce_out(t: f64) -> f64 {
    const N1: f64 = 7.5625;
    const D1: f64 = 2.75;

    if t < 1.0 / D1 {
        N1 * t * t
    } else if t < 2.0 / D1 {
        let t = t - 1.5 / D1;
        N1 * t * t + 0.75
    } else if t < 2.5 / D1 {
        let t = t - 2.25 / D1;
        N1 * t * t + 0.9375
    } else {
        let t = t - 2.625 / D1;
        N1 * t * t + 0.984375
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Easing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Easing::ALL
            .into_iter()
            .find(|easing| easing.name() == s)
            .ok_or_else(|| format!("unknown easing: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        for easing in Easing::ALL {
            assert_eq!(easing.apply(0.0), 0.0, "{easing}");
            assert_eq!(easing.apply(1.0), 1.0, "{easing}");
        }
    }

    #[test]
    fn test_clamps_out_of_range_progress() {
        for easing in Easing::ALL {
            assert_eq!(easing.apply(-0.5), 0.0);
            assert_eq!(easing.apply(1.5), 1.0);
            assert_eq!(easing.apply(f64::NAN), 0.0);
        }
    }

    #[test]
    fn test_linear_midpoint() {
        assert!((Easing::Linear.apply(0.5) - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_symmetric_curves_hit_half() {
        assert!((Easing::Ease.apply(0.5) - 0.5).abs() < 1e-12);
        assert!((Easing::EaseInOut.apply(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_in_out_ordering() {
        let t = 0.3;
        assert!(Easing::EaseIn.apply(t) < t);
        assert!(Easing::EaseOut.apply(t) > t);
    }

    #[test]
    fn test_monotonic_standard_curves() {
        for easing in [Easing::Linear, Easing::Ease, Easing::EaseIn, Easing::EaseOut, Easing::EaseInOut] {
            let mut last = 0.0;
            for i in 1..=100 {
                let v = easing.apply(i as f64 / 100.0);
                assert!(v >= last, "{easing} not monotonic at {i}");
                last = v;
            }
        }
    }

    #[test]
    fn test_elastic_overshoots() {
        let max = (1..100)
            .map(|i| Easing::Elastic.apply(i as f64 / 100.0))
            .fold(f64::MIN, f64::max);
        assert!(max > 1.0);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("ease-in-out".parse::<Easing>(), Ok(Easing::EaseInOut));
        assert_eq!("bounce".parse::<Easing>(), Ok(Easing::Bounce));
        assert!("wobble".parse::<Easing>().is_err());
        for easing in Easing::ALL {
            assert_eq!(easing.name().parse::<Easing>(), Ok(easing));
        }
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&Easing::EaseInOut).unwrap();
        assert_eq!(json, "\"ease-in-out\"");
    }
}
