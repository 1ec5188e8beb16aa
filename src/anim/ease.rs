//! Easing curves
//!
//! All curves map 0..1 to 0..1 with `f(0) = 0` and `f(1) = 1`. The back
//! curves overshoot in between.

use serde::{Deserialize, Serialize};

/// Overshoot amount for the back curves
const BACK_C1: f32 = 1.70158;
const BACK_C3: f32 = BACK_C1 + 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ease {
    #[default]
    Linear,
    SineInOut,
    Power1InOut,
    Power2In,
    Power2Out,
    BackIn,
    BackOut,
    BounceOut,
}

impl Ease {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::SineInOut => -((std::f32::consts::PI * t).cos() - 1.0) / 2.0,
            Ease::Power1InOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
            Ease::Power2In => t * t * t,
            Ease::Power2Out => 1.0 - (1.0 - t).powi(3),
            Ease::BackIn => BACK_C3 * t * t * t - BACK_C1 * t * t,
            Ease::BackOut => 1.0 + BACK_C3 * (t - 1.0).powi(3) + BACK_C1 * (t - 1.0).powi(2),
            Ease::BounceOut => bounce_out(t),
        }
    }
}

fn bounce_out(t: f32) -> f32 {
    const N1: f32 = 7.5625;
    const D1: f32 = 2.75;
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

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Ease; 8] = [
        Ease::Linear,
        Ease::SineInOut,
        Ease::Power1InOut,
        Ease::Power2In,
        Ease::Power2Out,
        Ease::BackIn,
        Ease::BackOut,
        Ease::BounceOut,
    ];

    #[test]
    fn test_endpoints() {
        for ease in ALL {
            assert!(ease.apply(0.0).abs() < 1e-5, "{:?} at 0", ease);
            assert!((ease.apply(1.0) - 1.0).abs() < 1e-5, "{:?} at 1", ease);
        }
    }

    #[test]
    fn test_back_out_overshoots() {
        let peak = (1..100).map(|i| Ease::BackOut.apply(i as f32 / 100.0)).fold(0.0, f32::max);
        assert!(peak > 1.0);
        assert!(Ease::BackIn.apply(0.2) < 0.0);
    }

    #[test]
    fn test_input_is_clamped() {
        assert_eq!(Ease::Linear.apply(2.0), 1.0);
        assert_eq!(Ease::Linear.apply(-1.0), 0.0);
    }
}
