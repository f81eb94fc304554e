//! Easing curves mapping linear progress to eased progress.

/// Easing function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Easing {
    /// Linear interpolation.
    #[default]
    Linear,
    /// Cubic ease-in (slow start).
    EaseIn,
    /// Cubic ease-out (slow finish).
    EaseOut,
    /// Cubic ease-in, then ease-out.
    EaseInOut,
    /// Exponential ease-out (sharp snap to target).
    ExponentialOut,
    /// Exponential ease-in (accelerating).
    ExponentialIn,
    /// Exponential ease-in-out.
    ExponentialInOut,
    /// Jumps straight to the end value.
    Instant,
}

impl Easing {
    /// Applies the easing function to a progress value (0-1).
    #[must_use]
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);

        match self {
            Self::Linear => t,
            Self::EaseIn => t * t * t,
            Self::EaseOut => {
                let u = t - 1.0;
                u * u * u + 1.0
            }
            Self::EaseInOut => {
                if t < 0.5 {
                    4.0 * t * t * t
                } else {
                    let u = 2.0 * t - 2.0;
                    0.5 * u * u * u + 1.0
                }
            }
            Self::ExponentialOut => {
                // 1 - 2^(-10t)
                if t >= 1.0 {
                    1.0
                } else {
                    1.0 - 2.0_f32.powf(-10.0 * t)
                }
            }
            Self::ExponentialIn => {
                // 2^(10(t-1))
                if t <= 0.0 {
                    0.0
                } else {
                    2.0_f32.powf(10.0 * (t - 1.0))
                }
            }
            Self::ExponentialInOut => {
                if t <= 0.0 {
                    0.0
                } else if t >= 1.0 {
                    1.0
                } else if t < 0.5 {
                    2.0_f32.powf(20.0 * t - 10.0) / 2.0
                } else {
                    (2.0 - 2.0_f32.powf(-20.0 * t + 10.0)) / 2.0
                }
            }
            Self::Instant => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Easing; 8] = [
        Easing::Linear,
        Easing::EaseIn,
        Easing::EaseOut,
        Easing::EaseInOut,
        Easing::ExponentialOut,
        Easing::ExponentialIn,
        Easing::ExponentialInOut,
        Easing::Instant,
    ];

    #[test]
    fn test_endpoints() {
        for easing in ALL {
            assert!((easing.apply(1.0) - 1.0).abs() < 0.001, "{easing:?}");
            if easing != Easing::Instant {
                assert!(easing.apply(0.0).abs() < 0.001, "{easing:?}");
            }
        }
    }

    #[test]
    fn test_input_is_clamped() {
        assert_eq!(Easing::Linear.apply(-1.0), 0.0);
        assert_eq!(Easing::Linear.apply(3.0), 1.0);
    }

    #[test]
    fn test_curve_shapes() {
        assert!(Easing::EaseIn.apply(0.5) < 0.5);
        assert!(Easing::EaseOut.apply(0.5) > 0.5);
        assert!((Easing::EaseInOut.apply(0.5) - 0.5).abs() < 0.001);
        assert!(Easing::ExponentialOut.apply(0.1) > Easing::Linear.apply(0.1));
    }
}
