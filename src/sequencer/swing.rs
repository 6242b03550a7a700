//! Swing timing, shared by live playback and MIDI export

const MAX_SWING_PERCENT: f64 = 50.0;

/// Duration of step `step` given the straight step length `base`.
///
/// Even steps are stretched and odd steps shortened by `swing_percent / 100`,
/// so each even/odd pair still spans `2 * base`. Works in any unit
/// (seconds for playback, ticks for export).
pub fn step_duration(step: usize, base: f64, swing_percent: f64) -> f64 {
    let factor = swing_percent.clamp(0.0, MAX_SWING_PERCENT) / 100.0;
    if step % 2 == 0 {
        base * (1.0 + factor)
    } else {
        base * (1.0 - factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_swing_is_straight() {
        for base in [0.05, 0.125, 120.0, 480.0] {
            for step in 0..8 {
                assert_eq!(step_duration(step, base, 0.0), base);
            }
        }
    }

    #[test]
    fn test_pairs_conserve_length() {
        for swing in [0.0, 10.0, 25.0, 33.0, 50.0] {
            for pair in 0..4 {
                let even = step_duration(pair * 2, 0.125, swing);
                let odd = step_duration(pair * 2 + 1, 0.125, swing);
                assert!((even + odd - 0.25).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_even_long_odd_short() {
        assert_eq!(step_duration(0, 120.0, 50.0), 180.0);
        assert_eq!(step_duration(1, 120.0, 50.0), 60.0);
    }

    #[test]
    fn test_swing_is_clamped() {
        assert_eq!(step_duration(0, 100.0, 80.0), step_duration(0, 100.0, 50.0));
        assert_eq!(step_duration(1, 100.0, -20.0), 100.0);
    }
}
