// FrequencyMapper - model output bin to frequency in Hz
//
// Bins are spaced on a logarithmic cents scale starting at C1. The extra
// correction factor compensates a constant offset measured between the
// model's bin semantics and reference tones.

use crate::error::DetectorError;

/// Reference pitch of bin 0 (C1), in Hz
pub const F_MIN_HZ: f32 = 32.7;

/// Pitch distance between neighbouring bins
pub const CENTS_PER_BIN: f32 = 20.0;

/// Empirical calibration factor applied to every mapped frequency
pub const CORRECTION_OFFSET: f32 = 2.67;

/// Output bins of the CREPE pitch model
pub const CREPE_BIN_COUNT: usize = 360;

/// Map a bin index to Hz
///
/// `F_MIN_HZ * 2^(index * CENTS_PER_BIN / 1200) * CORRECTION_OFFSET`,
/// strictly increasing in `index`. Range checking is the caller's job; see
/// [`map_bin`].
pub fn map_index_to_frequency(index: usize) -> f32 {
    F_MIN_HZ * 2.0_f32.powf((index as f32 * CENTS_PER_BIN) / 1200.0) * CORRECTION_OFFSET
}

/// Map a bin index that must lie inside `0..bin_count`
pub fn map_bin(index: usize, bin_count: usize) -> Result<f32, DetectorError> {
    if index >= bin_count {
        return Err(DetectorError::BinOutOfRange { index, bin_count });
    }
    Ok(map_index_to_frequency(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bin_zero_is_corrected_reference() {
        let hz = map_index_to_frequency(0);
        assert!((hz - 32.7 * 2.67).abs() < 1e-4, "got {}", hz);
    }

    #[test]
    fn test_bin_fifty_matches_formula() {
        let expected = 32.7_f64 * 2.0_f64.powf(50.0 * 20.0 / 1200.0) * 2.67;
        let actual = map_index_to_frequency(50) as f64;
        assert!(
            (actual - expected).abs() < 1e-3,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_sixty_bins_is_one_octave() {
        let ratio = map_index_to_frequency(60) / map_index_to_frequency(0);
        assert!((ratio - 2.0).abs() < 1e-5, "ratio {}", ratio);
    }

    #[test]
    fn test_strictly_increasing() {
        let mut previous = map_index_to_frequency(0);
        for index in 1..CREPE_BIN_COUNT * 2 {
            let current = map_index_to_frequency(index);
            assert!(
                current > previous,
                "bin {} ({}) not above bin {} ({})",
                index,
                current,
                index - 1,
                previous
            );
            previous = current;
        }
    }

    #[test]
    fn test_map_bin_rejects_out_of_range() {
        assert!(map_bin(CREPE_BIN_COUNT - 1, CREPE_BIN_COUNT).is_ok());
        assert_eq!(
            map_bin(CREPE_BIN_COUNT, CREPE_BIN_COUNT),
            Err(DetectorError::BinOutOfRange {
                index: CREPE_BIN_COUNT,
                bin_count: CREPE_BIN_COUNT
            })
        );
        assert!(map_bin(0, 0).is_err());
    }
}
