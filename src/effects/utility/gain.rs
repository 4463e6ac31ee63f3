use wide::f32x4;

/// Multiplies `buffer` by a constant linear gain.
pub fn apply_gain(buffer: &mut [f32], gain: f32) {
    let gain_vec = f32x4::splat(gain);
    let (chunks, remainder) = buffer.as_chunks_mut::<4>();

    for chunk in chunks {
        let vec = f32x4::from(*chunk);
        *chunk = (vec * gain_vec).to_array();
    }

    for sample in remainder {
        *sample *= gain;
    }
}

/// Multiplies `buffer` sample by sample with `gains`.
///
/// Only the common prefix of the two slices is touched.
pub fn apply_gain_curve(buffer: &mut [f32], gains: &[f32]) {
    let len = buffer.len().min(gains.len());
    let (in_chunks, in_rem) = buffer[..len].as_chunks_mut::<4>();
    let (gain_chunks, gain_rem) = gains[..len].as_chunks::<4>();

    for (in_c, gain_c) in in_chunks.iter_mut().zip(gain_chunks.iter()) {
        let in_v = f32x4::from(*in_c);
        let gain_v = f32x4::from(*gain_c);
        *in_c = (in_v * gain_v).to_array();
    }

    for (in_s, gain_s) in in_rem.iter_mut().zip(gain_rem.iter()) {
        *in_s *= *gain_s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sample_format::db_to_linear;

    #[test]
    fn test_gain() {
        let mut buffer = [1.0, -1.0, 0.0, 0.5, 0.25];
        apply_gain(&mut buffer, 0.5);
        assert_eq!(buffer, [0.5, -0.5, 0.0, 0.25, 0.125]);
    }

    #[test]
    fn test_gain_db() {
        let mut buffer = [1.0];
        apply_gain(&mut buffer, db_to_linear(-6.0));
        assert!((buffer[0] - 0.501187).abs() < 0.001);
    }

    #[test]
    fn test_gain_curve() {
        let mut buffer = [1.0; 6];
        apply_gain_curve(&mut buffer, &[0.0, 0.2, 0.4, 0.6, 0.8]);
        assert_eq!(buffer, [0.0, 0.2, 0.4, 0.6, 0.8, 1.0]);
    }
}
