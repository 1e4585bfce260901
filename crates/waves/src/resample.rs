//! Sinc resampling to the fixed processing rate.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use rr_domain::error::{Error, Result};

const CHUNK_SIZE: usize = 1024;

/// Resample mono audio from `input_rate` to `output_rate`.
///
/// `SincFixedIn` consumes fixed-size blocks, so the input is fed through in
/// chunks and the tail via a partial call.
pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || input.is_empty() {
        return Ok(input.to_vec());
    }

    let ratio = output_rate as f64 / input_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 128,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, CHUNK_SIZE, 1)
        .map_err(|e| Error::Wave(format!("creating resampler: {e}")))?;

    let mut output = Vec::with_capacity((input.len() as f64 * ratio) as usize + CHUNK_SIZE);

    let mut pos = 0;
    while input.len() - pos >= CHUNK_SIZE {
        let chunk = &input[pos..pos + CHUNK_SIZE];
        let processed = resampler
            .process(&[chunk], None)
            .map_err(|e| Error::Wave(format!("resampling: {e}")))?;
        output.extend_from_slice(&processed[0]);
        pos += CHUNK_SIZE;
    }

    if pos < input.len() {
        let tail = &input[pos..];
        let processed = resampler
            .process_partial(Some(&[tail]), None)
            .map_err(|e| Error::Wave(format!("resampling tail: {e}")))?;
        output.extend_from_slice(&processed[0]);
    }

    // Drain the resampler's internal delay line.
    let drained = resampler
        .process_partial::<&[f32]>(None, None)
        .map_err(|e| Error::Wave(format!("draining resampler: {e}")))?;
    output.extend_from_slice(&drained[0]);

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_is_identity() {
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(resample(&input, 8_000, 8_000).unwrap(), input);
    }

    #[test]
    fn downsampling_shrinks_proportionally() {
        let input: Vec<f32> = (0..22_050)
            .map(|i| (i as f32 * 0.01).sin() * 0.5)
            .collect();
        let output = resample(&input, 22_050, 8_000).unwrap();
        let expected = input.len() as f64 * 8_000.0 / 22_050.0;
        let tolerance = CHUNK_SIZE as f64;
        assert!((output.len() as f64 - expected).abs() < tolerance);
    }

    #[test]
    fn empty_input_is_fine() {
        assert!(resample(&[], 22_050, 8_000).unwrap().is_empty());
    }
}
