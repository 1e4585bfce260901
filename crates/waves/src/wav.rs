//! WAV read/write helpers for the decomposition pipeline.

use std::path::Path;

use rr_domain::error::{Error, Result};

/// Read a WAV file as mono f32 samples in [-1, 1].
///
/// Multi-channel input is downmixed by averaging. Returns `(samples,
/// sample_rate)`.
pub fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| Error::Wave(format!("opening {}: {e}", path.display())))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Wave(format!("reading samples: {e}")))?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            16 => reader
                .samples::<i16>()
                .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Wave(format!("reading samples: {e}")))?,
            24 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / 8_388_608.0))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Wave(format!("reading samples: {e}")))?,
            32 => reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / i32::MAX as f32))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Wave(format!("reading samples: {e}")))?,
            bits => {
                return Err(Error::Wave(format!("unsupported bit depth: {bits}")));
            }
        },
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Write mono f32 samples as 16-bit PCM WAV.
pub fn write_wav_mono(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| Error::Wave(format!("creating {}: {e}", path.display())))?;
    for &sample in samples {
        let v = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer
            .write_sample(v)
            .map_err(|e| Error::Wave(format!("writing sample: {e}")))?;
    }
    writer
        .finalize()
        .map_err(|e| Error::Wave(format!("finalizing {}: {e}", path.display())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn mono_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let samples: Vec<f32> = (0..8_000)
            .map(|i| (TAU * 440.0 * i as f32 / 8_000.0).sin() * 0.5)
            .collect();
        write_wav_mono(&path, &samples, 8_000).unwrap();

        let (read, sr) = read_wav_mono(&path).unwrap();
        assert_eq!(sr, 8_000);
        assert_eq!(read.len(), samples.len());
        for (a, b) in samples.iter().zip(read.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn stereo_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..100 {
            writer.write_sample(8_000i16).unwrap();
            writer.write_sample(-8_000i16).unwrap();
        }
        writer.finalize().unwrap();

        let (samples, _) = read_wav_mono(&path).unwrap();
        assert_eq!(samples.len(), 100);
        assert!(samples.iter().all(|s| s.abs() < 1e-3));
    }

    #[test]
    fn missing_file_is_a_wave_error() {
        let err = read_wav_mono(Path::new("/nonexistent/clip.wav")).unwrap_err();
        assert_eq!(err.class(), rr_domain::error::ErrorClass::WaveError);
    }
}
