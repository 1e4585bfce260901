//! The decomposition pipeline: speech clip in, per-slot wave tracks out.
//!
//! 1. Load the clip, downmix, resample to the processing rate.
//! 2. Track the pitch contour f0(t) (C2-C7, unvoiced frames bridged).
//! 3. Short-time Fourier transform; per harmonic `k`, take the magnitude
//!    envelope at the bin nearest `k·f0(t)`.
//! 4. Remap the contour into each target slot's band, preserving relative
//!    pitch.
//! 5. Synthesise `wave_k(t) = A_k(t) · cos(2π ∫ f_mapped)` per target.
//! 6. Match the summed waves to the source envelope with a windowed-RMS
//!    gain curve.
//! 7. Write each track as `…_v3_wave<k>.wav`.
//!
//! The wall-clock deadline is checked between stages; a thread cannot be
//! killed, so an overrunning job can exceed it by at most one stage.

use std::path::Path;
use std::time::Instant;

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use rr_domain::error::{Error, Result};
use rr_domain::slot::TurnIndex;
use rr_domain::wave::{FreqRange, WaveJob, WaveTrack};

use crate::pitch::{self, PitchTrack};
use crate::resample::resample;
use crate::wav::{read_wav_mono, write_wav_mono};

const FRAME_LEN: usize = 512;
const HOP: usize = 128;

/// Gain analysis window: 50 ms.
const GAIN_WINDOW_MS: u32 = 50;

/// Run the full decomposition for one job.
///
/// `artifacts_root` is only used to compute artifact-relative paths for
/// the result payload.
pub fn decompose_clip(
    job: &WaveJob,
    processing_sr: u32,
    deadline: Instant,
    artifacts_root: &Path,
) -> Result<Vec<WaveTrack>> {
    // ── Stage 1: load + resample ───────────────────────────────────
    let (raw, source_sr) = read_wav_mono(&job.source_audio_path)?;
    let samples = resample(&raw, source_sr, processing_sr)?;
    if samples.len() < FRAME_LEN {
        return Err(Error::Wave(format!(
            "clip too short: {} samples at {processing_sr} Hz",
            samples.len()
        )));
    }
    check_deadline(deadline, "resample")?;

    // ── Stage 2: pitch contour ─────────────────────────────────────
    let track = pitch::track_f0(&samples, processing_sr, FRAME_LEN, HOP);
    let contour_range = track.voiced_range().unwrap_or((pitch::F_MIN_HZ, pitch::F_MIN_HZ));
    check_deadline(deadline, "pitch")?;

    // ── Stage 3: STFT magnitudes ───────────────────────────────────
    let spectra = stft_magnitudes(&samples);
    check_deadline(deadline, "stft")?;

    // ── Stage 4+5: per-target synthesis ────────────────────────────
    let bin_hz = processing_sr as f32 / FRAME_LEN as f32;
    let mut waves: Vec<Vec<f32>> = Vec::with_capacity(job.slot_freq_targets.len());
    for (wave_num, _slot, band) in &job.slot_freq_targets {
        let envelope = harmonic_envelope(&spectra, &track, *wave_num as usize, bin_hz);
        let wave = synthesise(
            samples.len(),
            processing_sr,
            &track,
            &envelope,
            contour_range,
            *band,
        );
        waves.push(wave);
        check_deadline(deadline, "synthesis")?;
    }

    // ── Stage 6: gain matching ─────────────────────────────────────
    let window = (processing_sr * GAIN_WINDOW_MS / 1_000) as usize;
    apply_gain_match(&samples, &mut waves, window);

    // ── Stage 7: write tracks ──────────────────────────────────────
    std::fs::create_dir_all(&job.output_dir).map_err(Error::Io)?;
    let basename = job
        .source_audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip".into());
    let prefix = if job.turn_index == TurnIndex::Summary {
        "summary_"
    } else {
        ""
    };

    let n_tracks = waves.len();
    let mut tracks = Vec::with_capacity(n_tracks);
    for ((wave_num, slot, band), wave) in job.slot_freq_targets.iter().zip(&waves) {
        let filename = format!("{prefix}{basename}_v3_wave{wave_num}.wav");
        let out_path = job.output_dir.join(filename);
        write_wav_mono(&out_path, wave, processing_sr)?;

        let rmse = envelope_rmse(&samples, wave, n_tracks, window);
        let rel_path = out_path
            .strip_prefix(artifacts_root)
            .unwrap_or(&out_path)
            .to_string_lossy()
            .replace('\\', "/");

        tracks.push(WaveTrack {
            wave_num: *wave_num,
            target_slot_id: *slot,
            abs_path: out_path.to_string_lossy().into_owned(),
            rel_path,
            freq_range_hz: *band,
            rmse,
        });
    }

    Ok(tracks)
}

fn check_deadline(deadline: Instant, stage: &str) -> Result<()> {
    if Instant::now() >= deadline {
        Err(Error::Wave(format!("wave_timeout after {stage}")))
    } else {
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// STFT
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hann-windowed magnitude spectra, one `FRAME_LEN/2 + 1` row per hop.
/// Magnitudes are normalised so a full-scale sinusoid at a bin centre
/// reads ~1.0.
fn stft_magnitudes(samples: &[f32]) -> Vec<Vec<f32>> {
    let window: Vec<f32> = (0..FRAME_LEN)
        .map(|i| {
            let x = std::f32::consts::TAU * i as f32 / FRAME_LEN as f32;
            0.5 * (1.0 - x.cos())
        })
        .collect();
    let window_sum: f32 = window.iter().sum();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FRAME_LEN);

    let n_frames = (samples.len() - FRAME_LEN) / HOP + 1;
    let mut spectra = Vec::with_capacity(n_frames);
    let mut buf = vec![Complex::new(0.0f32, 0.0); FRAME_LEN];

    for f in 0..n_frames {
        let frame = &samples[f * HOP..f * HOP + FRAME_LEN];
        for (i, (s, w)) in frame.iter().zip(&window).enumerate() {
            buf[i] = Complex::new(s * w, 0.0);
        }
        fft.process(&mut buf);

        let mags: Vec<f32> = buf[..FRAME_LEN / 2 + 1]
            .iter()
            .map(|c| c.norm() * 2.0 / window_sum)
            .collect();
        spectra.push(mags);
    }

    spectra
}

/// Amplitude envelope of harmonic `k`: the magnitude at the bin nearest
/// `k·f0(t)` per frame. Harmonics above Nyquist fade to zero.
fn harmonic_envelope(
    spectra: &[Vec<f32>],
    track: &PitchTrack,
    harmonic: usize,
    bin_hz: f32,
) -> Vec<f32> {
    let n_bins = spectra.first().map(|s| s.len()).unwrap_or(0);
    spectra
        .iter()
        .enumerate()
        .map(|(f, mags)| {
            let f0 = track.f0_at(f as f32);
            let bin = (harmonic as f32 * f0 / bin_hz).round() as usize;
            if bin == 0 || bin >= n_bins {
                0.0
            } else {
                mags[bin]
            }
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Synthesis
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Linearly rescale one pitch value from the observed contour range into
/// the slot band. A flat contour maps to the band centre.
fn map_to_band(f0: f32, contour: (f32, f32), band: FreqRange) -> f32 {
    let (lo, hi) = contour;
    let span = hi - lo;
    if span < 1.0 {
        return (band.low_hz + band.high_hz) / 2.0;
    }
    let t = ((f0 - lo) / span).clamp(0.0, 1.0);
    band.low_hz + t * (band.high_hz - band.low_hz)
}

/// Phase-integrated cosine synthesis following the remapped contour and
/// the harmonic envelope.
fn synthesise(
    n_samples: usize,
    sample_rate: u32,
    track: &PitchTrack,
    envelope: &[f32],
    contour_range: (f32, f32),
    band: FreqRange,
) -> Vec<f32> {
    let sr = sample_rate as f32;
    let last_frame = envelope.len().saturating_sub(1) as f32;
    let mut phase = 0.0f32;
    let mut out = Vec::with_capacity(n_samples);

    for i in 0..n_samples {
        let frame_pos = (i as f32 / HOP as f32).min(last_frame);
        let f_mapped = map_to_band(track.f0_at(frame_pos), contour_range, band);
        phase += std::f32::consts::TAU * f_mapped / sr;
        if phase > std::f32::consts::TAU {
            phase -= std::f32::consts::TAU;
        }
        out.push(env_at(envelope, frame_pos) * phase.cos());
    }

    out
}

fn env_at(envelope: &[f32], frame_pos: f32) -> f32 {
    if envelope.is_empty() {
        return 0.0;
    }
    let last = envelope.len() - 1;
    let lo = (frame_pos.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    let frac = (frame_pos - lo as f32).clamp(0.0, 1.0);
    envelope[lo] * (1.0 - frac) + envelope[hi] * frac
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Gain matching & metrics
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Scale the wave set, window by window, so the RMS of their sum tracks
/// the RMS of the source. The gain curve is linearly interpolated between
/// window centres to avoid zipper artifacts.
fn apply_gain_match(source: &[f32], waves: &mut [Vec<f32>], window: usize) {
    if waves.is_empty() || window == 0 {
        return;
    }
    let n = source.len();
    let n_windows = n.div_ceil(window);

    let mut gains = Vec::with_capacity(n_windows);
    for w in 0..n_windows {
        let start = w * window;
        let end = (start + window).min(n);
        let src_rms = rms(&source[start..end]);
        let sum_sq: f32 = (start..end)
            .map(|i| {
                let s: f32 = waves.iter().map(|wv| wv[i]).sum();
                s * s
            })
            .sum();
        let sum_rms = (sum_sq / (end - start) as f32).sqrt();
        gains.push((src_rms / (sum_rms + 1e-6)).clamp(0.0, 10.0));
    }

    for wave in waves.iter_mut() {
        for (i, sample) in wave.iter_mut().enumerate() {
            *sample *= gain_at(&gains, i, window);
        }
    }
}

fn gain_at(gains: &[f32], i: usize, window: usize) -> f32 {
    let pos = i as f32 / window as f32 - 0.5;
    if pos <= 0.0 {
        return gains[0];
    }
    let last = gains.len() - 1;
    let lo = (pos.floor() as usize).min(last);
    let hi = (lo + 1).min(last);
    let frac = pos - lo as f32;
    gains[lo] * (1.0 - frac) + gains[hi] * frac.clamp(0.0, 1.0)
}

fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Envelope-tracking error of one track: RMS deviation of its windowed
/// envelope from an equal share of the source envelope.
fn envelope_rmse(source: &[f32], wave: &[f32], n_tracks: usize, window: usize) -> f32 {
    if window == 0 || source.is_empty() {
        return 0.0;
    }
    let n = source.len().min(wave.len());
    let n_windows = n.div_ceil(window);
    let share = 1.0 / n_tracks.max(1) as f32;

    let mut acc = 0.0f32;
    for w in 0..n_windows {
        let start = w * window;
        let end = (start + window).min(n);
        let d = rms(&wave[start..end]) - rms(&source[start..end]) * share;
        acc += d * d;
    }
    (acc / n_windows as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_domain::slot::SlotId;
    use std::f32::consts::TAU;
    use std::time::Duration;

    fn slot(n: u8) -> SlotId {
        SlotId::new(n).unwrap()
    }

    fn band(lo: f32, hi: f32) -> FreqRange {
        FreqRange {
            low_hz: lo,
            high_hz: hi,
        }
    }

    /// A voiced-like test tone: fundamental plus a strong second harmonic,
    /// so every extracted envelope carries real energy.
    fn write_tone(path: &Path, freq: f32, sr: u32, seconds: f32) {
        let samples: Vec<f32> = (0..(sr as f32 * seconds) as usize)
            .map(|i| {
                let t = i as f32 / sr as f32;
                (TAU * freq * t).sin() * 0.5 + (TAU * 2.0 * freq * t).sin() * 0.25
            })
            .collect();
        write_wav_mono(path, &samples, sr).unwrap();
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(60)
    }

    #[test]
    fn flat_contour_maps_to_band_centre() {
        assert!((map_to_band(300.0, (300.0, 300.0), band(20.0, 40.0)) - 30.0).abs() < 1e-3);
    }

    #[test]
    fn contour_extremes_map_to_band_edges() {
        let b = band(80.0, 100.0);
        assert!((map_to_band(100.0, (100.0, 400.0), b) - 80.0).abs() < 1e-3);
        assert!((map_to_band(400.0, (100.0, 400.0), b) - 100.0).abs() < 1e-3);
        // Out-of-range input clamps into the band.
        assert!((map_to_band(500.0, (100.0, 400.0), b) - 100.0).abs() < 1e-3);
    }

    #[test]
    fn gain_match_tracks_source_level() {
        let n = 4_000;
        let source: Vec<f32> = (0..n)
            .map(|i| (TAU * 200.0 * i as f32 / 8_000.0).sin() * 0.4)
            .collect();
        let mut waves = vec![
            (0..n)
                .map(|i| (TAU * 30.0 * i as f32 / 8_000.0).cos() * 0.01)
                .collect::<Vec<f32>>(),
        ];
        apply_gain_match(&source, &mut waves, 400);

        let sum_rms = rms(&waves[0]);
        let src_rms = rms(&source);
        assert!(
            (sum_rms - src_rms).abs() / src_rms < 0.25,
            "sum rms {sum_rms} vs source {src_rms}"
        );
    }

    #[test]
    fn decompose_produces_in_band_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.wav");
        write_tone(&clip, 440.0, 22_050, 0.6);

        let job = WaveJob::new(
            "sid".into(),
            TurnIndex::Respond,
            slot(3),
            clip,
            dir.path().join("out"),
        );
        let tracks = decompose_clip(&job, 8_000, far_deadline(), dir.path()).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].target_slot_id, slot(3));
        assert_eq!(tracks[1].target_slot_id, slot(4));

        for track in &tracks {
            let path = Path::new(&track.abs_path);
            assert!(path.exists(), "{} missing", track.abs_path);
            assert!(track.abs_path.ends_with(&format!("_v3_wave{}.wav", track.wave_num)));
            assert!(track.rel_path.starts_with("out/"));

            // A steady tone maps to the band centre; count zero crossings
            // to confirm the synthesised frequency landed in the band.
            let (samples, sr) = read_wav_mono(path).unwrap();
            let crossings = samples
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            let est_hz = crossings as f32 * sr as f32 / (2.0 * samples.len() as f32);
            assert!(
                est_hz >= track.freq_range_hz.low_hz - 5.0
                    && est_hz <= track.freq_range_hz.high_hz + 5.0,
                "wave {} estimated {est_hz} Hz, band {:?}",
                track.wave_num,
                track.freq_range_hz
            );
        }
    }

    #[test]
    fn summary_jobs_write_six_prefixed_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("summary_clip.wav");
        write_tone(&clip, 300.0, 8_000, 0.5);

        let job = WaveJob::new(
            "sid".into(),
            TurnIndex::Summary,
            slot(1),
            clip,
            dir.path().join("out"),
        );
        let tracks = decompose_clip(&job, 8_000, far_deadline(), dir.path()).unwrap();
        assert_eq!(tracks.len(), 6);
        for (i, track) in tracks.iter().enumerate() {
            assert_eq!(track.target_slot_id, slot(i as u8 + 1));
            assert!(track
                .abs_path
                .rsplit('/')
                .next()
                .unwrap()
                .starts_with("summary_"));
        }
    }

    #[test]
    fn expired_deadline_fails_with_wave_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let clip = dir.path().join("clip.wav");
        write_tone(&clip, 440.0, 8_000, 0.5);

        let job = WaveJob::new(
            "sid".into(),
            TurnIndex::Respond,
            slot(1),
            clip,
            dir.path().join("out"),
        );
        let err = decompose_clip(&job, 8_000, Instant::now(), dir.path()).unwrap_err();
        assert!(err.to_string().contains("wave_timeout"));
    }
}
