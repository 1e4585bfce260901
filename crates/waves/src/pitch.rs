//! Fundamental-frequency tracking over a speech clip.
//!
//! Frame-wise normalized autocorrelation constrained to the C2-C7 range.
//! Unvoiced frames are filled by interpolating between surrounding voiced
//! frames so downstream synthesis always has a contour to follow.

/// Lowest trackable pitch (C2).
pub const F_MIN_HZ: f32 = 65.41;
/// Highest trackable pitch (C7).
pub const F_MAX_HZ: f32 = 2_093.0;

/// Voicing decision threshold on the normalized autocorrelation peak.
const VOICING_THRESHOLD: f32 = 0.30;

/// One f0 estimate per analysis hop.
#[derive(Debug, Clone)]
pub struct PitchTrack {
    pub f0: Vec<f32>,
    pub voiced: Vec<bool>,
    pub frame_len: usize,
    pub hop: usize,
}

impl PitchTrack {
    /// f0 at a fractional frame position, linearly interpolated.
    pub fn f0_at(&self, frame_pos: f32) -> f32 {
        if self.f0.is_empty() {
            return F_MIN_HZ;
        }
        let last = self.f0.len() - 1;
        let lo = (frame_pos.floor() as usize).min(last);
        let hi = (lo + 1).min(last);
        let frac = frame_pos - lo as f32;
        self.f0[lo] * (1.0 - frac) + self.f0[hi] * frac.clamp(0.0, 1.0)
    }

    /// Observed contour range over voiced frames, `None` when fully
    /// unvoiced.
    pub fn voiced_range(&self) -> Option<(f32, f32)> {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut any = false;
        for (f, v) in self.f0.iter().zip(&self.voiced) {
            if *v {
                min = min.min(*f);
                max = max.max(*f);
                any = true;
            }
        }
        any.then_some((min, max))
    }
}

/// Track f0 over `samples` with the given frame length and hop.
pub fn track_f0(samples: &[f32], sample_rate: u32, frame_len: usize, hop: usize) -> PitchTrack {
    let sr = sample_rate as f32;
    // Lag bounds for the pitch search window.
    let min_lag = ((sr / F_MAX_HZ).floor() as usize).max(2);
    let max_lag = ((sr / F_MIN_HZ).ceil() as usize).min(frame_len - 1);

    let n_frames = if samples.len() >= frame_len {
        (samples.len() - frame_len) / hop + 1
    } else {
        0
    };

    let mut f0 = Vec::with_capacity(n_frames);
    let mut voiced = Vec::with_capacity(n_frames);

    for i in 0..n_frames {
        let frame = &samples[i * hop..i * hop + frame_len];
        match estimate_frame(frame, min_lag, max_lag) {
            Some(lag) => {
                f0.push(sr / lag);
                voiced.push(true);
            }
            None => {
                f0.push(0.0);
                voiced.push(false);
            }
        }
    }

    fill_unvoiced(&mut f0, &voiced);
    median_smooth(&mut f0, 5);

    PitchTrack {
        f0,
        voiced,
        frame_len,
        hop,
    }
}

/// Normalized autocorrelation over the lag search window; returns the
/// refined lag of the best peak, or `None` for unvoiced frames.
fn estimate_frame(frame: &[f32], min_lag: usize, max_lag: usize) -> Option<f32> {
    let energy: f32 = frame.iter().map(|s| s * s).sum();
    if energy < 1e-6 {
        return None;
    }

    let mut best_lag = 0;
    let mut best_corr = 0.0f32;
    let mut corrs = vec![0.0f32; max_lag + 1];

    for lag in min_lag..=max_lag {
        let mut acc = 0.0f32;
        for i in 0..frame.len() - lag {
            acc += frame[i] * frame[i + lag];
        }
        let norm = acc / energy;
        corrs[lag] = norm;
        if norm > best_corr {
            best_corr = norm;
            best_lag = lag;
        }
    }

    if best_corr < VOICING_THRESHOLD || best_lag == 0 {
        return None;
    }

    // Parabolic refinement around the peak.
    let lag = if best_lag > min_lag && best_lag < max_lag {
        let (l, c, r) = (
            corrs[best_lag - 1],
            corrs[best_lag],
            corrs[best_lag + 1],
        );
        let denom = l - 2.0 * c + r;
        if denom.abs() > 1e-9 {
            best_lag as f32 + 0.5 * (l - r) / denom
        } else {
            best_lag as f32
        }
    } else {
        best_lag as f32
    };

    Some(lag)
}

/// Replace unvoiced stretches by interpolating between the voiced frames
/// on either side; edges hold the nearest voiced value.
fn fill_unvoiced(f0: &mut [f32], voiced: &[bool]) {
    let voiced_idx: Vec<usize> = voiced
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.then_some(i))
        .collect();
    if voiced_idx.is_empty() {
        for f in f0.iter_mut() {
            *f = F_MIN_HZ;
        }
        return;
    }

    for i in 0..f0.len() {
        if voiced[i] {
            continue;
        }
        let prev = voiced_idx.iter().rev().find(|&&v| v < i);
        let next = voiced_idx.iter().find(|&&v| v > i);
        f0[i] = match (prev, next) {
            (Some(&p), Some(&n)) => {
                let frac = (i - p) as f32 / (n - p) as f32;
                f0[p] * (1.0 - frac) + f0[n] * frac
            }
            (Some(&p), None) => f0[p],
            (None, Some(&n)) => f0[n],
            (None, None) => unreachable!("voiced_idx is non-empty"),
        };
    }
}

/// In-place odd-window median filter.
fn median_smooth(values: &mut [f32], window: usize) {
    if values.len() < window || window < 3 {
        return;
    }
    let half = window / 2;
    let source = values.to_vec();
    for i in half..values.len() - half {
        let mut neighborhood: Vec<f32> = source[i - half..=i + half].to_vec();
        neighborhood.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        values[i] = neighborhood[half];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn sine(freq: f32, sr: u32, seconds: f32) -> Vec<f32> {
        (0..(sr as f32 * seconds) as usize)
            .map(|i| (TAU * freq * i as f32 / sr as f32).sin() * 0.6)
            .collect()
    }

    #[test]
    fn tracks_a_steady_tone() {
        let samples = sine(220.0, 8_000, 0.5);
        let track = track_f0(&samples, 8_000, 512, 128);
        assert!(!track.f0.is_empty());
        let (min, max) = track.voiced_range().unwrap();
        assert!(min > 200.0 && max < 240.0, "range {min}..{max}");
    }

    #[test]
    fn silence_is_unvoiced_and_held() {
        let samples = vec![0.0f32; 4_096];
        let track = track_f0(&samples, 8_000, 512, 128);
        assert!(track.voiced.iter().all(|v| !v));
        // Fully unvoiced clips fall back to the bottom of the range.
        assert!(track.f0.iter().all(|&f| (f - F_MIN_HZ).abs() < 1e-3));
    }

    #[test]
    fn unvoiced_gap_interpolates() {
        let sr = 8_000;
        let mut samples = sine(300.0, sr, 0.25);
        samples.extend(std::iter::repeat(0.0f32).take(2_048));
        samples.extend(sine(300.0, sr, 0.25));
        let track = track_f0(&samples, sr, 512, 128);
        // The silent middle is bridged near the surrounding pitch.
        assert!(track.f0.iter().all(|&f| f > 250.0 && f < 350.0));
    }

    #[test]
    fn f0_at_interpolates_between_frames() {
        let track = PitchTrack {
            f0: vec![100.0, 200.0],
            voiced: vec![true, true],
            frame_len: 512,
            hop: 128,
        };
        assert!((track.f0_at(0.5) - 150.0).abs() < 1e-3);
        // Clamped past the end.
        assert!((track.f0_at(5.0) - 200.0).abs() < 1e-3);
    }

    #[test]
    fn median_smooth_removes_spikes() {
        let mut values = vec![100.0, 100.0, 900.0, 100.0, 100.0];
        median_smooth(&mut values, 5);
        assert!((values[2] - 100.0).abs() < 1e-3);
    }
}
