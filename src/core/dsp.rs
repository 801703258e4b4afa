//! Butterworth bandpass design and application in second-order sections.
//!
//! Design path is the classic chain: analog lowpass prototype, lowpass to
//! bandpass transform, bilinear transform, one biquad per digital pole pair.
//! SOS form keeps the cascaded 4th-order filter stable over long signals
//! where a single 8th-order polynomial would not be.

use std::f64::consts::PI;

use crate::error::{Result, UnmixError};

/// Fixed design order. Steeper roll-off costs phase distortion and ringing;
/// order 4 is the compromise the drum band table was tuned against.
pub const FILTER_ORDER: usize = 4;

/// Normalized high edges are clamped to this fraction of Nyquist; a digital
/// design at or above 1.0 is invalid.
const NYQUIST_MARGIN: f64 = 0.99;

/// One second-order section, coefficients normalized so a0 = 1.
#[derive(Clone, Copy, Debug)]
pub struct Sos {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn from_polar(r: f64, theta: f64) -> Self {
        Self::new(r * theta.cos(), r * theta.sin())
    }

    fn add(self, o: Self) -> Self {
        Self::new(self.re + o.re, self.im + o.im)
    }

    fn sub(self, o: Self) -> Self {
        Self::new(self.re - o.re, self.im - o.im)
    }

    fn mul(self, o: Self) -> Self {
        Self::new(
            self.re * o.re - self.im * o.im,
            self.re * o.im + self.im * o.re,
        )
    }

    fn scale(self, k: f64) -> Self {
        Self::new(self.re * k, self.im * k)
    }

    fn div(self, o: Self) -> Self {
        let d = o.norm_sqr();
        Self::new(
            (self.re * o.re + self.im * o.im) / d,
            (self.im * o.re - self.re * o.im) / d,
        )
    }

    fn sqrt(self) -> Self {
        let r = (self.re * self.re + self.im * self.im).sqrt();
        let theta = self.im.atan2(self.re);
        Self::from_polar(r.sqrt(), theta / 2.0)
    }

    fn norm_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }
}

/// Design a 4th-order Butterworth bandpass for `low_hz..high_hz` at the
/// given sample rate, returned as four second-order sections.
///
/// The high edge is clamped below Nyquist first; if the clamped band is
/// empty or the low edge is not positive, the request is rejected rather
/// than degenerating into a zero-width filter.
pub fn design_bandpass(sample_rate: u32, low_hz: f64, high_hz: f64) -> Result<Vec<Sos>> {
    if sample_rate == 0 {
        return Err(UnmixError::InvalidParameter("sample rate 0".into()));
    }

    let nyquist = sample_rate as f64 / 2.0;
    let low_norm = low_hz / nyquist;
    let high_norm = (high_hz / nyquist).min(NYQUIST_MARGIN);

    if !(low_norm > 0.0 && low_norm < high_norm) {
        return Err(UnmixError::InvalidBand {
            low_hz,
            high_hz,
            sample_rate,
        });
    }

    // Bilinear transform constant; normalized design runs at fs = 2.
    let fs2 = 4.0;

    // Pre-warp the band edges so the digital response hits them exactly.
    let warped_low = fs2 * (PI * low_norm / 2.0).tan();
    let warped_high = fs2 * (PI * high_norm / 2.0).tan();
    let bw = warped_high - warped_low;
    let w0 = (warped_low * warped_high).sqrt();

    // Upper-half-plane poles of the order-4 Butterworth lowpass prototype.
    // Their conjugates are implied and pair up into the biquad denominators.
    let half = FILTER_ORDER / 2;
    let mut analog_poles: Vec<Complex> = Vec::with_capacity(FILTER_ORDER);
    for m in 0..half {
        let theta = PI * (2.0 * (m as f64 + 1.0) + FILTER_ORDER as f64 - 1.0)
            / (2.0 * FILTER_ORDER as f64);
        let proto = Complex::from_polar(1.0, theta);

        // Lowpass to bandpass: each prototype pole splits into two.
        let shifted = proto.scale(bw / 2.0);
        let disc = shifted
            .mul(shifted)
            .sub(Complex::new(w0 * w0, 0.0))
            .sqrt();
        analog_poles.push(shifted.add(disc));
        analog_poles.push(shifted.sub(disc));
    }

    // Overall gain: H(s) = bw^N s^N / D(s). The bilinear substitution maps
    // the N zeros at s=0 onto z=1 and the N zeros at infinity onto z=-1,
    // leaving the scalar below. |fs2 - p|^2 covers each conjugate pair.
    let mut denom = 1.0;
    for p in &analog_poles {
        denom *= Complex::new(fs2, 0.0).sub(*p).norm_sqr();
    }
    let gain = bw.powi(FILTER_ORDER as i32) * fs2.powi(FILTER_ORDER as i32) / denom;
    // Spread the gain across sections so no stage clips or underflows.
    let section_gain = gain.powf(1.0 / FILTER_ORDER as f64);

    let sos = analog_poles
        .iter()
        .map(|&p| {
            let z = Complex::new(fs2, 0.0).add(p).div(Complex::new(fs2, 0.0).sub(p));
            Sos {
                // numerator (z - 1)(z + 1), scaled
                b0: section_gain,
                b1: 0.0,
                b2: -section_gain,
                a1: -2.0 * z.re,
                a2: z.norm_sqr(),
            }
        })
        .collect();

    Ok(sos)
}

/// Single forward pass of an SOS cascade over one channel, zero initial
/// state, transposed direct form II per section.
pub fn sosfilt(sos: &[Sos], input: &[f32]) -> Vec<f32> {
    let mut state = vec![[0.0f64; 2]; sos.len()];
    input
        .iter()
        .map(|&x| {
            let mut acc = x as f64;
            for (s, z) in sos.iter().zip(state.iter_mut()) {
                let y = s.b0 * acc + z[0];
                z[0] = s.b1 * acc - s.a1 * y + z[1];
                z[1] = s.b2 * acc - s.a2 * y;
                acc = y;
            }
            acc as f32
        })
        .collect()
}

/// Apply one filter independently to every channel of an interleaved buffer.
///
/// Channels are never mixed; each runs its own filter state. Output length
/// and layout always equal the input's.
pub fn filter_channels(sos: &[Sos], samples: &[f32], channels: u16) -> Vec<f32> {
    let ch = channels.max(1) as usize;
    if ch == 1 {
        return sosfilt(sos, samples);
    }

    let mut state = vec![vec![[0.0f64; 2]; sos.len()]; ch];
    samples
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let st = &mut state[i % ch];
            let mut acc = x as f64;
            for (s, z) in sos.iter().zip(st.iter_mut()) {
                let y = s.b0 * acc + z[0];
                z[0] = s.b1 * acc - s.a1 * y + z[1];
                z[1] = s.b2 * acc - s.a2 * y;
                acc = y;
            }
            acc as f32
        })
        .collect()
}

/// Interleaved to planar stereo, duplicating mono into both channels.
pub fn to_planar_stereo(interleaved: &[f32], channels: u16) -> Vec<[f32; 2]> {
    if channels == 1 {
        interleaved.iter().map(|&x| [x, x]).collect()
    } else {
        let ch = channels as usize;
        interleaved
            .chunks_exact(ch)
            .map(|frame| [frame[0], frame[1.min(ch - 1)]])
            .collect()
    }
}
