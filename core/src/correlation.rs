//! FFT-based cross-correlation against a fixed template
//!
//! The frontdoor detector correlates windows of one fixed length against one
//! fixed template, so the FFT plans and the template spectrum are computed
//! once and reused for every window.
//!
//! Output follows the "valid" convention of `scipy.signal.correlate`: index `i`
//! is the dot product of the template with `signal[i..i + template.len()]`,
//! and there are `signal.len() - template.len() + 1` outputs.

use crate::error::{ChirpError, Result};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

pub struct Correlator {
    signal_len: usize,
    template_len: usize,
    fft_size: usize,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    template_spectrum: Vec<Complex<f32>>,
    time_buffer: Vec<f32>,
    spectrum_buffer: Vec<Complex<f32>>,
}

impl Correlator {
    /// Prepare a correlator for windows of exactly `signal_len` samples
    pub fn new(template: &[f32], signal_len: usize) -> Result<Self> {
        if template.is_empty() || signal_len < template.len() {
            return Err(ChirpError::InvalidInputSize);
        }

        let output_len = signal_len + template.len() - 1;
        let fft_size = output_len.next_power_of_two();

        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        // Time-reversing the template turns convolution into correlation
        let mut padded_template = vec![0.0; fft_size];
        for (i, &val) in template.iter().rev().enumerate() {
            padded_template[i] = val;
        }

        let mut template_spectrum = r2c.make_output_vec();
        r2c.process(&mut padded_template, &mut template_spectrum)
            .map_err(|e| ChirpError::FftError(format!("forward FFT of template failed: {:?}", e)))?;

        let time_buffer = r2c.make_input_vec();
        let spectrum_buffer = r2c.make_output_vec();

        Ok(Self {
            signal_len,
            template_len: template.len(),
            fft_size,
            r2c,
            c2r,
            template_spectrum,
            time_buffer,
            spectrum_buffer,
        })
    }

    pub fn signal_len(&self) -> usize {
        self.signal_len
    }

    pub fn template_len(&self) -> usize {
        self.template_len
    }

    /// Correlate one window, returning `signal_len - template_len + 1` values
    pub fn correlate(&mut self, signal: &[f32]) -> Result<Vec<f32>> {
        if signal.len() != self.signal_len {
            return Err(ChirpError::InvalidInputSize);
        }

        self.time_buffer.fill(0.0);
        self.time_buffer[..signal.len()].copy_from_slice(signal);

        self.r2c
            .process(&mut self.time_buffer, &mut self.spectrum_buffer)
            .map_err(|e| ChirpError::FftError(format!("forward FFT of signal failed: {:?}", e)))?;

        for (bin, template_bin) in self.spectrum_buffer.iter_mut().zip(self.template_spectrum.iter()) {
            *bin *= *template_bin;
        }

        // DC and Nyquist bins of a real signal carry no imaginary part
        if let Some(first) = self.spectrum_buffer.first_mut() {
            first.im = 0.0;
        }
        if let Some(last) = self.spectrum_buffer.last_mut() {
            last.im = 0.0;
        }

        self.c2r
            .process(&mut self.spectrum_buffer, &mut self.time_buffer)
            .map_err(|e| ChirpError::FftError(format!("inverse FFT failed: {:?}", e)))?;

        let normalization = self.fft_size as f32;
        let valid_len = self.signal_len - self.template_len + 1;
        let start = self.template_len - 1;

        Ok(self.time_buffer[start..start + valid_len]
            .iter()
            .map(|x| x / normalization)
            .collect())
    }
}
