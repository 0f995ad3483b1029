//! Scope accumulation: per-channel histograms, a luma histogram, and a
//! per-column waveform
//!
//! Workers accumulate rows into their own partials; the dispatcher merges
//! after the barrier so no bin is ever contended.

use crate::matrix::LUMA_709;
use crate::row::RowView;

const BINS: usize = 256;

/// Histogram and waveform accumulator
#[derive(Clone)]
pub struct Scopes {
    /// Per-channel histograms over the 8-bit range
    pub rgb: [[u32; BINS]; 3],
    /// Rec.709 luma histogram
    pub luma: [u32; BINS],
    waveform_sum: Vec<u64>,
    rows: u64,
}

impl Scopes {
    /// Accumulator for frames of `width` pixels
    pub fn new(width: usize) -> Self {
        Self {
            rgb: [[0; BINS]; 3],
            luma: [0; BINS],
            waveform_sum: vec![0; width],
            rows: 0,
        }
    }

    /// Accumulate one packed row
    pub fn accumulate_row(&mut self, row: &RowView<'_>) {
        let channels = row.channels;
        for (x, px) in row.samples.chunks_exact(channels).enumerate() {
            let mut bins = [0usize; 3];
            for ch in 0..3 {
                let v = crate::pack::sample_bin(px[ch], row.white_point);
                bins[ch] = v;
                self.rgb[ch][v] += 1;
            }
            let luma = LUMA_709[0] * bins[0] as f32
                + LUMA_709[1] * bins[1] as f32
                + LUMA_709[2] * bins[2] as f32;
            let luma = ((luma + 0.5) as usize).min(BINS - 1);
            self.luma[luma] += 1;
            if let Some(col) = self.waveform_sum.get_mut(x) {
                *col += luma as u64;
            }
        }
        self.rows += 1;
    }

    /// Fold another worker's partial into this one
    pub fn merge(&mut self, other: &Scopes) {
        for ch in 0..3 {
            for (a, b) in self.rgb[ch].iter_mut().zip(&other.rgb[ch]) {
                *a += b;
            }
        }
        for (a, b) in self.luma.iter_mut().zip(&other.luma) {
            *a += b;
        }
        for (a, b) in self.waveform_sum.iter_mut().zip(&other.waveform_sum) {
            *a += b;
        }
        self.rows += other.rows;
    }

    /// Mean luma level per column
    pub fn waveform(&self) -> Vec<u8> {
        let rows = self.rows.max(1);
        self.waveform_sum
            .iter()
            .map(|&sum| (sum / rows).min(255) as u8)
            .collect()
    }

    /// Total samples counted (per channel)
    pub fn total(&self) -> u64 {
        self.rgb[0].iter().map(|&v| v as u64).sum()
    }
}
