//! Otsu 自动阈值.

use super::{report, Segmenter};
use crate::consts::OTSU_BINS;
use crate::normalize::{normalize, NormalizeMode};
use crate::{Mask, ScalarField, VolumeResult};

/// Otsu 方法: 在 `bins` 个桶的直方图上寻找使类间方差最大的阈值.
///
/// 返回值是最优背景桶的 **上边缘**, 因此 `v > threshold` 恰好选出前景类.
/// 非有限值被忽略. 不存在有限值时返回 `None`; 常值序列返回该常值本身.
pub fn otsu_threshold(values: &[f32], bins: usize) -> Option<f32> {
    let bins = bins.max(1);
    let (min_val, max_val) = values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<(f32, f32)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;

    if max_val <= min_val {
        return Some(min_val);
    }

    let (min_val, max_val) = (min_val as f64, max_val as f64);
    let bin_width = (max_val - min_val) / bins as f64;
    let mut histogram = vec![0u64; bins];
    for v in values.iter().filter(|v| v.is_finite()) {
        let bin = ((*v as f64 - min_val) / bin_width).floor() as usize;
        histogram[bin.min(bins - 1)] += 1;
    }

    let total: f64 = histogram.iter().sum::<u64>() as f64;
    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0.0;
    let mut max_variance = 0.0;
    let mut best = 0usize;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count as f64;
        if weight_background == 0.0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0.0 {
            break;
        }
        sum_background += t as f64 * count as f64;

        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_total - sum_background) / weight_foreground;
        let variance =
            weight_background * weight_foreground * (mean_background - mean_foreground).powi(2);

        if variance > max_variance {
            max_variance = variance;
            best = t;
        }
    }

    Some((min_val + (best + 1) as f64 * bin_width) as f32)
}

/// Otsu 阈值分割: 先 min-max 归一化, 再将严格高于 Otsu 阈值的体素标记为前景.
///
/// 与 [`super::PercentileSegmenter`] 一样只是占位规则, 但不需要人为给定百分位.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OtsuSegmenter {
    bins: usize,
}

impl Default for OtsuSegmenter {
    #[inline]
    fn default() -> Self {
        Self { bins: OTSU_BINS }
    }
}

impl OtsuSegmenter {
    /// 以 `bins` 个直方图桶构建分割器. `bins` 为 0 时按 1 处理.
    #[inline]
    pub fn with_bins(bins: usize) -> Self {
        Self { bins: bins.max(1) }
    }
}

impl Segmenter for OtsuSegmenter {
    fn segment(&self, field: &ScalarField) -> VolumeResult<Mask> {
        let normalized = normalize(field, NormalizeMode::MinMax)?;
        let values = normalized.finite_values();
        let threshold = otsu_threshold(&values, self.bins).unwrap_or(f32::INFINITY);
        let mask = Mask::from_field(&normalized, |v| v > threshold);
        report("Otsu ", threshold, &mask);
        Ok(mask)
    }
}
