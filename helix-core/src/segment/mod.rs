//! 阈值分割. 由标量场生成二值掩码.
//!
//! 分割只通过 [`Segmenter`] 这一个方法的边界暴露. 目前的实现都是统计学占位规则,
//! 将来基于模型的分割可以直接替换进来, 调用方无需改动.
//! 任何 `Fn(&ScalarField) -> Mask` 闭包也都是 [`Segmenter`].

mod otsu;

pub use otsu::{otsu_threshold, OtsuSegmenter};

use crate::consts::DEFAULT_SEGMENT_PERCENTILE;
use crate::normalize::{normalize, percentile, NormalizeMode};
use crate::{Mask, ScalarField, VolumeError, VolumeResult};

/// 由标量场生成二值掩码的策略.
///
/// 输出掩码必须与输入标量场形状一致; [`crate::Pipeline`] 会检查这一点.
/// 全背景掩码是合法结果.
pub trait Segmenter {
    /// 对 `field` 做分割.
    fn segment(&self, field: &ScalarField) -> VolumeResult<Mask>;
}

impl<F> Segmenter for F
where
    F: Fn(&ScalarField) -> Mask,
{
    #[inline]
    fn segment(&self, field: &ScalarField) -> VolumeResult<Mask> {
        Ok(self(field))
    }
}

/// 百分位阈值分割: 先 min-max 归一化, 再将严格高于第 `percentile`
/// 百分位值的体素标记为前景.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PercentileSegmenter {
    percentile: f64,
}

impl Default for PercentileSegmenter {
    #[inline]
    fn default() -> Self {
        Self {
            percentile: DEFAULT_SEGMENT_PERCENTILE,
        }
    }
}

impl PercentileSegmenter {
    /// 构建分割器. `percentile` 必须位于 \[0, 100\], 否则返回 `Err`.
    pub fn new(percentile: f64) -> VolumeResult<Self> {
        if (0.0..=100.0).contains(&percentile) {
            Ok(Self { percentile })
        } else {
            Err(VolumeError::InvalidPercentile(percentile))
        }
    }

    /// 百分位阈值.
    #[inline]
    pub fn percentile(&self) -> f64 {
        self.percentile
    }
}

impl Segmenter for PercentileSegmenter {
    fn segment(&self, field: &ScalarField) -> VolumeResult<Mask> {
        let normalized = normalize(field, NormalizeMode::MinMax)?;
        // 归一化之后全部为有限值, 因此百分位一定存在.
        let Some(threshold) = percentile(normalized.iter(), self.percentile)? else {
            return Ok(Mask::from_field(&normalized, |_| false));
        };
        let mask = Mask::from_field(&normalized, |v| v > threshold);
        report("百分位", threshold, &mask);
        Ok(mask)
    }
}

/// 记录分割结果.
pub(crate) fn report(rule: &str, threshold: f32, mask: &Mask) {
    let count = mask.count();
    if count == 0 {
        log::warn!("{rule}分割结果为空掩码 (阈值 {threshold})");
    } else {
        log::debug!("{rule}分割: 阈值 {threshold}, 前景体素 {count} 个");
    }
}

/// 以默认占位规则分割: 归一化后严格高于第 `percentile_threshold` 百分位值的体素为前景.
///
/// `percentile_threshold` 不在 \[0, 100\] 内时返回 `Err`. 结果可能是全背景掩码.
#[inline]
pub fn segment(field: &ScalarField, percentile_threshold: f64) -> VolumeResult<Mask> {
    PercentileSegmenter::new(percentile_threshold)?.segment(field)
}

#[cfg(test)]
mod tests {
    use super::{segment, PercentileSegmenter, Segmenter};
    use crate::{Mask, ScalarField, VolumeError};

    fn single_bright_voxel() -> ScalarField {
        ScalarField::from_shape_fn((4, 4, 4), |p| if p == (1, 2, 1) { 10.0 } else { 0.0 }).unwrap()
    }

    #[test]
    fn test_single_voxel_segmentation() {
        let field = single_bright_voxel();
        let mask = segment(&field, 99.2).unwrap();
        assert_eq!(mask.shape(), (4, 4, 4));
        assert_eq!(mask.positions(), vec![(1, 2, 1)]);
    }

    #[test]
    fn test_constant_field_yields_empty_mask() {
        let field = ScalarField::from_shape_fn((5, 5, 5), |_| 7.0).unwrap();
        let mask = segment(&field, 99.2).unwrap();
        assert!(mask.is_empty());
    }

    #[test]
    fn test_threshold_scales_with_percentile() {
        let ramp = |(x, y, z): (usize, usize, usize)| (x * 100 + y * 10 + z) as f32;
        let field = ScalarField::from_shape_fn((10, 10, 10), ramp).unwrap();
        let loose = segment(&field, 50.0).unwrap().count();
        let tight = segment(&field, 90.0).unwrap().count();
        assert_eq!(loose, 500);
        assert_eq!(tight, 100);
        assert!(segment(&field, 100.0).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_percentile() {
        let field = single_bright_voxel();
        assert_eq!(
            segment(&field, 100.5).unwrap_err(),
            VolumeError::InvalidPercentile(100.5)
        );
        assert!(PercentileSegmenter::new(-1.0).is_err());
    }

    #[test]
    fn test_closure_is_segmenter() {
        fn run(s: &dyn Segmenter, field: &ScalarField) -> Mask {
            s.segment(field).unwrap()
        }

        let field = single_bright_voxel();
        let everything = |f: &ScalarField| Mask::from_field(f, |_| true);
        assert_eq!(run(&everything, &field).count(), 64);
        assert_eq!(run(&PercentileSegmenter::default(), &field).count(), 1);
    }
}
