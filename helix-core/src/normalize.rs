//! 强度归一化. 将原始标量场重新缩放到 \[0, 1\].

use crate::consts::NORMALIZE_EPSILON;
use crate::data::window::check_percentile_pair;
use crate::{ScalarField, VolumeError, VolumeResult};
use ordered_float::OrderedFloat;

/// 归一化方式.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NormalizeMode {
    /// `(x - min) / (max - min + ε)`.
    MinMax,

    /// 先截断到第 `low` 与第 `high` 百分位之间, 再对截断后的范围做 min-max.
    /// 可以抑制极亮/极暗的离群体素主导对比度.
    Percentile {
        /// 下百分位, 位于 \[0, 100\].
        low: f64,
        /// 上百分位, 位于 \[0, 100\], 且必须大于 `low`.
        high: f64,
    },
}

impl Default for NormalizeMode {
    #[inline]
    fn default() -> Self {
        Self::MinMax
    }
}

/// 在 **已升序排列** 的非空序列上求第 `pct` 百分位值 (线性插值).
///
/// 秩为 `pct / 100 * (n - 1)`, 落在两个样本之间时按距离线性插值.
/// 调用方保证 `sorted` 非空且 `pct` 位于 \[0, 100\].
pub(crate) fn percentile_of_sorted(sorted: &[f32], pct: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let (a, b) = (sorted[lo] as f64, sorted[hi] as f64);
    if lo == hi {
        a
    } else {
        a + (b - a) * (rank - lo as f64)
    }
}

#[inline]
fn sorted_finite<'a, I>(values: I) -> Vec<f32>
where
    I: IntoIterator<Item = &'a f32>,
{
    let mut v: Vec<f32> = values
        .into_iter()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    v.sort_unstable_by_key(|v| OrderedFloat(*v));
    v
}

/// 求 `values` 中有限值的第 `pct` 百分位值 (线性插值).
///
/// `pct` 不在 \[0, 100\] 内时返回 `Err`. 不存在有限值时返回 `Ok(None)`.
pub fn percentile<'a, I>(values: I, pct: f64) -> VolumeResult<Option<f32>>
where
    I: IntoIterator<Item = &'a f32>,
{
    if !(0.0..=100.0).contains(&pct) {
        return Err(VolumeError::InvalidPercentile(pct));
    }
    let sorted = sorted_finite(values);
    Ok((!sorted.is_empty()).then(|| percentile_of_sorted(&sorted, pct) as f32))
}

/// 将单个值映射到 \[0, 1\]. NaN 映射为 0, 无穷值按截断处理.
#[inline]
fn rescale(v: f32, lo: f64, hi: f64) -> f32 {
    if v.is_nan() {
        return 0.0;
    }
    let c = (v as f64).clamp(lo, hi);
    ((c - lo) / (hi - lo + NORMALIZE_EPSILON)).clamp(0.0, 1.0) as f32
}

/// 按 `mode` 归一化 `field`, 返回新的标量场. 输出值位于 \[0, 1\], 不含 NaN/Inf.
///
/// 常值场 (或不含有限值的场) 映射为全 0, 这不是错误.
/// 仅当百分位参数非法时返回 `Err`.
pub fn normalize(field: &ScalarField, mode: NormalizeMode) -> VolumeResult<ScalarField> {
    let range = match mode {
        NormalizeMode::MinMax => field.finite_range().map(|(lo, hi)| (lo as f64, hi as f64)),
        NormalizeMode::Percentile { low, high } => {
            check_percentile_pair(low, high)?;
            let sorted = sorted_finite(field.iter());
            (!sorted.is_empty()).then(|| {
                (
                    percentile_of_sorted(&sorted, low),
                    percentile_of_sorted(&sorted, high),
                )
            })
        }
    };

    let Some((lo, hi)) = range else {
        log::warn!("标量场不含有限值, 归一化结果为全 0");
        return Ok(ScalarField::from_parts(
            field.data().map(|_| 0.0),
            field.spacing(),
        ));
    };
    if hi <= lo {
        log::warn!("常值标量场 (值 {lo}), 归一化结果为全 0");
    }
    log::debug!("归一化 {mode:?}: 截断范围 [{lo}, {hi}]");

    let data = field.data().map(|&v| rescale(v, lo, hi));
    Ok(ScalarField::from_parts(data, field.spacing()))
}

#[cfg(test)]
mod tests {
    use super::{normalize, percentile, NormalizeMode};
    use crate::{ScalarField, VolumeError};

    fn float_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    /// 确定性的伪随机场, 带几个极端离群点.
    fn noisy_field() -> ScalarField {
        let mut state = 0x2545_f491u32;
        ScalarField::from_shape_fn((8, 7, 6), |(x, y, z)| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            match (x, y, z) {
                (0, 0, 0) => 1e6,
                (7, 6, 5) => -1e6,
                _ => (state >> 8) as f32 / (1 << 24) as f32 * 100.0,
            }
        })
        .unwrap()
    }

    #[test]
    fn test_constant_field_is_zero() {
        for c in [0.0f32, -3.5, 1e6] {
            let field = ScalarField::from_shape_fn((3, 4, 5), |_| c).unwrap();
            for mode in [
                NormalizeMode::MinMax,
                NormalizeMode::Percentile {
                    low: 1.0,
                    high: 99.0,
                },
            ] {
                let out = normalize(&field, mode).unwrap();
                assert!(out.iter().all(|v| *v == 0.0));
            }
        }
    }

    #[test]
    fn test_min_max() {
        let ramp = |(x, _, _): (usize, usize, usize)| 10.0 + x as f32 * 5.0;
        let field = ScalarField::from_shape_fn((5, 1, 1), ramp).unwrap();
        let out = normalize(&field, NormalizeMode::MinMax).unwrap();
        assert_eq!(out[(0, 0, 0)], 0.0);
        assert!(float_eq(out[(2, 0, 0)], 0.5));
        assert!(float_eq(out[(4, 0, 0)], 1.0));
        assert!(out[(4, 0, 0)] <= 1.0);
    }

    #[test]
    fn test_percentile_bounded_and_monotonic() {
        let field = noisy_field();
        let out = normalize(
            &field,
            NormalizeMode::Percentile {
                low: 2.0,
                high: 98.0,
            },
        )
        .unwrap();
        assert!(out.iter().all(|v| (0.0..=1.0).contains(v)));

        let mut pairs: Vec<(f32, f32)> = field.iter().copied().zip(out.iter().copied()).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        for w in pairs.windows(2) {
            assert!(w[0].1 <= w[1].1, "{:?} -> {:?}", w[0], w[1]);
        }

        // 离群点被截断, 不再压缩其余体素的对比度.
        assert_eq!(out[(0, 0, 0)], out.iter().copied().fold(0.0, f32::max));
        let mid = out.iter().filter(|v| (0.25..0.75).contains(*v)).count();
        assert!(mid > out.size() / 3);
    }

    #[test]
    fn test_non_finite_input() {
        let field = ScalarField::from_shape_fn((4, 1, 1), |(x, _, _)| match x {
            0 => f32::NAN,
            1 => f32::NEG_INFINITY,
            2 => 1.0,
            _ => 3.0,
        })
        .unwrap();
        let out = normalize(&field, NormalizeMode::MinMax).unwrap();
        assert!(out.is_finite());
        assert_eq!(out[(0, 0, 0)], 0.0);
        assert_eq!(out[(1, 0, 0)], 0.0);
        assert!(float_eq(out[(3, 0, 0)], 1.0));

        let all_nan = ScalarField::from_shape_fn((2, 2, 2), |_| f32::NAN).unwrap();
        let out = normalize(&all_nan, NormalizeMode::MinMax).unwrap();
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_invalid_percentile_mode() {
        let field = noisy_field();
        let err = normalize(
            &field,
            NormalizeMode::Percentile {
                low: 10.0,
                high: 101.0,
            },
        )
        .unwrap_err();
        assert_eq!(err, VolumeError::InvalidPercentile(101.0));
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = [4.0f32, 1.0, 3.0, 2.0];
        assert_eq!(percentile(&values, 0.0).unwrap(), Some(1.0));
        assert_eq!(percentile(&values, 100.0).unwrap(), Some(4.0));
        assert!(float_eq(percentile(&values, 50.0).unwrap().unwrap(), 2.5));
        assert_eq!(percentile(&[f32::NAN], 50.0).unwrap(), None);
        assert!(percentile(&values, -0.1).is_err());
    }
}
