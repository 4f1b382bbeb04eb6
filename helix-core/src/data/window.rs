use crate::normalize::percentile_of_sorted;
use crate::{VolumeError, VolumeResult};
use ordered_float::OrderedFloat;

/// 显示窗口, 包含下限和上限.
///
/// 窗口内的值线性映射到 \[0, 1\], 窗口外的值被截断. 下限等于上限时,
/// 所有有限值都映射为 0 (常值切片不会产生除零).
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntensityWindow {
    lower: f32,
    upper: f32,
}

impl IntensityWindow {
    /// 构建显示窗口.
    ///
    /// `lower` 和 `upper` 必须是有限值且 `lower <= upper`, 否则返回 `None`.
    pub fn new(lower: f32, upper: f32) -> Option<IntensityWindow> {
        if lower.is_finite() && upper.is_finite() && lower <= upper {
            Some(Self { lower, upper })
        } else {
            None
        }
    }

    /// 覆盖 \[0, 1\] 的窗口, 即不做任何调整.
    #[inline]
    pub const fn unit() -> IntensityWindow {
        Self {
            lower: 0.0,
            upper: 1.0,
        }
    }

    /// 以 `values` 中有限值的第 `low_pct` 和第 `high_pct` 百分位作为窗口.
    ///
    /// 百分位必须满足 `0 <= low_pct < high_pct <= 100`, 否则返回 `Err`.
    /// 如果 `values` 中没有有限值, 则退化为 [`IntensityWindow::unit`].
    pub fn from_percentiles<'a, I>(values: I, low_pct: f64, high_pct: f64) -> VolumeResult<Self>
    where
        I: IntoIterator<Item = &'a f32>,
    {
        check_percentile_pair(low_pct, high_pct)?;
        let mut sorted: Vec<f32> = values
            .into_iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();
        if sorted.is_empty() {
            return Ok(Self::unit());
        }
        sorted.sort_unstable_by_key(|v| OrderedFloat(*v));
        let lower = percentile_of_sorted(&sorted, low_pct) as f32;
        let upper = percentile_of_sorted(&sorted, high_pct) as f32;
        Ok(Self { lower, upper })
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.upper
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.upper - self.lower
    }

    /// 求 `v` 在当前窗口下对应的显示值 (0.0 <= value <= 1.0).
    ///
    /// 如果 `v` 无意义 (如 NaN), 则返回 `None`. 正负无穷按截断处理.
    pub fn eval(&self, v: f32) -> Option<f32> {
        if v.is_nan() {
            return None;
        }
        if v <= self.lower {
            Some(0.0)
        } else if v >= self.upper {
            // 走到这里说明 lower < upper, 或 v > lower == upper.
            Some(if self.width() > 0.0 { 1.0 } else { 0.0 })
        } else {
            Some(((v - self.lower) / self.width()).clamp(0.0, 1.0))
        }
    }

    /// 求 `v` 在当前窗口下对应的灰度图像素整数值 (0 <= value <= 255).
    ///
    /// 如果 `v` 无意义 (如 NaN), 则返回 `None`.
    pub fn eval_u8(&self, v: f32) -> Option<u8> {
        // 255, not 256.
        self.eval(v).map(|g| (g * 255.0) as u8)
    }
}

/// 检查一对百分位参数.
pub(crate) fn check_percentile_pair(low_pct: f64, high_pct: f64) -> VolumeResult<()> {
    for p in [low_pct, high_pct] {
        if !(0.0..=100.0).contains(&p) {
            return Err(VolumeError::InvalidPercentile(p));
        }
    }
    if low_pct >= high_pct {
        return Err(VolumeError::InvalidPercentile(high_pct));
    }
    Ok(())
}
