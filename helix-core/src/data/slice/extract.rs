use crate::consts::{DEFAULT_SLICE_HIGH_PERCENTILE, DEFAULT_SLICE_LOW_PERCENTILE};
use crate::normalize::percentile;
use crate::{Axis3, Idx2d, IntensityWindow, Mask, ScalarField, VolumeError, VolumeResult};
use ndarray::{Array2, ArrayView2};
use std::ops::Index;

/// 拥有所有权的 2D 横切面: 显示用强度切片与同形状的掩码切片.
///
/// 强度切片已经在切片内部按百分位窗口重新归一化到 \[0, 1\],
/// 这与整体三维重建所用的归一化相互独立.
/// 切片每次请求时新建, 创建后不再修改.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    field: Array2<f32>,
    mask: Array2<bool>,
    axis: Axis3,
    index: usize,
    window: IntensityWindow,
}

impl Index<Idx2d> for Slice {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.field[index]
    }
}

/// 提取沿 `axis` 第 `index` 层的横切面, 使用默认的 1% - 99% 显示窗口.
///
/// 参见 [`extract_slice_windowed`].
#[inline]
pub fn extract_slice(
    field: &ScalarField,
    mask: &Mask,
    axis: Axis3,
    index: usize,
) -> VolumeResult<Slice> {
    extract_slice_windowed(
        field,
        mask,
        axis,
        index,
        DEFAULT_SLICE_LOW_PERCENTILE,
        DEFAULT_SLICE_HIGH_PERCENTILE,
    )
}

/// 提取沿 `axis` 第 `index` 层的横切面 (同时取标量场与掩码).
///
/// 强度切片被截断到该切片自身的第 `low_pct` 至第 `high_pct` 百分位窗口,
/// 再缩放到 \[0, 1\]. 结果不含 NaN.
///
/// 以下情况返回 `Err`:
///
/// 1. `mask` 与 `field` 形状不一致;
/// 2. `index` 越界;
/// 3. 百分位参数非法.
pub fn extract_slice_windowed(
    field: &ScalarField,
    mask: &Mask,
    axis: Axis3,
    index: usize,
    low_pct: f64,
    high_pct: f64,
) -> VolumeResult<Slice> {
    mask.check_shape(field)?;
    let len = axis.len_of(field.shape());
    if index >= len {
        return Err(VolumeError::IndexOutOfRange {
            axis: axis.index(),
            index,
            len,
        });
    }

    let raw = field.data().index_axis_move(axis.into(), index);
    let window = IntensityWindow::from_percentiles(raw.iter(), low_pct, high_pct)?;
    // `eval` 只对 NaN 返回 `None`.
    let windowed = raw.map(|&v| window.eval(v).unwrap_or(0.0));
    let mask = mask.data().index_axis_move(axis.into(), index).to_owned();

    log::debug!(
        "切片 {axis:?}[{index}]: 窗口 [{}, {}], 掩码像素 {}",
        window.lower_bound(),
        window.upper_bound(),
        mask.iter().filter(|p| **p).count()
    );
    Ok(Slice {
        field: windowed,
        mask,
        axis,
        index,
        window,
    })
}

impl Slice {
    /// 切片的分辨率 (行, 列).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.field.dim()
    }

    /// 像素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.field.len()
    }

    /// 切片所垂直的维度.
    #[inline]
    pub fn axis(&self) -> Axis3 {
        self.axis
    }

    /// 切片在该维度上的索引.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// 切片局部的显示窗口 (原始强度单位).
    #[inline]
    pub fn window(&self) -> IntensityWindow {
        self.window
    }

    /// 显示用强度切片.
    #[inline]
    pub fn field(&self) -> ArrayView2<'_, f32> {
        self.field.view()
    }

    /// 掩码切片.
    #[inline]
    pub fn mask(&self) -> ArrayView2<'_, bool> {
        self.mask.view()
    }

    /// 掩码切片中前景像素个数.
    #[inline]
    pub fn mask_count(&self) -> usize {
        self.mask.iter().filter(|p| **p).count()
    }

    /// 获取给定位置 (行, 列) 的 (强度, 掩码) 值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<(f32, bool)> {
        Some((*self.field.get(pos)?, *self.mask.get(pos)?))
    }

    /// 按行优先序迭代 ((行, 列), 强度, 掩码).
    pub fn indexed_iter(&self) -> impl Iterator<Item = (Idx2d, f32, bool)> + '_ {
        self.field
            .indexed_iter()
            .zip(self.mask.iter())
            .map(|((pos, v), m)| (pos, *v, *m))
    }

    /// 用切片自身的统计量重新生成掩码: 显示强度严格高于第 `pct` 百分位的像素为前景.
    ///
    /// 这与三维掩码相互独立, 两者不保证标记相同的体素.
    pub fn with_local_threshold(&self, pct: f64) -> VolumeResult<Slice> {
        let threshold = percentile(self.field.iter(), pct)?.unwrap_or(f32::INFINITY);
        Ok(Slice {
            mask: self.field.map(|v| *v > threshold),
            ..self.clone()
        })
    }

    /// 拆分为 (强度切片, 掩码切片).
    #[inline]
    pub fn into_raw(self) -> (Array2<f32>, Array2<bool>) {
        (self.field, self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::{extract_slice, extract_slice_windowed};
    use crate::{Axis3, Mask, ScalarField, VolumeError};

    fn volume() -> (ScalarField, Mask) {
        let field = ScalarField::from_shape_fn((10, 10, 10), |(x, y, z)| {
            (x as f32 - 4.5).powi(2) + (y as f32 - 4.5).powi(2) + z as f32
        })
        .unwrap();
        let flagged = |(x, y, z): (usize, usize, usize)| x == 3 && y > 5 && z == 5;
        let mask = Mask::from_shape_fn((10, 10, 10), flagged).unwrap();
        (field, mask)
    }

    #[test]
    fn test_middle_depth_slice() {
        let (field, mask) = volume();
        let index = field.shape().2 / 2;
        let slice = extract_slice(&field, &mask, Axis3::Z, index).unwrap();
        assert_eq!(slice.shape(), (10, 10));
        assert_eq!(slice.mask().dim(), (10, 10));
        assert!(slice.field().iter().all(|v| !v.is_nan()));
        assert!(slice.field().iter().all(|v| (0.0..=1.0).contains(v)));
        assert_eq!(slice.mask_count(), 4);
        assert_eq!(slice.get((3, 7)), Some((slice[(3, 7)], true)));
        assert_eq!(slice.axis(), Axis3::Z);
        assert_eq!(slice.index(), 5);
    }

    #[test]
    fn test_axis_generic() {
        let field = ScalarField::from_shape_fn((4, 5, 6), |(x, _, _)| x as f32).unwrap();
        let mask = Mask::from_shape_fn((4, 5, 6), |(_, y, _)| y == 0).unwrap();
        let sx = extract_slice(&field, &mask, Axis3::X, 3).unwrap();
        assert_eq!(sx.shape(), (5, 6));
        let sy = extract_slice(&field, &mask, Axis3::Y, 0).unwrap();
        assert_eq!(sy.shape(), (4, 6));
        assert_eq!(sy.mask_count(), 24);
        let sz = extract_slice(&field, &mask, Axis3::Z, 5).unwrap();
        assert_eq!(sz.shape(), (4, 5));
    }

    #[test]
    fn test_constant_slice_is_zero() {
        let field = ScalarField::from_shape_fn((6, 6, 6), |(_, _, z)| z as f32).unwrap();
        let mask = Mask::background((6, 6, 6)).unwrap();
        let slice = extract_slice(&field, &mask, Axis3::Z, 2).unwrap();
        assert!(slice.field().iter().all(|v| *v == 0.0));
        assert_eq!(slice.mask_count(), 0);
    }

    #[test]
    fn test_nan_voxels_are_sanitized() {
        let field = ScalarField::from_shape_fn((3, 3, 3), |(x, y, _)| {
            if x == 1 && y == 1 {
                f32::NAN
            } else {
                (x + y) as f32
            }
        })
        .unwrap();
        let mask = Mask::background((3, 3, 3)).unwrap();
        let slice = extract_slice(&field, &mask, Axis3::Z, 0).unwrap();
        assert!(slice.field().iter().all(|v| !v.is_nan()));
        assert_eq!(slice[(1, 1)], 0.0);
    }

    #[test]
    fn test_slice_errors() {
        let (field, mask) = volume();
        assert_eq!(
            extract_slice(&field, &mask, Axis3::Z, 10).unwrap_err(),
            VolumeError::IndexOutOfRange {
                axis: 2,
                index: 10,
                len: 10
            }
        );
        let small = Mask::background((10, 10, 9)).unwrap();
        assert!(matches!(
            extract_slice(&field, &small, Axis3::Z, 0),
            Err(VolumeError::ShapeMismatch { .. })
        ));
        let degenerate = extract_slice_windowed(&field, &mask, Axis3::Z, 0, 50.0, 50.0);
        assert!(degenerate.is_err());
    }

    #[test]
    fn test_local_threshold_is_independent() {
        let (field, mask) = volume();
        let slice = extract_slice(&field, &mask, Axis3::Z, 0).unwrap();
        assert_eq!(slice.mask_count(), 0);
        let local = slice.with_local_threshold(90.0).unwrap();
        assert!(local.mask_count() > 0);
        assert_eq!(local.field(), slice.field());
    }
}
