use std::ops::Index;

use ndarray::{Array3, ArrayBase, ArrayView3, Axis, Data, Ix3};
use num::ToPrimitive;

use crate::{Idx3d, VolumeError, VolumeResult};

pub mod slice;
pub mod window;

/// 三维体数据的维度.
///
/// 数据按照接入层给出的 `(x, y, z)` 顺序存储, `Z` 通常是 "深度" 方向.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Axis3 {
    /// 第 0 维.
    X,

    /// 第 1 维.
    Y,

    /// 第 2 维.
    Z,
}

impl Axis3 {
    /// 全部维度, 按存储顺序.
    pub const ALL: [Axis3; 3] = [Axis3::X, Axis3::Y, Axis3::Z];

    /// 维度序号.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Axis3::X => 0,
            Axis3::Y => 1,
            Axis3::Z => 2,
        }
    }

    /// 在形状 `shape` 中取该维度的长度.
    #[inline]
    pub const fn len_of(self, (x, y, z): Idx3d) -> usize {
        match self {
            Axis3::X => x,
            Axis3::Y => y,
            Axis3::Z => z,
        }
    }
}

impl TryFrom<usize> for Axis3 {
    type Error = VolumeError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Axis3::X),
            1 => Ok(Axis3::Y),
            2 => Ok(Axis3::Z),
            other => Err(VolumeError::InvalidAxis(other)),
        }
    }
}

impl From<Axis3> for Axis {
    #[inline]
    fn from(value: Axis3) -> Self {
        Axis(value.index())
    }
}

#[inline]
fn shape_of<T>(data: &Array3<T>) -> Idx3d {
    data.dim()
}

#[inline]
fn check_non_empty(shape: Idx3d) -> VolumeResult<()> {
    let (x, y, z) = shape;
    if x == 0 || y == 0 || z == 0 {
        Err(VolumeError::EmptyAxis(shape))
    } else {
        Ok(())
    }
}

/// 稠密三维标量场 (强度值以 `f32` 保存), 同时记录体素的物理间距.
///
/// 该结构一经创建便不可修改. 所有变换 (归一化、剥离) 都生成新的实例,
/// 以保留原始数据供深度为 0 时重新展示.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarField {
    data: Array3<f32>,
    spacing: [f32; 3],
}

impl Index<Idx3d> for ScalarField {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

/// 间距的每个分量是否都是正的有限值.
#[inline]
pub(crate) fn is_valid_spacing(spacing: [f32; 3]) -> bool {
    spacing.iter().all(|s| s.is_finite() && *s > 0.0)
}

impl ScalarField {
    /// 由 `(x, y, z)` 组织的数组构建标量场, 体素间距为 1.
    ///
    /// 任一维度长度为 0 时返回 `Err`. 原始数据允许包含非有限值, 归一化会处理它们.
    pub fn new(data: Array3<f32>) -> VolumeResult<Self> {
        check_non_empty(shape_of(&data))?;
        Ok(Self {
            data,
            spacing: [1.0; 3],
        })
    }

    /// 由任意数值类型的三维数组构建标量场. 无法表示为 `f32` 的元素记为 NaN.
    pub fn from_array<T, S>(data: &ArrayBase<S, Ix3>) -> VolumeResult<Self>
    where
        T: ToPrimitive,
        S: Data<Elem = T>,
    {
        Self::new(data.map(|v| v.to_f32().unwrap_or(f32::NAN)))
    }

    /// 以 `f(index)` 逐体素生成形状为 `shape` 的标量场.
    pub fn from_shape_fn<F>(shape: Idx3d, f: F) -> VolumeResult<Self>
    where
        F: FnMut(Idx3d) -> f32,
    {
        check_non_empty(shape)?;
        Self::new(Array3::from_shape_fn(shape, f))
    }

    /// 全零标量场.
    #[inline]
    pub fn zeros(shape: Idx3d) -> VolumeResult<Self> {
        Self::from_shape_fn(shape, |_| 0.0)
    }

    /// 内部构造, 调用方保证 `data` 非空且 `spacing` 合法.
    #[inline]
    pub(crate) fn from_parts(data: Array3<f32>, spacing: [f32; 3]) -> Self {
        debug_assert!(check_non_empty(shape_of(&data)).is_ok());
        Self { data, spacing }
    }

    /// 设置体素物理间距 (如毫米). 每个分量都必须是正的有限值.
    pub fn with_spacing(mut self, spacing: [f32; 3]) -> VolumeResult<Self> {
        if is_valid_spacing(spacing) {
            self.spacing = spacing;
            Ok(self)
        } else {
            Err(VolumeError::InvalidAttribute(format!(
                "体素间距必须为正: {spacing:?}"
            )))
        }
    }

    /// 体素物理间距.
    #[inline]
    pub fn spacing(&self) -> [f32; 3] {
        self.spacing
    }

    /// 数据形状 `(x, y, z)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        shape_of(&self.data)
    }

    /// 体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 检查索引是否合法.
    #[inline]
    pub fn check(&self, (x0, y0, z0): Idx3d) -> bool {
        let (x, y, z) = self.shape();
        x0 < x && y0 < y && z0 < z
    }

    /// 获取给定位置的强度值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> Option<f32> {
        self.data.get(pos).copied()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 取出底层数组.
    #[inline]
    pub fn into_raw(self) -> Array3<f32> {
        self.data
    }

    /// 按行优先序迭代所有强度值.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &f32> {
        self.data.iter()
    }

    /// 所有有限值组成的序列.
    pub(crate) fn finite_values(&self) -> Vec<f32> {
        self.data.iter().copied().filter(|v| v.is_finite()).collect()
    }

    /// 有限值的最小值与最大值. 若不存在有限值则返回 `None`.
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// 有限值的平均值. 若不存在有限值则返回 `None`.
    pub fn mean(&self) -> Option<f64> {
        let mut count = 0u64;
        let mut sum = 0.0;
        for v in self.data.iter().filter(|v| v.is_finite()) {
            count += 1;
            sum += *v as f64;
        }
        (count > 0).then(|| sum / count as f64)
    }

    /// 是否所有值都是有限的.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }
}

/// 稠密三维布尔掩码, 标记关注区域的体素.
///
/// 下游操作 (切片、剥离、等值面) 都要求掩码与其来源标量场形状完全一致.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    data: Array3<bool>,
}

impl Index<Idx3d> for Mask {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl Mask {
    /// 由 `(x, y, z)` 组织的布尔数组构建掩码. 任一维度长度为 0 时返回 `Err`.
    pub fn new(data: Array3<bool>) -> VolumeResult<Self> {
        check_non_empty(shape_of(&data))?;
        Ok(Self { data })
    }

    /// 以 `f(index)` 逐体素生成形状为 `shape` 的掩码.
    pub fn from_shape_fn<F>(shape: Idx3d, f: F) -> VolumeResult<Self>
    where
        F: FnMut(Idx3d) -> bool,
    {
        check_non_empty(shape)?;
        Self::new(Array3::from_shape_fn(shape, f))
    }

    /// 全背景掩码.
    #[inline]
    pub fn background(shape: Idx3d) -> VolumeResult<Self> {
        Self::from_shape_fn(shape, |_| false)
    }

    /// 将满足谓词 `pred` 的体素标记为前景. 结果与 `field` 形状相同.
    pub fn from_field<P>(field: &ScalarField, mut pred: P) -> Self
    where
        P: FnMut(f32) -> bool,
    {
        Self {
            data: field.data.map(|v| pred(*v)),
        }
    }

    #[inline]
    pub(crate) fn from_raw_unchecked(data: Array3<bool>) -> Self {
        debug_assert!(check_non_empty(shape_of(&data)).is_ok());
        Self { data }
    }

    /// 数据形状 `(x, y, z)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        shape_of(&self.data)
    }

    /// 检查掩码与 `field` 形状是否一致, 不一致时返回 `Err`.
    pub fn check_shape(&self, field: &ScalarField) -> VolumeResult<()> {
        if self.shape() == field.shape() {
            Ok(())
        } else {
            Err(VolumeError::ShapeMismatch {
                expected: field.shape(),
                found: self.shape(),
            })
        }
    }

    /// 获取给定位置的值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> Option<bool> {
        self.data.get(pos).copied()
    }

    /// 前景体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    /// 该掩码是否为全背景? 空掩码是合法结果.
    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.data.iter().any(|p| *p)
    }

    /// 收集所有前景体素的下标, 结果按行优先存储.
    pub fn positions(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, p)| p.then_some(pos))
            .collect()
    }

    /// 转化为前景 1.0、背景 0.0 的标量场, 体素间距为 1.
    pub fn to_field(&self) -> ScalarField {
        ScalarField::from_parts(self.data.map(|p| if *p { 1.0 } else { 0.0 }), [1.0; 3])
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, bool> {
        self.data.view()
    }

    /// 取出底层数组.
    #[inline]
    pub fn into_raw(self) -> Array3<bool> {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::{Axis3, Mask, ScalarField};
    use crate::VolumeError;
    use ndarray::Array3;

    #[test]
    fn test_empty_axis_rejected() {
        assert_eq!(
            ScalarField::zeros((0, 3, 3)).unwrap_err(),
            VolumeError::EmptyAxis((0, 3, 3))
        );
        assert!(Mask::background((2, 0, 1)).is_err());
        assert!(ScalarField::zeros((1, 1, 1)).is_ok());
    }

    #[test]
    fn test_from_array_generic() {
        let raw = Array3::from_shape_fn((2, 3, 4), |(x, y, z)| (x * 100 + y * 10 + z) as i16);
        let field = ScalarField::from_array(&raw).unwrap();
        assert_eq!(field.shape(), (2, 3, 4));
        assert_eq!(field[(1, 2, 3)], 123.0);
        assert_eq!(field.finite_range(), Some((0.0, 123.0)));
    }

    #[test]
    fn test_finite_statistics_skip_nan() {
        let field = ScalarField::from_shape_fn((2, 2, 1), |(x, y, _)| match (x, y) {
            (0, 0) => f32::NAN,
            (0, 1) => f32::INFINITY,
            (1, 0) => 2.0,
            _ => 4.0,
        })
        .unwrap();
        assert!(!field.is_finite());
        assert_eq!(field.finite_range(), Some((2.0, 4.0)));
        assert_eq!(field.mean(), Some(3.0));
        assert_eq!(field.finite_values().len(), 2);
    }

    #[test]
    fn test_spacing_validation() {
        let field = ScalarField::zeros((2, 2, 2)).unwrap();
        assert_eq!(field.spacing(), [1.0; 3]);
        assert!(field.clone().with_spacing([0.0, 1.0, 1.0]).is_err());
        let field = field.with_spacing([0.5, 0.5, 2.0]).unwrap();
        assert_eq!(field.spacing(), [0.5, 0.5, 2.0]);
    }

    #[test]
    fn test_mask_basics() {
        let field = ScalarField::from_shape_fn((3, 3, 3), |(x, y, z)| (x + y + z) as f32).unwrap();
        let mask = Mask::from_field(&field, |v| v >= 5.0);
        assert_eq!(mask.shape(), field.shape());
        assert!(mask.check_shape(&field).is_ok());
        assert_eq!(mask.count(), 4);
        let expected = vec![(1, 2, 2), (2, 1, 2), (2, 2, 1), (2, 2, 2)];
        assert_eq!(mask.positions(), expected);
        assert!(!mask.is_empty());

        let as_field = mask.to_field();
        assert_eq!(as_field[(2, 2, 2)], 1.0);
        assert_eq!(as_field[(0, 0, 0)], 0.0);

        let other = Mask::background((3, 3, 2)).unwrap();
        assert!(other.is_empty());
        assert_eq!(
            other.check_shape(&field).unwrap_err(),
            VolumeError::ShapeMismatch {
                expected: (3, 3, 3),
                found: (3, 3, 2)
            }
        );
    }

    #[test]
    fn test_axis_conversion() {
        assert_eq!(Axis3::try_from(2).unwrap(), Axis3::Z);
        assert_eq!(Axis3::try_from(3).unwrap_err(), VolumeError::InvalidAxis(3));
        assert_eq!(Axis3::Y.len_of((4, 5, 6)), 5);
    }
}
