//! 运行时错误.
//!
//! 只有结构性违约才是错误. 空掩码、空网格、常值场都是合法值, 不会出现在这里.

use crate::Idx3d;
use std::fmt;

/// 体数据处理的运行时错误.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeError {
    /// 某个维度长度为 0.
    EmptyAxis(Idx3d),

    /// 标量场与掩码的形状不一致.
    ShapeMismatch {
        /// 期望形状.
        expected: Idx3d,
        /// 实际形状.
        found: Idx3d,
    },

    /// 沿 `axis` 的索引 `index` 越界, 该维度长度为 `len`.
    IndexOutOfRange {
        /// 维度.
        axis: usize,
        /// 越界索引.
        index: usize,
        /// 维度长度.
        len: usize,
    },

    /// 不存在的维度, 只允许 0, 1, 2.
    InvalidAxis(usize),

    /// 剥离深度过大. `max` 为允许的最大深度, 若为 `None` 则只接受深度 0.
    DepthTooLarge {
        /// 请求的深度.
        depth: usize,
        /// 允许的最大深度.
        max: Option<usize>,
    },

    /// 百分位参数不在 \[0, 100\] 内, 或上下百分位次序颠倒.
    InvalidPercentile(f64),

    /// 三角形 `triangle` 引用了不存在的顶点 `index` (网格共有 `vertices` 个顶点).
    InvalidMesh {
        /// 三角形序号.
        triangle: usize,
        /// 非法顶点索引.
        index: u32,
        /// 顶点个数.
        vertices: usize,
    },

    /// 非法显示属性 (如不透明度越界).
    InvalidAttribute(String),
}

impl fmt::Display for VolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyAxis(shape) => write!(f, "体数据存在长度为 0 的维度: {shape:?}"),
            Self::ShapeMismatch { expected, found } => {
                write!(f, "形状不一致: 期望 {expected:?}, 实际 {found:?}")
            }
            Self::IndexOutOfRange { axis, index, len } => {
                write!(f, "维度 {axis} 上的索引 {index} 越界 (长度 {len})")
            }
            Self::InvalidAxis(axis) => write!(f, "不存在维度 {axis}"),
            Self::DepthTooLarge { depth, max: Some(max) } => {
                write!(f, "剥离深度 {depth} 过大, 最大允许 {max}")
            }
            Self::DepthTooLarge { depth, max: None } => {
                write!(f, "剥离深度 {depth} 过大, 该体数据只允许深度 0")
            }
            Self::InvalidPercentile(p) => write!(f, "非法百分位参数 {p}"),
            Self::InvalidMesh {
                triangle,
                index,
                vertices,
            } => write!(
                f,
                "第 {triangle} 个三角形引用了顶点 {index}, 但网格只有 {vertices} 个顶点"
            ),
            Self::InvalidAttribute(msg) => write!(f, "非法显示属性: {msg}"),
        }
    }
}

impl std::error::Error for VolumeError {}

/// 体数据处理结果.
pub type VolumeResult<T> = Result<T, VolumeError>;
