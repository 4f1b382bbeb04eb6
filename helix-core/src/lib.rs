#![warn(missing_docs)]

//! 核心库. 对 3D MRI 体数据 (标量场) 进行归一化、阈值分割、剥离裁剪、
//! 切片提取, 并以 marching cubes 重建可渲染的三角网格.
//!
//! 该 crate 只提供纯计算接口: 输入是已经解码的 [`ScalarField`],
//! 输出是 [`Scene`] 和 [`Slice`] 这类值类型. 文件上传、对象存储、界面与渲染都不在此处.
//! `io` 模块提供的 nifti / npy 读取仅为便利的接入层.
//!
//! # 注意
//!
//! 1. 分割策略目前只是统计学占位规则 (百分位阈值或 Otsu), 不代表任何医学精度.
//!    真正的模型分割可以通过 [`Segmenter`] trait 替换进来, 调用方无需改动.
//! 2. 结构性错误 (形状不一致、参数越界) 以 [`VolumeError`] 返回;
//!    退化数据 (空掩码、空网格、常值场) 是合法结果, 不是错误.
//!
//! # 数据流
//!
//! ```text
//! raw field -> normalize -> { segment -> mask; marching_cubes(field) -> 结构网格 }
//!           -> (可选) peel(field, mask, depth) -> marching_cubes(field / mask)
//!           -> extract_slice(field, mask, axis, index) -> 2D 叠加视图
//!           -> assemble(entries) -> scene
//! ```
//!
//! [`Pipeline`] 将上述步骤串联起来, 全部参数经由 [`PipelineConfig`] 显式传入.
//!
//! # 并行
//!
//! 打开 `rayon` feature 后, marching cubes 按层并行求值, 结果与串行完全一致.

/// 二维索引.
pub type Idx2d = (usize, usize);

/// 三维索引, 按 `(x, y, z)` 排列, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

pub mod consts;

mod error;

pub use error::{VolumeError, VolumeResult};

/// 标量场、掩码、切片等基础数据结构.
mod data;

pub use data::slice::{extract_slice, extract_slice_windowed, ImgWriteVis, Slice};
pub use data::window::IntensityWindow;
pub use data::{Axis3, Mask, ScalarField};

pub mod normalize;

pub use normalize::{normalize, percentile, NormalizeMode};

pub mod segment;

pub use segment::{segment, OtsuSegmenter, PercentileSegmenter, Segmenter};

pub mod peel;

pub use peel::{max_peel_depth, peel};

pub mod mesh;

pub use mesh::{assemble, marching_cubes, Mesh, Rgb, Scene, SceneEntry};

pub mod pipeline;

pub use pipeline::{
    Analysis, LayerStyle, OverlaySource, Pipeline, PipelineConfig, SegmentationPolicy,
    StructureLevel,
};

pub mod io;

pub mod prelude;
