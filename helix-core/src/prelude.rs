//! 常用类型与函数.

pub use crate::consts::layer;
pub use crate::{
    assemble, extract_slice, marching_cubes, max_peel_depth, normalize, peel, segment, Analysis,
    Axis3, Idx2d, Idx3d, ImgWriteVis, IntensityWindow, Mask, Mesh, NormalizeMode, OverlaySource,
    Pipeline, PipelineConfig, Rgb, ScalarField, Scene, SceneEntry, SegmentationPolicy, Segmenter,
    Slice, StructureLevel, VolumeError, VolumeResult,
};
