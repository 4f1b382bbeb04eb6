//! 程序运行函数.

use crate::export::write_stl;
use crate::loader;
use crate::report::{DepthRecord, PreviewReport};
use anyhow::Context;
use helix_core::{max_peel_depth, Axis3, ImgWriteVis, Pipeline, PipelineConfig, SegmentationPolicy};
use std::fs;
use std::time::Instant;

/// 实际运行.
pub fn run() -> anyhow::Result<PreviewReport> {
    let (source, raw) = loader::load_scan()?;
    let out_dir = loader::out_dir_from_env_or_home()?;
    fs::create_dir_all(&out_dir).with_context(|| format!("无法创建输出目录 {out_dir:?}"))?;

    let config = PipelineConfig::default().with_segmentation(SegmentationPolicy::Percentile(
        loader::segment_percentile_from_env()?,
    ))?;
    let pipeline = Pipeline::new(config);
    let analysis = pipeline.analyze(&raw)?;

    let shape = analysis.field().shape();
    let requested = loader::peel_depth_from_env()?;
    let max_depth = max_peel_depth(shape).unwrap_or(0);
    if requested > max_depth {
        log::warn!("剥离深度 {requested} 超出范围, 截断为 {max_depth}");
    }
    let deepest = requested.min(max_depth);

    let slice = analysis.slice(Axis3::Z, shape.2 / 2)?;
    let slice_path = out_dir.join("slice.png");
    slice
        .save(&slice_path)
        .with_context(|| format!("无法保存切片 {slice_path:?}"))?;
    log::info!("切片已保存至 {slice_path:?}");

    let mut records = Vec::with_capacity(deepest + 1);
    for depth in 0..=deepest {
        let start = Instant::now();
        let scene = analysis.scene(depth)?;
        let elapsed = start.elapsed();

        for entry in scene.iter().filter(|e| !e.mesh.is_empty()) {
            let path = out_dir.join(format!("{}-d{depth}.stl", entry.label));
            write_stl(&entry.mesh, &path)?;
        }
        records.push(DepthRecord {
            depth,
            scene,
            elapsed,
        });
    }

    Ok(PreviewReport {
        source,
        shape,
        mask_voxels: analysis.mask_voxels(),
        slice,
        records,
    })
}
