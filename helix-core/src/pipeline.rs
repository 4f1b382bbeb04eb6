//! 完整的处理流程: 归一化 -> 分割 -> (剥离) -> 等值面 / 切片 -> 场景.
//!
//! 所有参数都由 [`PipelineConfig`] 显式传入, 没有全局状态.
//! 每次调用 [`Pipeline::analyze`] 都从原始标量场重新计算, 不缓存任何中间结果.

use std::fmt;
use std::sync::Arc;

use crate::consts::{
    layer, DEFAULT_SEGMENT_PERCENTILE, DEFAULT_SLICE_HIGH_PERCENTILE, DEFAULT_SLICE_LOW_PERCENTILE,
    MASK_ISOVALUE,
};
use crate::data::window::check_percentile_pair;
use crate::{
    assemble, extract_slice_windowed, marching_cubes, normalize, peel, Axis3, Mask, Mesh,
    NormalizeMode, OtsuSegmenter, PercentileSegmenter, Rgb, ScalarField, Scene, SceneEntry,
    Segmenter, Slice, VolumeError, VolumeResult,
};

/// 分割策略.
#[derive(Clone)]
pub enum SegmentationPolicy {
    /// 归一化后严格高于该百分位值的体素为前景.
    Percentile(f64),

    /// Otsu 自动阈值.
    Otsu,

    /// 调用方提供的任意分割器.
    Custom(Arc<dyn Segmenter + Send + Sync>),
}

impl Default for SegmentationPolicy {
    #[inline]
    fn default() -> Self {
        Self::Percentile(DEFAULT_SEGMENT_PERCENTILE)
    }
}

impl fmt::Debug for SegmentationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percentile(p) => f.debug_tuple("Percentile").field(p).finish(),
            Self::Otsu => f.write_str("Otsu"),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl SegmentationPolicy {
    fn run(&self, field: &ScalarField) -> VolumeResult<Mask> {
        match self {
            Self::Percentile(p) => PercentileSegmenter::new(*p)?.segment(field),
            Self::Otsu => OtsuSegmenter::default().segment(field),
            Self::Custom(s) => s.segment(field),
        }
    }
}

/// 整体结构网格所用的等值.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StructureLevel {
    /// 固定等值 (归一化强度单位).
    Fixed(f32),

    /// 取 (剥离后) 标量场有限值的均值.
    Mean,
}

impl Default for StructureLevel {
    #[inline]
    fn default() -> Self {
        Self::Mean
    }
}

impl StructureLevel {
    /// 在 `field` 上求实际等值. 没有有限值时返回 `None`.
    pub fn resolve(self, field: &ScalarField) -> Option<f32> {
        match self {
            Self::Fixed(v) => Some(v),
            Self::Mean => field.mean().map(|m| m as f32),
        }
    }
}

/// 2D 叠加视图中掩码的来源.
///
/// 三维掩码基于整个体数据的百分位, 而切片局部阈值只基于该切片自身,
/// 两者标记的体素不保证一致.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OverlaySource {
    /// 直接取三维掩码的对应切片.
    Volume,

    /// 在显示切片上按第 `percentile` 百分位重新阈值.
    SliceLocal {
        /// 百分位, 位于 \[0, 100\].
        percentile: f64,
    },
}

impl Default for OverlaySource {
    #[inline]
    fn default() -> Self {
        Self::SliceLocal {
            percentile: DEFAULT_SEGMENT_PERCENTILE,
        }
    }
}

/// 单个图层的显示属性.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayerStyle {
    /// 颜色.
    pub color: Rgb,
    /// 不透明度.
    pub opacity: f32,
    /// 标签.
    pub label: String,
}

impl LayerStyle {
    /// 构建显示属性. 不透明度不在 \[0, 1\] 内时返回 `Err`.
    pub fn new(color: Rgb, opacity: f32, label: impl Into<String>) -> VolumeResult<Self> {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(VolumeError::InvalidAttribute(format!(
                "不透明度 {opacity} 不在 [0, 1] 内"
            )));
        }
        Ok(Self {
            color,
            opacity,
            label: label.into(),
        })
    }

    /// 整体结构的默认显示属性.
    pub fn structure() -> Self {
        Self {
            color: layer::STRUCTURE_COLOR,
            opacity: layer::STRUCTURE_OPACITY,
            label: layer::STRUCTURE_LABEL.to_string(),
        }
    }

    /// 关注区域的默认显示属性.
    pub fn region() -> Self {
        Self {
            color: layer::REGION_COLOR,
            opacity: layer::REGION_OPACITY,
            label: layer::REGION_LABEL.to_string(),
        }
    }

    #[inline]
    fn entry(&self, mesh: Mesh) -> SceneEntry {
        SceneEntry::new(mesh, self.color, self.opacity, self.label.clone())
    }
}

/// 流程参数.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    normalize: NormalizeMode,
    segmentation: SegmentationPolicy,
    structure_level: StructureLevel,
    slice_window: (f64, f64),
    overlay: OverlaySource,
    structure_style: LayerStyle,
    region_style: LayerStyle,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            normalize: NormalizeMode::default(),
            segmentation: SegmentationPolicy::default(),
            structure_level: StructureLevel::default(),
            slice_window: (DEFAULT_SLICE_LOW_PERCENTILE, DEFAULT_SLICE_HIGH_PERCENTILE),
            overlay: OverlaySource::default(),
            structure_style: LayerStyle::structure(),
            region_style: LayerStyle::region(),
        }
    }
}

#[inline]
fn check_pct(p: f64) -> VolumeResult<()> {
    if (0.0..=100.0).contains(&p) {
        Ok(())
    } else {
        Err(VolumeError::InvalidPercentile(p))
    }
}

impl PipelineConfig {
    /// 设置归一化方式.
    pub fn with_normalize(mut self, mode: NormalizeMode) -> VolumeResult<Self> {
        if let NormalizeMode::Percentile { low, high } = mode {
            check_percentile_pair(low, high)?;
        }
        self.normalize = mode;
        Ok(self)
    }

    /// 设置分割策略.
    pub fn with_segmentation(mut self, policy: SegmentationPolicy) -> VolumeResult<Self> {
        if let SegmentationPolicy::Percentile(p) = policy {
            check_pct(p)?;
        }
        self.segmentation = policy;
        Ok(self)
    }

    /// 以任意分割器替换分割策略.
    pub fn with_segmenter<S>(self, segmenter: S) -> Self
    where
        S: Segmenter + Send + Sync + 'static,
    {
        Self {
            segmentation: SegmentationPolicy::Custom(Arc::new(segmenter)),
            ..self
        }
    }

    /// 设置整体结构网格的等值.
    pub fn with_structure_level(mut self, level: StructureLevel) -> VolumeResult<Self> {
        if let StructureLevel::Fixed(v) = level {
            if !v.is_finite() {
                return Err(VolumeError::InvalidAttribute(format!("非法等值 {v}")));
            }
        }
        self.structure_level = level;
        Ok(self)
    }

    /// 设置切片显示窗口的百分位.
    pub fn with_slice_window(mut self, low: f64, high: f64) -> VolumeResult<Self> {
        check_percentile_pair(low, high)?;
        self.slice_window = (low, high);
        Ok(self)
    }

    /// 设置 2D 叠加视图的掩码来源.
    pub fn with_overlay(mut self, overlay: OverlaySource) -> VolumeResult<Self> {
        if let OverlaySource::SliceLocal { percentile } = overlay {
            check_pct(percentile)?;
        }
        self.overlay = overlay;
        Ok(self)
    }

    /// 设置整体结构图层的显示属性.
    #[inline]
    pub fn with_structure_style(self, style: LayerStyle) -> Self {
        Self {
            structure_style: style,
            ..self
        }
    }

    /// 设置关注区域图层的显示属性.
    #[inline]
    pub fn with_region_style(self, style: LayerStyle) -> Self {
        Self {
            region_style: style,
            ..self
        }
    }

    /// 归一化方式.
    #[inline]
    pub fn normalize_mode(&self) -> NormalizeMode {
        self.normalize
    }

    /// 分割策略.
    #[inline]
    pub fn segmentation(&self) -> &SegmentationPolicy {
        &self.segmentation
    }

    /// 整体结构等值.
    #[inline]
    pub fn structure_level(&self) -> StructureLevel {
        self.structure_level
    }

    /// 2D 叠加视图的掩码来源.
    #[inline]
    pub fn overlay(&self) -> OverlaySource {
        self.overlay
    }
}

/// 处理流程.
#[derive(Clone, Debug, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// 以给定参数构建流程.
    #[inline]
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// 流程参数.
    #[inline]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// 对原始标量场做归一化与分割.
    ///
    /// 分割器返回的掩码形状与标量场不一致时返回 `Err`.
    pub fn analyze(&self, raw: &ScalarField) -> VolumeResult<Analysis<'_>> {
        let field = normalize(raw, self.config.normalize)?;
        let mask = self.config.segmentation.run(&field)?;
        mask.check_shape(&field)?;
        log::info!(
            "分析完成: 形状 {:?}, 分割策略 {:?}, 前景体素 {}",
            field.shape(),
            self.config.segmentation,
            mask.count()
        );
        Ok(Analysis {
            config: &self.config,
            field,
            mask,
        })
    }
}

/// 一次分析的结果: 归一化标量场与对应的掩码.
#[derive(Clone, Debug)]
pub struct Analysis<'a> {
    config: &'a PipelineConfig,
    field: ScalarField,
    mask: Mask,
}

impl Analysis<'_> {
    /// 归一化标量场.
    #[inline]
    pub fn field(&self) -> &ScalarField {
        &self.field
    }

    /// 分割掩码.
    #[inline]
    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    /// 前景体素个数.
    #[inline]
    pub fn mask_voxels(&self) -> usize {
        self.mask.count()
    }

    /// 剥离 `depth` 层之后, 生成 `[整体结构, 关注区域]` 两个图层的场景.
    ///
    /// 掩码为空时不做关注区域的等值面提取, 该图层为空网格.
    pub fn scene(&self, depth: usize) -> VolumeResult<Scene> {
        let (field, mask) = peel(&self.field, &self.mask, depth)?;

        let structure = match self.config.structure_level.resolve(&field) {
            Some(level) => marching_cubes(&field, level),
            None => Mesh::empty(),
        };

        let region = if mask.is_empty() {
            log::warn!("剥离深度 {depth} 下掩码为空, 跳过关注区域网格");
            Mesh::empty()
        } else {
            let as_field = mask.to_field().with_spacing(field.spacing())?;
            marching_cubes(&as_field, MASK_ISOVALUE)
        };

        assemble([
            self.config.structure_style.entry(structure),
            self.config.region_style.entry(region),
        ])
    }

    /// 沿 `axis` 第 `index` 层的横切面. 叠加掩码的来源由 [`OverlaySource`] 决定.
    pub fn slice(&self, axis: Axis3, index: usize) -> VolumeResult<Slice> {
        let (low, high) = self.config.slice_window;
        let slice = extract_slice_windowed(&self.field, &self.mask, axis, index, low, high)?;
        match self.config.overlay {
            OverlaySource::Volume => Ok(slice),
            OverlaySource::SliceLocal { percentile } => slice.with_local_threshold(percentile),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        LayerStyle, OverlaySource, Pipeline, PipelineConfig, SegmentationPolicy, StructureLevel,
    };
    use crate::consts::layer;
    use crate::mesh::Rgb;
    use crate::{Axis3, Mask, NormalizeMode, ScalarField, VolumeError};

    fn init_logger() {
        let _ = simple_logger::SimpleLogger::new()
            .with_level(log::LevelFilter::Debug)
            .init();
    }

    /// 球形 "组织" 中含一个小的高亮 "病灶".
    fn phantom(n: usize) -> ScalarField {
        let c = (n as f32 - 1.0) / 2.0;
        ScalarField::from_shape_fn((n, n, n), |(x, y, z)| {
            let (dx, dy, dz) = (x as f32 - c, y as f32 - c, z as f32 - c);
            let r = (dx * dx + dy * dy + dz * dz).sqrt();
            let lesion = ((x as f32 - c - 2.0).powi(2) + dy * dy + dz * dz).sqrt();
            if lesion < 1.6 {
                900.0
            } else if r < n as f32 * 0.4 {
                300.0 + r
            } else {
                10.0
            }
        })
        .unwrap()
    }

    #[test]
    fn test_full_scene() {
        init_logger();
        let pipeline = Pipeline::default();
        let raw = phantom(16);
        let analysis = pipeline.analyze(&raw).unwrap();
        assert!(analysis.mask_voxels() > 0);
        assert!(analysis.field().iter().all(|v| (0.0..=1.0).contains(v)));

        let scene = analysis.scene(0).unwrap();
        assert_eq!(scene.len(), 2);
        let structure = scene.get_by_label(layer::STRUCTURE_LABEL).unwrap();
        let region = scene.get_by_label(layer::REGION_LABEL).unwrap();
        assert!(!structure.mesh.is_empty());
        assert!(!region.mesh.is_empty());
        assert_eq!(structure.opacity, layer::STRUCTURE_OPACITY);
        assert_eq!(region.color, layer::REGION_COLOR);

        // 剥离后的网格落在剥离后的坐标范围内.
        let peeled = analysis.scene(3).unwrap();
        let (_, max) = peeled.entries()[0].mesh.bounds().unwrap();
        assert!(max.iter().all(|c| *c <= 9.0));
    }

    #[test]
    fn test_single_voxel_scenario() {
        let bright = |p: (usize, usize, usize)| if p == (1, 2, 1) { 10.0 } else { 0.0 };
        let raw = ScalarField::from_shape_fn((4, 4, 4), bright).unwrap();
        let config = PipelineConfig::default()
            .with_structure_level(StructureLevel::Fixed(0.5))
            .unwrap();
        let pipeline = Pipeline::new(config);
        let analysis = pipeline.analyze(&raw).unwrap();
        assert_eq!(analysis.mask().positions(), vec![(1, 2, 1)]);

        let scene = analysis.scene(0).unwrap();
        assert!(scene.iter().all(|e| !e.mesh.is_empty()));
        let (min, max) = scene.entries()[1].mesh.bounds().unwrap();
        assert_eq!(min, [0.5, 1.5, 0.5]);
        assert_eq!(max, [1.5, 2.5, 1.5]);
    }

    #[test]
    fn test_empty_mask_is_not_an_error() {
        let raw = ScalarField::from_shape_fn((6, 6, 6), |_| 42.0).unwrap();
        let pipeline = Pipeline::default();
        let analysis = pipeline.analyze(&raw).unwrap();
        assert_eq!(analysis.mask_voxels(), 0);
        let scene = analysis.scene(1).unwrap();
        assert_eq!(scene.len(), 2);
        let region = scene.get_by_label(layer::REGION_LABEL).unwrap();
        assert!(region.mesh.is_empty());
    }

    #[test]
    fn test_depth_rules() {
        let raw = phantom(10);
        let pipeline = Pipeline::default();
        let analysis = pipeline.analyze(&raw).unwrap();
        assert!(analysis.scene(4).is_ok());
        assert!(matches!(
            analysis.scene(5),
            Err(VolumeError::DepthTooLarge { depth: 5, .. })
        ));
    }

    #[test]
    fn test_custom_segmenter_shape_checked() {
        let raw = phantom(8);
        let wrong_shape = |_: &ScalarField| Mask::background((8, 8, 7)).unwrap();
        let config = PipelineConfig::default().with_segmenter(wrong_shape);
        let err = Pipeline::new(config).analyze(&raw).unwrap_err();
        assert_eq!(
            err,
            VolumeError::ShapeMismatch {
                expected: (8, 8, 8),
                found: (8, 8, 7)
            }
        );

        let config = PipelineConfig::default()
            .with_segmenter(|f: &ScalarField| Mask::from_field(f, |v| v > 0.5));
        let pipeline = Pipeline::new(config);
        let analysis = pipeline.analyze(&raw).unwrap();
        assert!(analysis.mask_voxels() > 1);
    }

    #[test]
    fn test_overlay_sources() {
        let raw = phantom(12);
        let volume = PipelineConfig::default()
            .with_overlay(OverlaySource::Volume)
            .unwrap();
        let pipeline = Pipeline::new(volume);
        let analysis = pipeline.analyze(&raw).unwrap();
        let slice = analysis.slice(Axis3::Z, 6).unwrap();
        assert_eq!(slice.shape(), (12, 12));
        let expected = analysis
            .mask()
            .positions()
            .into_iter()
            .filter(|p| p.2 == 6)
            .count();
        assert_eq!(slice.mask_count(), expected);

        let local = Pipeline::default();
        let analysis = local.analyze(&raw).unwrap();
        let slice = analysis.slice(Axis3::Z, 6).unwrap();
        assert!(slice.field().iter().all(|v| !v.is_nan()));
        assert!(analysis.slice(Axis3::Z, 12).is_err());
    }

    #[test]
    fn test_config_validation() {
        let config = PipelineConfig::default();
        assert!(config
            .clone()
            .with_segmentation(SegmentationPolicy::Percentile(120.0))
            .is_err());
        assert!(config.clone().with_slice_window(99.0, 1.0).is_err());
        assert!(config
            .clone()
            .with_overlay(OverlaySource::SliceLocal { percentile: -3.0 })
            .is_err());
        assert!(config
            .clone()
            .with_structure_level(StructureLevel::Fixed(f32::NAN))
            .is_err());
        assert!(config
            .clone()
            .with_normalize(NormalizeMode::Percentile {
                low: 5.0,
                high: 2.0
            })
            .is_err());
        assert!(LayerStyle::new(Rgb([0; 3]), 1.2, "x").is_err());

        let otsu = config
            .with_segmentation(SegmentationPolicy::Otsu)
            .unwrap()
            .with_region_style(LayerStyle::new(Rgb([0, 0xff, 0]), 1.0, "lesion").unwrap());
        let raw = phantom(12);
        let pipeline = Pipeline::new(otsu);
        let scene = pipeline.analyze(&raw).unwrap().scene(0).unwrap();
        assert!(scene.get_by_label("lesion").is_some());
        assert_eq!(format!("{:?}", pipeline.config().segmentation()), "Otsu");
    }
}
