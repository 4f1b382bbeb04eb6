//! 通用常量.

/// 归一化时分母上的微小偏移, 避免常值场除零.
pub const NORMALIZE_EPSILON: f64 = 1e-8;

/// 默认的分割百分位阈值. 归一化后高于该百分位值的体素被标记为前景.
pub const DEFAULT_SEGMENT_PERCENTILE: f64 = 99.2;

/// 切片显示窗口的默认下百分位.
pub const DEFAULT_SLICE_LOW_PERCENTILE: f64 = 1.0;

/// 切片显示窗口的默认上百分位.
pub const DEFAULT_SLICE_HIGH_PERCENTILE: f64 = 99.0;

/// 掩码转换为浮点场之后, 提取其等值面所用的等值.
pub const MASK_ISOVALUE: f32 = 0.5;

/// Otsu 阈值的默认直方图桶数.
pub const OTSU_BINS: usize = 256;

/// 单通道颜色.
pub mod gray {
    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;
}

/// 场景图层默认显示属性.
pub mod layer {
    use crate::mesh::Rgb;

    /// 整体结构 (脑组织) 网格的颜色.
    pub const STRUCTURE_COLOR: Rgb = Rgb([0xd3, 0xd3, 0xd3]);

    /// 整体结构网格的不透明度. 足够透明, 以便看到内部的关注区域.
    pub const STRUCTURE_OPACITY: f32 = 0.2;

    /// 整体结构网格的标签.
    pub const STRUCTURE_LABEL: &str = "brain";

    /// 关注区域 (肿瘤) 网格的颜色.
    pub const REGION_COLOR: Rgb = Rgb([0xff, 0x00, 0x00]);

    /// 关注区域网格的不透明度.
    pub const REGION_OPACITY: f32 = 0.9;

    /// 关注区域网格的标签.
    pub const REGION_LABEL: &str = "tumor";

    /// 2D 叠加视图中掩码着色的混合比例.
    pub const OVERLAY_ALPHA: f32 = 0.5;
}
