//! 切片叠加视图的合成与持久化存储.

use super::Slice;
use crate::consts::{gray, layer::OVERLAY_ALPHA, layer::REGION_COLOR};
use image::{ImageResult, Rgb, RgbImage};
use std::path::Path;

/// 表明一个可以通过 **可视化友好** 模式持久化存储的图像对象.
///
/// 对于 [`Slice`], 强度切片以灰度绘制, 掩码像素以关注区域颜色半透明覆盖.
pub trait ImgWriteVis {
    /// 按照一定的可视化规则将图片保存到 `path` 路径. 图片格式由扩展名决定.
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()>;
}

/// 将灰度 `g` 与颜色分量 `c` 按 `alpha` 混合.
#[inline]
fn blend(g: u8, c: u8, alpha: f32) -> u8 {
    (g as f32 * (1.0 - alpha) + c as f32 * alpha).round() as u8
}

impl Slice {
    /// 合成叠加视图: 强度以灰度绘制, 掩码像素与关注区域颜色按 `alpha` 混合.
    ///
    /// 图像宽度对应切片的列数, 高度对应行数. `alpha` 会被截断到 \[0, 1\].
    pub fn overlay_rgb(&self, alpha: f32) -> RgbImage {
        let alpha = alpha.clamp(0.0, 1.0);
        let (height, width) = self.shape();
        let mut buf = RgbImage::new(width as u32, height as u32);
        for ((h, w), v, m) in self.indexed_iter() {
            let g = (v.clamp(0.0, 1.0) * gray::WHITE as f32) as u8;
            let pix = if m {
                let [r, gg, b] = REGION_COLOR.0;
                Rgb([blend(g, r, alpha), blend(g, gg, alpha), blend(g, b, alpha)])
            } else {
                Rgb([g, g, g])
            };
            buf.put_pixel(w as u32, h as u32, pix);
        }
        buf
    }
}

/// 以默认混合比例保存叠加视图.
impl ImgWriteVis for Slice {
    fn save<P: AsRef<Path>>(&self, path: P) -> ImageResult<()> {
        self.overlay_rgb(OVERLAY_ALPHA).save(path)
    }
}
