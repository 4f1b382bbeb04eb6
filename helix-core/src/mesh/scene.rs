//! 场景组装.

use crate::{VolumeError, VolumeResult};
use itertools::Itertools;

use super::{Mesh, Rgb};

/// 场景中的一个图层: 网格及其显示属性.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SceneEntry {
    /// 网格. 可以为空.
    pub mesh: Mesh,
    /// 颜色.
    pub color: Rgb,
    /// 不透明度, 位于 \[0, 1\].
    pub opacity: f32,
    /// 标签, 如 `"brain"`, `"tumor"`.
    pub label: String,
}

impl SceneEntry {
    /// 构建图层. 属性在 [`assemble`] 时才检查.
    pub fn new(mesh: Mesh, color: Rgb, opacity: f32, label: impl Into<String>) -> Self {
        Self {
            mesh,
            color,
            opacity,
            label: label.into(),
        }
    }

    fn check(&self) -> VolumeResult<()> {
        self.mesh.validate()?;
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(VolumeError::InvalidAttribute(format!(
                "图层 {:?} 的不透明度 {} 不在 [0, 1] 内",
                self.label, self.opacity
            )));
        }
        Ok(())
    }
}

/// 有序的图层集合, 交给渲染端叠加显示.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Scene {
    entries: Vec<SceneEntry>,
}

impl Scene {
    /// 全部图层, 保持组装时的顺序.
    #[inline]
    pub fn entries(&self) -> &[SceneEntry] {
        &self.entries
    }

    /// 图层个数 (含空网格图层).
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有任何图层.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按顺序迭代图层.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, SceneEntry> {
        self.entries.iter()
    }

    /// 第一个标签为 `label` 的图层.
    pub fn get_by_label(&self, label: &str) -> Option<&SceneEntry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// 取出全部图层.
    #[inline]
    pub fn into_entries(self) -> Vec<SceneEntry> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a Scene {
    type Item = &'a SceneEntry;
    type IntoIter = std::slice::Iter<'a, SceneEntry>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// 将若干图层组装为场景, 顺序不变.
///
/// 空网格图层会被原样保留 (渲染端可以自行跳过).
/// 网格索引非法, 或不透明度不是 \[0, 1\] 内的有限值时返回 `Err`.
pub fn assemble<I>(entries: I) -> VolumeResult<Scene>
where
    I: IntoIterator<Item = SceneEntry>,
{
    let entries: Vec<SceneEntry> = entries.into_iter().collect();
    for entry in entries.iter() {
        entry.check()?;
    }
    log::debug!(
        "场景组装: {}",
        entries
            .iter()
            .map(|e| format!("{} ({} 个三角形)", e.label, e.mesh.triangle_count()))
            .join(", ")
    );
    Ok(Scene { entries })
}
