//! 三角网格: 由 marching cubes 生成, 再与显示属性一起组装为场景.

mod march;
mod scene;
mod tables;

pub use march::marching_cubes;
pub use scene::{assemble, Scene, SceneEntry};

use crate::{VolumeError, VolumeResult};

/// 24 位 RGB 颜色.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    /// 以 `#rrggbb` 形式表示.
    pub fn to_hex(self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// 三角网格. 顶点为 `(x, y, z)` 坐标, 三角形为三个顶点的索引.
///
/// 通过 [`Mesh::new`] 或 [`marching_cubes`] 得到的网格保证所有索引都指向已有顶点.
/// 空网格 (没有顶点也没有三角形) 是合法值.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mesh {
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

impl Mesh {
    /// 空网格.
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    /// 由顶点和三角形构建网格. 若有三角形引用了不存在的顶点则返回 `Err`.
    pub fn new(vertices: Vec<[f32; 3]>, triangles: Vec<[u32; 3]>) -> VolumeResult<Self> {
        let mesh = Self::from_parts_unchecked(vertices, triangles);
        mesh.validate()?;
        Ok(mesh)
    }

    #[inline]
    pub(crate) fn from_parts_unchecked(vertices: Vec<[f32; 3]>, triangles: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            triangles,
        }
    }

    /// 检查所有三角形索引是否都指向已有顶点.
    pub fn validate(&self) -> VolumeResult<()> {
        let n = self.vertices.len();
        for (triangle, t) in self.triangles.iter().enumerate() {
            if let Some(&index) = t.iter().find(|i| **i as usize >= n) {
                return Err(VolumeError::InvalidMesh {
                    triangle,
                    index,
                    vertices: n,
                });
            }
        }
        Ok(())
    }

    /// 顶点坐标.
    #[inline]
    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    /// 三角形顶点索引.
    #[inline]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// 顶点个数.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// 三角形个数.
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// 网格是否为空.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty() && self.vertices.is_empty()
    }

    /// 轴对齐包围盒 `(min, max)`. 没有顶点时返回 `None`.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let (first, rest) = self.vertices.split_first()?;
        Some(rest.iter().fold((*first, *first), |(mut lo, mut hi), v| {
            for k in 0..3 {
                lo[k] = lo[k].min(v[k]);
                hi[k] = hi[k].max(v[k]);
            }
            (lo, hi)
        }))
    }

    /// 所有三角形面积之和.
    pub fn surface_area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let n = self.face_normal(t);
                0.5 * (n.iter().map(|c| (*c as f64).powi(2)).sum::<f64>()).sqrt()
            })
            .sum()
    }

    /// 未归一化的面法向 (长度为三角形面积的两倍).
    #[inline]
    fn face_normal(&self, t: &[u32; 3]) -> [f32; 3] {
        let [a, b, c] = t.map(|i| self.vertices[i as usize]);
        let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ]
    }

    /// 按面积加权的单位顶点法向. 不属于任何三角形的顶点法向为零向量.
    pub fn vertex_normals(&self) -> Vec<[f32; 3]> {
        let mut normals = vec![[0.0f32; 3]; self.vertices.len()];
        for t in self.triangles.iter() {
            let n = self.face_normal(t);
            for &i in t {
                let acc = &mut normals[i as usize];
                for k in 0..3 {
                    acc[k] += n[k];
                }
            }
        }
        for n in normals.iter_mut() {
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            if len > 0.0 {
                n.iter_mut().for_each(|c| *c /= len);
            }
        }
        normals
    }

    /// 拆分为 (顶点, 三角形).
    #[inline]
    pub fn into_parts(self) -> (Vec<[f32; 3]>, Vec<[u32; 3]>) {
        (self.vertices, self.triangles)
    }
}
