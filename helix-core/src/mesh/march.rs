//! Marching cubes 等值面提取.

use super::tables::{CORNERS, EDGES, EDGE_TABLE, TRI_TABLE};
use super::Mesh;
use crate::{Idx3d, ScalarField};
use ndarray::ArrayView3;
use std::collections::HashMap;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelIterator, ParallelIterator};
    }
}

/// 格点棱的全局编号: `(下端点的行优先线性索引) * 3 + 方向`.
type EdgeKey = usize;

/// 一层立方体 (固定 `x`) 的提取结果. 三角形引用的是本层局部顶点序号.
struct Layer {
    vertices: Vec<(EdgeKey, [f32; 3])>,
    triangles: Vec<[u32; 3]>,
}

/// 棱 `(a, b)` 的下端点偏移与方向 (0, 1, 2 分别为 x, y, z).
#[inline]
fn edge_geometry(a: usize, b: usize) -> (Idx3d, usize) {
    let (pa, pb) = (CORNERS[a], CORNERS[b]);
    let lower = (pa.0.min(pb.0), pa.1.min(pb.1), pa.2.min(pb.2));
    let dir = if pa.0 != pb.0 {
        0
    } else if pa.1 != pb.1 {
        1
    } else {
        2
    };
    (lower, dir)
}

/// 沿格点棱线性插值等值点. 总是从下端点插向上端点, 因此同一条棱
/// 无论由哪个立方体计算, 结果都完全一致.
#[inline]
fn interpolate(
    lower: Idx3d,
    dir: usize,
    v_lower: f32,
    v_upper: f32,
    isovalue: f32,
    spacing: [f32; 3],
) -> [f32; 3] {
    let t = (isovalue - v_lower) / (v_upper - v_lower);
    // 端点含 NaN 时退化为棱中点.
    let t = if t.is_finite() {
        t.clamp(0.0, 1.0)
    } else {
        0.5
    };
    let mut p = [lower.0 as f32, lower.1 as f32, lower.2 as f32];
    p[dir] += t;
    [p[0] * spacing[0], p[1] * spacing[1], p[2] * spacing[2]]
}

/// 处理 `x` 固定的一层立方体.
fn march_layer(data: &ArrayView3<f32>, x: usize, isovalue: f32, spacing: [f32; 3]) -> Layer {
    let (_, ny, nz) = data.dim();
    let mut local: HashMap<EdgeKey, u32> = HashMap::new();
    let mut layer = Layer {
        vertices: Vec::new(),
        triangles: Vec::new(),
    };

    for y in 0..ny - 1 {
        for z in 0..nz - 1 {
            let mut values = [0.0f32; 8];
            let mut code = 0usize;
            for (i, &(dx, dy, dz)) in CORNERS.iter().enumerate() {
                let v = data[(x + dx, y + dy, z + dz)];
                values[i] = v;
                // NaN 不大于任何值, 视为低于等值.
                if v > isovalue {
                    code |= 1 << i;
                }
            }

            let crossed = EDGE_TABLE[code];
            if crossed == 0 {
                continue;
            }

            let mut edge_vertex = [u32::MAX; 12];
            for (e, &(a, b)) in EDGES.iter().enumerate() {
                if crossed & (1 << e) == 0 {
                    continue;
                }
                let ((lx, ly, lz), dir) = edge_geometry(a, b);
                let lower = (x + lx, y + ly, z + lz);
                let key = ((lower.0 * ny + lower.1) * nz + lower.2) * 3 + dir;
                // `a` 与 `b` 中偏移较小者为下端点.
                let (v_lower, v_upper) = if CORNERS[a] == (lx, ly, lz) {
                    (values[a], values[b])
                } else {
                    (values[b], values[a])
                };
                let vertices = &mut layer.vertices;
                edge_vertex[e] = *local.entry(key).or_insert_with(|| {
                    let p = interpolate(lower, dir, v_lower, v_upper, isovalue, spacing);
                    vertices.push((key, p));
                    (vertices.len() - 1) as u32
                });
            }

            for tri in TRI_TABLE[code].chunks_exact(3).take_while(|t| t[0] >= 0) {
                layer.triangles.push([
                    edge_vertex[tri[0] as usize],
                    edge_vertex[tri[1] as usize],
                    edge_vertex[tri[2] as usize],
                ]);
            }
        }
    }
    layer
}

/// 按层序合并各层结果, 并焊接层与层之间共享的顶点.
fn merge(layers: Vec<Layer>) -> Mesh {
    let mut index: HashMap<EdgeKey, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();

    for layer in layers {
        let remap: Vec<u32> = layer
            .vertices
            .iter()
            .map(|&(key, p)| {
                *index.entry(key).or_insert_with(|| {
                    vertices.push(p);
                    (vertices.len() - 1) as u32
                })
            })
            .collect();
        triangles.extend(
            layer
                .triangles
                .iter()
                .map(|t| t.map(|i| remap[i as usize])),
        );
    }
    Mesh::from_parts_unchecked(vertices, triangles)
}

/// 逐层求值. `parallel` 仅在打开 `rayon` feature 时生效; 两种方式结果完全一致.
fn march(field: &ScalarField, isovalue: f32, parallel: bool) -> Mesh {
    let data = field.data();
    let (nx, ny, nz) = data.dim();
    if nx < 2 || ny < 2 || nz < 2 {
        return Mesh::empty();
    }
    let spacing = field.spacing();

    #[cfg(feature = "rayon")]
    let layers: Vec<Layer> = if parallel {
        (0..nx - 1)
            .into_par_iter()
            .map(|x| march_layer(&data, x, isovalue, spacing))
            .collect()
    } else {
        (0..nx - 1)
            .map(|x| march_layer(&data, x, isovalue, spacing))
            .collect()
    };

    #[cfg(not(feature = "rayon"))]
    let layers: Vec<Layer> = {
        let _ = parallel;
        (0..nx - 1)
            .map(|x| march_layer(&data, x, isovalue, spacing))
            .collect()
    };

    merge(layers)
}

/// 以 marching cubes 提取 `field` 在 `isovalue` 处的等值面.
///
/// 标量场被视为规则格点上的采样. 对每个由 8 个相邻采样组成的单位立方体,
/// 以角点是否严格大于 `isovalue` 组成 8 位索引, 查表得到近似等值面的三角形,
/// 顶点沿立方体棱按角点值线性插值. 顶点坐标为 `(x, y, z)` 格点坐标乘以体素间距.
///
/// 相邻立方体共享的顶点会被焊接 (按格点棱去重). 三角形法向指向低值一侧.
///
/// 若没有立方体被等值面穿过 (如 `isovalue` 在数据范围之外, 或任一维度长度小于 2),
/// 返回空网格, 这不是错误. 相同输入总是产生完全相同的输出.
pub fn marching_cubes(field: &ScalarField, isovalue: f32) -> Mesh {
    let mesh = march(field, isovalue, true);
    log::debug!(
        "marching cubes (等值 {isovalue}): {} 个顶点, {} 个三角形",
        mesh.vertex_count(),
        mesh.triangle_count()
    );
    mesh
}
