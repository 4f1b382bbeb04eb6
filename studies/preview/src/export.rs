//! 将网格写为二进制 STL, 供外部查看器使用.

use anyhow::Context;
use helix_core::Mesh;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// 将 `mesh` 写入 `path`. 面法向按顶点顺序 (右手定则) 计算, 退化三角形的法向取 +z.
pub fn write_stl(mesh: &Mesh, path: &Path) -> anyhow::Result<()> {
    let v = mesh.vertices();
    let triangles = mesh.triangles().iter().map(|t| {
        let [a, b, c] = t.map(|i| v[i as usize]);
        let e1 = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let e2 = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let n = [
            e1[1] * e2[2] - e1[2] * e2[1],
            e1[2] * e2[0] - e1[0] * e2[2],
            e1[0] * e2[1] - e1[1] * e2[0],
        ];
        let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
        let n = if len > 0.0 {
            n.map(|x| x / len)
        } else {
            [0.0, 0.0, 1.0]
        };
        stl_io::Triangle {
            normal: stl_io::Normal::new(n),
            vertices: [a, b, c].map(stl_io::Vertex::new),
        }
    });

    let mut file = BufWriter::new(
        File::create(path).with_context(|| format!("无法创建 STL 文件 {path:?}"))?,
    );
    stl_io::write_stl(&mut file, triangles).with_context(|| format!("无法写入 STL 文件 {path:?}"))?;
    Ok(())
}
