//! 运行结果.

use helix_core::{Scene, Slice};
use std::io::{self, Write};
use std::time::Duration;

const SEP: &str = "--------------------------------------------------------";

/// 单个剥离深度的结果.
pub struct DepthRecord {
    pub depth: usize,
    pub scene: Scene,
    pub elapsed: Duration,
}

/// 将单个剥离深度的结果写进 `w` 中.
fn describe_into<W: Write>(r: &DepthRecord, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    writeln!(w, "Peel depth {}:", r.depth)?;
    for entry in r.scene.iter() {
        let bounds = match entry.mesh.bounds() {
            Some((lo, hi)) => format!("{lo:.1?} - {hi:.1?}"),
            None => "/".to_string(),
        };
        writeln!(
            w,
            "{S4}`{}` ({}, opacity {:.2}): {} vertices, {} triangles, area {:.1}, bounds {bounds}",
            entry.label,
            entry.color.to_hex(),
            entry.opacity,
            entry.mesh.vertex_count(),
            entry.mesh.triangle_count(),
            entry.mesh.surface_area(),
        )?;
    }
    write!(w, "{S4}Scene built in {} us", r.elapsed.as_micros())?;
    Ok(())
}

/// 预览程序最终结果.
pub struct PreviewReport {
    pub source: String,
    pub shape: (usize, usize, usize),
    pub mask_voxels: usize,
    pub slice: Slice,
    pub records: Vec<DepthRecord>,
}

impl PreviewReport {
    /// 输出运行结果.
    pub fn analyze(&self) {
        println!("{SEP}");
        println!("Source `{}`, shape {:?}", self.source, self.shape);
        println!("Flagged voxels: {}", self.mask_voxels);
        println!(
            "Slice {:?}[{}]: {} overlay pixels, window [{:.2}, {:.2}]",
            self.slice.axis(),
            self.slice.index(),
            self.slice.mask_count(),
            self.slice.window().lower_bound(),
            self.slice.window().upper_bound(),
        );
        println!("{SEP}");

        let mut buf = Vec::with_capacity(512);
        for record in self.records.iter() {
            if describe_into(record, &mut buf).is_ok() {
                println!("{}", String::from_utf8_lossy(&buf));
            }
            buf.clear();
            println!("{SEP}");
        }
    }
}
