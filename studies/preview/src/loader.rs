//! 运行参数与输入数据加载.

use anyhow::Context;
use helix_core::consts::DEFAULT_SEGMENT_PERCENTILE;
use helix_core::{io, ScalarField};
use std::env;
use std::path::PathBuf;

/// 获取扫描文件路径. 若环境变量 `$HELIX_SCAN_PATH` 为空, 返回 `None`.
pub fn scan_path_from_env() -> Option<PathBuf> {
    env::var_os("HELIX_SCAN_PATH").map(PathBuf::from)
}

/// 获取输出目录.
///
/// 1. 若环境变量 `$HELIX_OUT_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/helix-out`.
pub fn out_dir_from_env_or_home() -> anyhow::Result<PathBuf> {
    if let Ok(d) = env::var("HELIX_OUT_DIR") {
        Ok(PathBuf::from(d))
    } else {
        io::home_scan_dir_with(["helix-out"]).context("无法确定用户主目录")
    }
}

/// 读取环境变量 `key` 并解析. 未设置时返回 `default`.
fn parse_env<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("环境变量 ${key} 的值 {v:?} 无法解析")),
        Err(_) => Ok(default),
    }
}

/// 需要预览的最大剥离深度. 由 `$HELIX_PEEL_DEPTH` 指定, 默认为 0.
pub fn peel_depth_from_env() -> anyhow::Result<usize> {
    parse_env("HELIX_PEEL_DEPTH", 0)
}

/// 分割百分位. 由 `$HELIX_SEGMENT_PERCENTILE` 指定.
pub fn segment_percentile_from_env() -> anyhow::Result<f64> {
    parse_env("HELIX_SEGMENT_PERCENTILE", DEFAULT_SEGMENT_PERCENTILE)
}

/// 合成体模: 椭球 "组织", 内含一个偏心的高亮球形 "病灶", 外部为低强度噪声背景.
pub fn phantom(n: usize) -> anyhow::Result<ScalarField> {
    let c = (n as f32 - 1.0) / 2.0;
    let r = n as f32 * 0.4;
    let mut state = 0x9e37_79b9u32;
    let field = ScalarField::from_shape_fn((n, n, n), |(x, y, z)| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let noise = (state >> 16) as f32 / 65536.0 * 20.0;
        let (dx, dy, dz) = (x as f32 - c, y as f32 - c, (z as f32 - c) * 1.25);
        let tissue = (dx * dx + dy * dy + dz * dz).sqrt() / r;
        let lesion = ((dx - r * 0.35).powi(2) + (dy + r * 0.2).powi(2) + dz * dz).sqrt() / r;
        if lesion < 0.18 {
            1200.0 + noise
        } else if tissue < 1.0 {
            400.0 + 200.0 * (1.0 - tissue) + noise
        } else {
            noise
        }
    })?;
    Ok(field)
}

/// 加载输入数据: 优先读取 `$HELIX_SCAN_PATH`, 否则使用合成体模.
pub fn load_scan() -> anyhow::Result<(String, ScalarField)> {
    match scan_path_from_env() {
        Some(path) => {
            let field =
                io::open_scan(&path).with_context(|| format!("无法打开扫描 {path:?}"))?;
            Ok((path.display().to_string(), field))
        }
        None => {
            log::info!("未设置 $HELIX_SCAN_PATH, 使用 64^3 合成体模");
            Ok(("phantom".to_string(), phantom(64)?))
        }
    }
}
