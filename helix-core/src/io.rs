//! 扫描文件接入.
//!
//! 仅为便利接口: 核心流程只依赖于已经解码的 [`ScalarField`].

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::{Array3, Axis, Ix3};
use ndarray_npy::ReadNpyError;
use nifti::{IntoNdArray, NiftiError, NiftiObject, ReaderOptions};

use crate::data::is_valid_spacing;
use crate::{ScalarField, VolumeError};

/// 打开扫描文件错误.
#[derive(Debug)]
pub enum OpenScanError {
    /// 读取 nifti 文件错误.
    NiftiError(NiftiError),

    /// 读取 npy 文件错误.
    ReadNpyError(ReadNpyError),

    /// 数据不是 3D 体数据. 参数为实际形状.
    NotVolume(Vec<usize>),

    /// 数据不满足标量场的要求.
    Invalid(VolumeError),
}

impl fmt::Display for OpenScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NiftiError(e) => write!(f, "nifti 读取错误: {e}"),
            Self::ReadNpyError(e) => write!(f, "npy 读取错误: {e}"),
            Self::NotVolume(shape) => write!(f, "不是 3D 体数据, 形状 {shape:?}"),
            Self::Invalid(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for OpenScanError {}

impl From<VolumeError> for OpenScanError {
    #[inline]
    fn from(value: VolumeError) -> Self {
        Self::Invalid(value)
    }
}

/// 打开 nii / nii.gz 格式的 3D 扫描. `path` 为文件的本地路径.
///
/// 数据按文件中的 `(x, y, z)` 顺序存放, 体素间距取自头部的 `pixdim[1..4]`.
/// 时间维长度为 1 的 4D 文件也被接受.
pub fn open_nifti<P: AsRef<Path>>(path: P) -> Result<ScalarField, OpenScanError> {
    let obj = ReaderOptions::new()
        .read_file(path.as_ref())
        .map_err(OpenScanError::NiftiError)?;
    let pixdim = obj.header().pixdim;

    let data = obj
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(OpenScanError::NiftiError)?;
    let shape = data.shape().to_vec();
    let data = match shape.as_slice() {
        [_, _, _] => data,
        [_, _, _, 1] => data.index_axis_move(Axis(3), 0),
        _ => return Err(OpenScanError::NotVolume(shape.clone())),
    };
    let data = data
        .into_dimensionality::<Ix3>()
        .map_err(|_| OpenScanError::NotVolume(shape))?;

    // nifti 数据为列优先存储.
    let field = ScalarField::new(data.as_standard_layout().into_owned())?;
    let spacing = [pixdim[1], pixdim[2], pixdim[3]];
    if is_valid_spacing(spacing) {
        Ok(field.with_spacing(spacing)?)
    } else {
        log::warn!("nifti 头部体素间距 {spacing:?} 非法, 按 [1, 1, 1] 处理");
        Ok(field)
    }
}

/// 打开 npy 格式的 3D 数组 (元素类型为 `f32`).
pub fn open_npy<P: AsRef<Path>>(path: P) -> Result<ScalarField, OpenScanError> {
    let data: Array3<f32> =
        ndarray_npy::read_npy(path.as_ref()).map_err(OpenScanError::ReadNpyError)?;
    Ok(ScalarField::new(data)?)
}

/// 按扩展名选择读取方式: `.nii` / `.nii.gz` 为 nifti, `.npy` 为 npy.
pub fn open_scan<P: AsRef<Path>>(path: P) -> Result<ScalarField, OpenScanError> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    if name.ends_with(".npy") {
        open_npy(path)
    } else {
        open_nifti(path)
    }
}

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_scan_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_scan_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_scan_dir()?;
    ans.extend(it);
    Some(ans)
}

#[cfg(test)]
mod tests {
    use super::{
        home_scan_dir, home_scan_dir_with, open_nifti, open_npy, open_scan, OpenScanError,
    };
    use ndarray::{Array, Array1, Array3, Axis, RemoveAxis};
    use ndarray_npy::write_npy;
    use nifti::writer::WriterOptions;
    use nifti::NiftiHeader;
    use std::path::{Path, PathBuf};

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("helix-core-{}-{name}", std::process::id()))
    }

    fn ramp(shape: (usize, usize, usize)) -> Array3<f32> {
        Array3::from_shape_fn(shape, |(x, y, z)| (x * 20 + y * 5 + z) as f32)
    }

    /// 写出 nifti 文件, `pixdim` 为 `None` 时使用默认头部.
    fn write_nifti<D: RemoveAxis>(path: &Path, data: &Array<f32, D>, pixdim: Option<[f32; 3]>) {
        let mut header = NiftiHeader::default();
        if let Some([dx, dy, dz]) = pixdim {
            header.pixdim = [1.0, dx, dy, dz, 1.0, 1.0, 1.0, 1.0];
        }
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(data)
            .unwrap();
    }

    #[test]
    fn test_open_nifti_3d() {
        let path = temp_path("volume.nii.gz");
        write_nifti(&path, &ramp((3, 4, 5)), None);
        let field = open_scan(&path).unwrap();
        assert_eq!(field.shape(), (3, 4, 5));
        assert_eq!(field[(0, 0, 0)], 0.0);
        assert_eq!(field[(1, 2, 3)], 33.0);
        assert_eq!(field[(2, 3, 4)], 59.0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_nifti_single_volume_4d() {
        let path = temp_path("single.nii");
        let data = ramp((3, 4, 5)).insert_axis(Axis(3));
        assert_eq!(data.shape(), [3, 4, 5, 1]);
        write_nifti(&path, &data, None);
        let field = open_nifti(&path).unwrap();
        assert_eq!(field.shape(), (3, 4, 5));
        assert_eq!(field[(2, 3, 4)], 59.0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_nifti_time_series_rejected() {
        let path = temp_path("series.nii");
        let data = Array::from_elem((3, 4, 5, 2), 1.0f32);
        write_nifti(&path, &data, None);
        match open_nifti(&path) {
            Err(OpenScanError::NotVolume(shape)) => assert_eq!(shape, [3, 4, 5, 2]),
            other => panic!("{other:?}"),
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_nifti_spacing() {
        let path = temp_path("spacing.nii");
        write_nifti(&path, &ramp((3, 4, 5)), Some([0.5, 0.5, 2.0]));
        let field = open_nifti(&path).unwrap();
        assert_eq!(field.spacing(), [0.5, 0.5, 2.0]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_nifti_invalid_spacing_falls_back() {
        let path = temp_path("zero-spacing.nii");
        write_nifti(&path, &ramp((3, 4, 5)), Some([0.0, 1.0, 1.0]));
        let field = open_nifti(&path).unwrap();
        assert_eq!(field.spacing(), [1.0; 3]);
        assert_eq!(field[(2, 3, 4)], 59.0);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_home_dir() {
        if let Some(dir) = home_scan_dir() {
            assert!(dir.ends_with("dataset"));
            let full = home_scan_dir_with(["brats", "001.nii.gz"]).unwrap();
            assert!(full.starts_with(&dir));
            assert!(full.ends_with("brats/001.nii.gz"));
        }
    }

    #[test]
    fn test_open_npy() {
        let path = temp_path("volume.npy");
        let data = Array3::from_shape_fn((3, 4, 5), |(x, y, z)| (x * 20 + y * 5 + z) as f32);
        write_npy(&path, &data).unwrap();
        let field = open_scan(&path).unwrap();
        assert_eq!(field.shape(), (3, 4, 5));
        assert_eq!(field[(2, 3, 4)], 59.0);
        assert_eq!(field.spacing(), [1.0; 3]);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_open_npy_wrong_dimension() {
        let path = temp_path("vector.npy");
        write_npy(&path, &Array1::<f32>::zeros(8)).unwrap();
        let err = open_npy(&path).unwrap_err();
        assert!(matches!(err, OpenScanError::ReadNpyError(_)));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_missing_file() {
        assert!(open_scan(temp_path("missing.nii.gz")).is_err());
        assert!(open_npy(temp_path("missing.npy")).is_err());
    }
}
