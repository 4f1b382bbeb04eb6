//! 剥离: 对标量场及其掩码对称地裁去外壳, 以便观察内部结构.

use crate::{Idx3d, Mask, ScalarField, VolumeError, VolumeResult};
use ndarray::s;

/// 形状为 `shape` 的体数据所允许的最大剥离深度.
///
/// 深度必须小于最短维度长度的一半 (整数除法), 以保证每个维度至少保留两层.
/// 若返回 `None`, 则只接受深度 0 (恒等变换).
#[inline]
pub fn max_peel_depth((x, y, z): Idx3d) -> Option<usize> {
    (x.min(y).min(z) / 2).checked_sub(1)
}

/// 检查剥离深度.
fn check_depth(shape: Idx3d, depth: usize) -> VolumeResult<()> {
    if depth == 0 {
        return Ok(());
    }
    match max_peel_depth(shape) {
        Some(max) if depth <= max => Ok(()),
        max => Err(VolumeError::DepthTooLarge { depth, max }),
    }
}

/// 从 `field` 与 `mask` 的每个面各裁去 `depth` 层体素, 即在三个维度上都只保留
/// `[depth, len - depth)`. 两者同步裁剪, 对齐关系不变. 原数据不会被修改.
///
/// 深度为 0 时返回与输入相同的数据. 形状不一致或深度过大时返回 `Err`.
pub fn peel(field: &ScalarField, mask: &Mask, depth: usize) -> VolumeResult<(ScalarField, Mask)> {
    mask.check_shape(field)?;
    let shape = field.shape();
    check_depth(shape, depth)?;

    if depth == 0 {
        return Ok((field.clone(), mask.clone()));
    }

    let (x, y, z) = shape;
    let d = depth;
    let peeled_field = ScalarField::from_parts(
        field.data().slice(s![d..x - d, d..y - d, d..z - d]).to_owned(),
        field.spacing(),
    );
    let peeled_mask =
        Mask::from_raw_unchecked(mask.data().slice(s![d..x - d, d..y - d, d..z - d]).to_owned());

    log::debug!(
        "剥离深度 {depth}: {shape:?} -> {:?}, 剩余前景体素 {}",
        peeled_field.shape(),
        peeled_mask.count()
    );
    Ok((peeled_field, peeled_mask))
}

#[cfg(test)]
mod tests {
    use super::{max_peel_depth, peel};
    use crate::{Mask, ScalarField, VolumeError};
    use ndarray::s;

    fn ramp(shape: (usize, usize, usize)) -> (ScalarField, Mask) {
        let field =
            ScalarField::from_shape_fn(shape, |(x, y, z)| (x * 10_000 + y * 100 + z) as f32)
                .unwrap();
        let mask = Mask::from_shape_fn(shape, |(x, y, z)| (x + y + z) % 3 == 0).unwrap();
        (field, mask)
    }

    #[test]
    fn test_depth_zero_is_identity() {
        let (field, mask) = ramp((6, 7, 8));
        let (f, m) = peel(&field, &mask, 0).unwrap();
        assert_eq!(f, field);
        assert_eq!(m, mask);
    }

    #[test]
    fn test_peel_matches_direct_crop() {
        let (field, mask) = ramp((10, 12, 14));
        for d in 1..=4 {
            let (f, m) = peel(&field, &mask, d).unwrap();
            let (x, y, z) = (10 - d, 12 - d, 14 - d);
            let expected = field.data().slice(s![d..x, d..y, d..z]).to_owned();
            let expected_mask = mask.data().slice(s![d..x, d..y, d..z]).to_owned();
            assert_eq!(f.data(), expected);
            assert_eq!(m.data(), expected_mask);
            assert_eq!(f.shape(), m.shape());
            assert_eq!(f[(0, 0, 0)], field[(d, d, d)]);
        }
    }

    #[test]
    fn test_depth_bounds() {
        let (field, mask) = ramp((10, 10, 10));
        assert_eq!(max_peel_depth(field.shape()), Some(4));
        let (f, _) = peel(&field, &mask, 4).unwrap();
        assert_eq!(f.shape(), (2, 2, 2));
        assert_eq!(
            peel(&field, &mask, 5).unwrap_err(),
            VolumeError::DepthTooLarge {
                depth: 5,
                max: Some(4)
            }
        );
        assert!(peel(&field, &mask, 6).is_err());
    }

    #[test]
    fn test_odd_dimension_bounds() {
        let (field, mask) = ramp((5, 7, 9));
        assert_eq!(max_peel_depth(field.shape()), Some(1));
        let (f, m) = peel(&field, &mask, 1).unwrap();
        assert_eq!(f.shape(), (3, 5, 7));
        assert_eq!(m.shape(), (3, 5, 7));
        assert_eq!(f[(0, 0, 0)], field[(1, 1, 1)]);
        assert_eq!(
            peel(&field, &mask, 2).unwrap_err(),
            VolumeError::DepthTooLarge {
                depth: 2,
                max: Some(1)
            }
        );
    }

    #[test]
    fn test_thin_volume_only_accepts_zero() {
        let (field, mask) = ramp((1, 8, 8));
        assert_eq!(max_peel_depth(field.shape()), None);
        assert!(peel(&field, &mask, 0).is_ok());
        assert_eq!(
            peel(&field, &mask, 1).unwrap_err(),
            VolumeError::DepthTooLarge {
                depth: 1,
                max: None
            }
        );
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let (field, _) = ramp((6, 6, 6));
        let mask = Mask::background((6, 6, 5)).unwrap();
        assert!(matches!(
            peel(&field, &mask, 1),
            Err(VolumeError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_spacing_preserved() {
        let (field, mask) = ramp((6, 6, 6));
        let field = field.with_spacing([0.5, 0.5, 3.0]).unwrap();
        let (f, _) = peel(&field, &mask, 2).unwrap();
        assert_eq!(f.spacing(), [0.5, 0.5, 3.0]);
    }
}
