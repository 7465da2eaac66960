//! 调制复杂度评分 (MCS).
//!
//! 每个孔径的 MCS 是叶序变异度 (LSV) 与孔径面积变异度 (AAV) 的乘积.
//! AAV 的归一化分母由整个孔径序列共同决定, 因此本模块的入口一次
//! 接收完整序列而不是单个孔径.

use ordered_float::NotNan;

use super::div_or_zero;
use crate::aperture::{Aperture, LeafPair};

/// 逐孔径的 MCS.
pub(super) fn per_aperture(apertures: &[Aperture]) -> Vec<f64> {
    let aav_norm: f64 = apertures.iter().map(max_span).sum();
    apertures
        .iter()
        .map(|ap| lsv(ap) * aav(ap, aav_norm))
        .collect()
}

/// 未被 jaw 整体遮挡的叶片对.
fn exposed_pairs(ap: &Aperture) -> Vec<LeafPair> {
    let jaw = ap.jaw();
    ap.leaf_pairs()
        .iter()
        .filter(|p| !p.is_outside_jaw(jaw))
        .copied()
        .collect()
}

/// 单个孔径的最大开口跨度: 暴露叶片对中最靠右的 bank B 位置与
/// 最靠右的 bank A 位置之差的绝对值.
fn max_span(ap: &Aperture) -> f64 {
    let pairs = exposed_pairs(ap);
    let extreme = |pos: &dyn Fn(&LeafPair) -> f64| {
        pairs
            .iter()
            .map(|p| NotNan::new(pos(p)).unwrap())
            .max()
            .map(NotNan::into_inner)
    };
    match (extreme(&|p| p.left()), extreme(&|p| p.right())) {
        (Some(left), Some(right)) => (right - left).abs(),
        _ => 0.0,
    }
}

/// 叶序变异度: 两侧 bank 各自的位置变异度之积.
///
/// 参与统计的是所有未被 jaw 遮挡的叶片对, 闭合但暴露的叶片对
/// (如 field-in-field 中停在 0 的叶片) 同样计入. 暴露叶片对不足 2
/// 时序列无 "相邻差" 可言, 记为 0.
fn lsv(ap: &Aperture) -> f64 {
    let pairs = exposed_pairs(ap);
    if pairs.len() < 2 {
        return 0.0;
    }

    let bank = |pos: &dyn Fn(&LeafPair) -> f64| {
        let values: Vec<f64> = pairs.iter().map(|p| pos(p)).collect();
        bank_variability(&values)
    };
    bank(&|p| p.left()) * bank(&|p| p.right())
}

/// 单侧 bank 的位置变异度:
/// `(N * span - sum |pos[i+1] - pos[i]|) / (N * span)`,
/// 其中 span 是该 bank 位置的极差. 全 bank 对齐时 span 为 0, 记为 0.
fn bank_variability(values: &[f64]) -> f64 {
    let max = values
        .iter()
        .map(|&v| NotNan::new(v).unwrap())
        .max()
        .map(NotNan::into_inner)
        .unwrap_or(0.0);
    let min = values
        .iter()
        .map(|&v| NotNan::new(v).unwrap())
        .min()
        .map(NotNan::into_inner)
        .unwrap_or(0.0);
    let span = max - min;

    let n = values.len() as f64;
    let adjacent: f64 = values.windows(2).map(|w| (w[1] - w[0]).abs()).sum();
    div_or_zero(n * span - adjacent, n * span)
}

/// 孔径面积变异度: 暴露叶片对的开口宽度之和除以序列级归一化分母.
fn aav(ap: &Aperture, aav_norm: f64) -> f64 {
    let jaw = ap.jaw();
    let opening: f64 = exposed_pairs(ap).iter().map(|p| p.field_size(jaw)).sum();
    div_or_zero(opening, aav_norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn aperture(lefts: &[f64], rights: &[f64]) -> Aperture {
        let mut data = lefts.to_vec();
        data.extend_from_slice(rights);
        let positions = Array2::from_shape_vec((2, lefts.len()), data).unwrap();
        let widths = vec![10.0; lefts.len()];
        Aperture::new(positions.view(), &widths, [-200.0, 200.0, 200.0, -200.0], 0.0)
    }

    /// 手算对照: lefts [-10,-20,-10], rights [10,20,10].
    /// LSV = (1/3)*(1/3), aav_norm = |20-(-10)| = 30, AAV = 80/30.
    #[test]
    fn test_single_aperture_mcs() {
        let ap = aperture(&[-10.0, -20.0, -10.0], &[10.0, 20.0, 10.0]);
        let values = per_aperture(std::slice::from_ref(&ap));

        assert_eq!(values.len(), 1);
        assert!(f64_eq(lsv(&ap), 1.0 / 9.0));
        assert!(f64_eq(values[0], 80.0 / 270.0));
    }

    /// 闭合但暴露的叶片对计入 LSV 统计.
    ///
    /// 手算对照: lefts [0,-10,-20], rights [0,10,20], 每 bank
    /// span = 20, 相邻差之和 20, 变异度 (60-20)/60 = 2/3,
    /// LSV = 4/9; 开口宽度和 60, aav_norm = |20-0| = 20,
    /// AAV = 3, MCS = 4/3. 若把停在 0 的叶片对排除, LSV 会缩成
    /// 1/4 而 MCS 错成 0.75.
    #[test]
    fn test_closed_exposed_pair_counts_in_lsv() {
        let ap = aperture(&[0.0, -10.0, -20.0], &[0.0, 10.0, 20.0]);
        assert!(f64_eq(lsv(&ap), 4.0 / 9.0));

        let values = per_aperture(std::slice::from_ref(&ap));
        assert!(f64_eq(values[0], 4.0 / 3.0));
    }

    /// 矩形野两 bank 都对齐, 极差为 0, LSV 记 0.
    #[test]
    fn test_aligned_bank_lsv_is_zero() {
        let ap = aperture(&[-30.0, -30.0, -30.0], &[30.0, 30.0, 30.0]);
        assert!(f64_eq(lsv(&ap), 0.0));
    }

    /// 全闭孔径: 两 bank 极差与开口宽度都为 0, MCS 为 0.
    #[test]
    fn test_closed_aperture() {
        let ap = aperture(&[0.0, 0.0], &[0.0, 0.0]);
        let values = per_aperture(std::slice::from_ref(&ap));
        assert!(f64_eq(values[0], 0.0));
    }

    /// 归一化分母跨越整个序列: 同一孔径在更大的序列里 AAV 变小.
    #[test]
    fn test_aav_norm_spans_sequence() {
        let small = aperture(&[-10.0, -20.0, -10.0], &[10.0, 20.0, 10.0]);
        let large = aperture(&[-40.0, -40.0, -40.0], &[40.0, 40.0, 40.0]);

        let alone = per_aperture(std::slice::from_ref(&small))[0];
        let paired = per_aperture(&[small.clone(), large])[0];
        // 分母从 30 变成 30 + 80 = 110.
        assert!(f64_eq(alone, 80.0 / 270.0));
        assert!(f64_eq(paired, (1.0 / 9.0) * (80.0 / 110.0)));
    }
}
