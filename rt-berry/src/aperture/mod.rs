//! MLC 孔径几何模型.
//!
//! 一个孔径是一个控制点下完整的 MLC 状态: jaw + 有序叶片对序列.
//! 叶片坐标遵循 IEC 61217 标准:
//!
//! ```text
//!                   Negative Y         x = 等中心 (0, 0)
//!                       -
//!                       |
//! Negative X |----------x----------| Positive X
//!                       |
//!                       -
//!                   Positive Y
//! ```
//!
//! 叶片对按索引 0 = 物理最上方排列; 顶端位置由叶宽推导,
//! 规定中间索引处叶片对的顶端正好落在等中心.

mod builder;
mod leaf;

pub use builder::apertures_from_beam;
pub use leaf::{Jaw, LeafPair, Rect};

use itertools::izip;
use ndarray::ArrayView2;
use std::fmt::Formatter;

/// 一个控制点下完整的 MLC 状态. 构建后不可变.
///
/// jaw 在孔径内只有这一份实例, 所有叶片对的几何运算都引用它.
#[derive(Clone)]
pub struct Aperture {
    jaw: Jaw,
    leaf_pairs: Vec<LeafPair>,
    gantry_angle: f64,
}

impl Aperture {
    /// 从叶片位置矩阵构造孔径.
    ///
    /// `leaf_positions` 形状为 `(2, N)`: 第一行是 bank A (left),
    /// 第二行是 bank B (right). `jaw` 依次为 `[left, top, right, bottom]`.
    ///
    /// 叶片位置列数与叶宽个数不一致时 panic.
    pub fn new(
        leaf_positions: ArrayView2<f64>,
        leaf_widths: &[f64],
        jaw: [f64; 4],
        gantry_angle: f64,
    ) -> Self {
        assert_eq!(
            leaf_positions.nrows(),
            2,
            "叶片位置矩阵必须恰好两行 (bank A/B)"
        );
        assert_eq!(
            leaf_positions.ncols(),
            leaf_widths.len(),
            "叶片位置列数与叶宽个数必须一致"
        );

        let tops = leaf_tops(leaf_widths);
        let leaf_pairs = izip!(
            leaf_positions.row(0),
            leaf_positions.row(1),
            leaf_widths,
            &tops
        )
        .map(|(&left, &right, &width, &top)| LeafPair::new(left, right, width, top))
        .collect();

        Self {
            jaw: Jaw::new(Rect::new(jaw[0], jaw[1], jaw[2], jaw[3])),
            leaf_pairs,
            gantry_angle,
        }
    }

    /// 本控制点的 jaw.
    #[inline]
    pub fn jaw(&self) -> &Jaw {
        &self.jaw
    }

    /// 有序叶片对序列 (索引 0 = 物理最上方).
    #[inline]
    pub fn leaf_pairs(&self) -> &[LeafPair] {
        &self.leaf_pairs
    }

    /// 机架角 (度).
    #[inline]
    pub fn gantry_angle(&self) -> f64 {
        self.gantry_angle
    }

    /// 开口面积: 所有叶片对被 jaw 裁剪后的开口面积之和.
    pub fn area(&self) -> f64 {
        self.leaf_pairs
            .iter()
            .map(|lp| lp.field_area(&self.jaw))
            .sum()
    }

    /// 每个叶片对被 jaw 裁剪后的开口面积.
    pub fn leaf_pair_areas(&self) -> Vec<f64> {
        self.leaf_pairs
            .iter()
            .map(|lp| lp.field_area(&self.jaw))
            .collect()
    }

    /// 是否存在打开但被 jaw 遮挡的叶片对? 诊断信号, 不参与度量.
    pub fn has_open_leaf_behind_jaws(&self) -> bool {
        self.leaf_pairs
            .iter()
            .any(|lp| lp.is_open_but_behind_jaw(&self.jaw))
    }

    /// 沿叶片运动方向暴露的边界总长.
    ///
    /// 组成: 首叶片对的顶端开口边 + 尾叶片对的底端开口边 +
    /// 相邻叶片对分界处的暴露长度. 为与既有验证过的数值保持一致,
    /// 求和保留了 "尾对-首对" 的环绕项, 其值等于首尾两对裁剪后开口
    /// 端点的错位量 (开口不相交时为两条开口边之和); 首尾两对开口一致
    /// 或均闭合的常见孔径下为 0. 详见 DESIGN.md.
    pub fn side_perimeter(&self) -> f64 {
        if self.leaf_pairs.is_empty() {
            return 0.0;
        }

        let mut perimeter = self.leaf_pairs[0].field_size(&self.jaw);
        for i in 0..self.leaf_pairs.len() {
            let prev = i.checked_sub(1).unwrap_or(self.leaf_pairs.len() - 1);
            perimeter += self.boundary_length(&self.leaf_pairs[prev], &self.leaf_pairs[i]);
        }
        perimeter + self.leaf_pairs.last().unwrap().field_size(&self.jaw)
    }

    /// 上下相邻两叶片对分界处暴露的边界长. 分类讨论按优先级排列.
    fn boundary_length(&self, top: &LeafPair, bottom: &LeafPair) -> f64 {
        let jaw = &self.jaw;

        // 两对都在 jaw 之外: 分界不曝光.
        if top.is_outside_jaw(jaw) && bottom.is_outside_jaw(jaw) {
            return 0.0;
        }

        // jaw 顶边不高于该分界: 只有下对的开口边暴露.
        if jaw.top() <= top.bottom() {
            return bottom.field_size(jaw);
        }

        // jaw 底边不低于该分界: 只有上对的开口边暴露.
        if jaw.bottom() >= bottom.top() {
            return top.field_size(jaw);
        }

        // 两对开口在运动方向上不相交: 两条开口边完整暴露.
        if bottom.left() > top.right() || bottom.right() < top.left() {
            return top.field_size(jaw) + bottom.field_size(jaw);
        }

        // 相交: 暴露长度是两侧裁剪后端点的错位量.
        let top_left = jaw.left().max(top.left());
        let bottom_left = jaw.left().max(bottom.left());
        let top_right = jaw.right().min(top.right());
        let bottom_right = jaw.right().min(bottom.right());
        (top_left - bottom_left).abs() + (top_right - bottom_right).abs()
    }
}

impl std::fmt::Debug for Aperture {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "Aperture {{ gantry: {:.1}°, pairs: {} }}",
            self.gantry_angle,
            self.leaf_pairs.len()
        ))
    }
}

/// 依据叶宽推导每个叶片对的顶端位置 (相对等中心).
///
/// 规定序列中间索引处叶片对的顶端正好为 0, 其余向两端累加叶宽.
fn leaf_tops(widths: &[f64]) -> Vec<f64> {
    let mut tops = vec![0.0; widths.len()];
    let middle = widths.len() / 2;

    for i in (middle + 1)..widths.len() {
        tops[i] = tops[i - 1] - widths[i - 1];
    }
    for i in (0..middle).rev() {
        tops[i] = tops[i + 1] + widths[i];
    }
    tops
}

#[cfg(test)]
mod tests {
    use super::{leaf_tops, Aperture};
    use ndarray::array;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    const OPEN: [f64; 4] = [-200.0, 200.0, 200.0, -200.0];

    /// 10 对均匀叶片, 全部打开到 ±50 毫米.
    fn square_aperture() -> Aperture {
        let positions = array![[-50.0; 10], [50.0; 10]];
        Aperture::new(positions.view(), &[10.0; 10], OPEN, 0.0)
    }

    #[test]
    fn test_leaf_tops_even() {
        // 中间索引 (2) 的顶端正好是 0.
        let tops = leaf_tops(&[10.0, 10.0, 10.0, 10.0]);
        assert_eq!(tops, vec![20.0, 10.0, 0.0, -10.0]);
    }

    #[test]
    fn test_leaf_tops_odd() {
        let tops = leaf_tops(&[10.0, 10.0, 10.0]);
        assert_eq!(tops, vec![10.0, 0.0, -10.0]);
    }

    /// 完全矩形无遮挡孔径: 面积 W*H, 侧向周长 2W (内部分界全为 0).
    #[test]
    fn test_square_field() {
        let ap = square_aperture();
        assert!(f64_eq(ap.area(), 10_000.0));
        assert!(f64_eq(ap.side_perimeter(), 200.0));
        assert!(!ap.has_open_leaf_behind_jaws());
    }

    /// 空孔径的周长为 0.
    #[test]
    fn test_empty_aperture() {
        let positions = ndarray::Array2::<f64>::zeros((2, 0));
        let ap = Aperture::new(positions.view(), &[], OPEN, 0.0);
        assert!(f64_eq(ap.area(), 0.0));
        assert!(f64_eq(ap.side_perimeter(), 0.0));
    }

    /// 阶梯孔径: 相邻开口相交时, 分界贡献两侧端点的错位量.
    #[test]
    fn test_step_boundary() {
        let positions = array![[-50.0, -30.0], [50.0, 40.0]];
        let ap = Aperture::new(positions.view(), &[10.0, 10.0], OPEN, 0.0);

        // 顶端 100 + 分界 (20 + 10) + 底端 70, 外加同样错位的环绕项 30.
        assert!(f64_eq(ap.side_perimeter(), 230.0));
    }

    /// 开口不相交的相邻叶片对: 两条开口边都完整暴露.
    /// 注意首尾两对不相交时, 环绕项会把两条开口边再计一次
    /// (与既有验证数值保持一致).
    #[test]
    fn test_disjoint_boundary() {
        let positions = array![[-50.0, 10.0], [-10.0, 50.0]];
        let ap = Aperture::new(positions.view(), &[10.0, 10.0], OPEN, 0.0);

        // 顶端 40 + 分界 (40 + 40) + 底端 40 = 160, 外加环绕项 80.
        assert!(f64_eq(ap.side_perimeter(), 240.0));
    }

    /// jaw 把分界完全挡住时, 只计一侧开口边.
    #[test]
    fn test_jaw_covers_boundary() {
        // 两对叶片: 上对 y 0..10, 下对 y -10..0, 都开到 ±50.
        let positions = array![[-50.0, -50.0], [50.0, 50.0]];

        // jaw 顶边压到 y = -2: 上对整体在 jaw 外, 分界处只暴露下对开口.
        let ap = Aperture::new(
            positions.view(),
            &[10.0, 10.0],
            [-200.0, -2.0, 200.0, -200.0],
            0.0,
        );
        // 顶端 0 (上对 outside) + 分界 100 (下对) + 底端 100; 环绕项:
        // jaw.bottom < 下对 top 且相交 → 错位 0.
        assert!(f64_eq(ap.side_perimeter(), 200.0));

        // jaw 底边抬到 y = 2: 对称情形.
        let ap = Aperture::new(
            positions.view(),
            &[10.0, 10.0],
            [-200.0, 200.0, 200.0, 2.0],
            0.0,
        );
        assert!(f64_eq(ap.side_perimeter(), 200.0));
    }

    /// 每叶片对面积与总面积一致.
    #[test]
    fn test_leaf_pair_areas() {
        let ap = square_aperture();
        let areas = ap.leaf_pair_areas();
        assert_eq!(areas.len(), 10);
        assert!(f64_eq(areas.iter().sum::<f64>(), ap.area()));
    }

    /// 打开但被 jaw 遮挡的叶片对会被诊断出来.
    #[test]
    fn test_open_leaf_behind_jaws() {
        let positions = array![[-80.0, -50.0], [50.0, 50.0]];
        let ap = Aperture::new(
            positions.view(),
            &[10.0, 10.0],
            [-60.0, 200.0, 200.0, -200.0],
            0.0,
        );
        assert!(ap.has_open_leaf_behind_jaws());
    }
}
