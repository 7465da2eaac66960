//! 从射野的控制点序列构建孔径序列.

use ndarray::Array2;
use ordered_float::NotNan;

use super::Aperture;
use crate::consts::{HALCYON_LEAF_PAIRS, OPEN_JAW_MM};
use crate::metric::{MetricError, MetricResult};
use crate::plan::{Beam, ControlPoint, DeviceKind};

/// 将一个射野的控制点序列转换成孔径序列 (投照顺序).
///
/// - 叶宽取首个 MLC 类设备描述的叶片边界差分; 该设备缺失时返回
///   `Err(MetricError::MissingMlcDevice)` —— 不会静默当作零宽.
/// - jaw 初始取射野级 ASYMX/ASYMY, 缺省为每方向 ±200 毫米全开;
///   控制点可更新 jaw, 最近一次解析得到的 jaw 顺延到后续控制点.
/// - 机架角优先取控制点级, 缺省回退到射野级; 两级都未给出时按
///   0 度处理 (静态野的 loader 常省略机架角, 该缺省是约定的一部分).
/// - 无法解析叶片位置的控制点被跳过, 不产生孔径. 下游的逐控制点
///   序列因此可能短于控制点数, 该行为属于既定语义, 不要 "修复".
pub fn apertures_from_beam(beam: &Beam) -> MetricResult<Vec<Aperture>> {
    let leaf_widths = leaf_widths(beam)?;
    let mut jaw = beam_jaw(beam);

    let mut apertures = Vec::with_capacity(beam.control_points.len());
    for cp in &beam.control_points {
        let gantry_angle = cp.gantry_angle.or(beam.gantry_angle).unwrap_or(0.0);
        if let Some(updated) = control_point_jaw(cp, &leaf_widths) {
            jaw = updated;
        }
        if let Some(positions) = leaf_positions(cp) {
            apertures.push(Aperture::new(
                positions.view(),
                &leaf_widths,
                jaw,
                gantry_angle,
            ));
        }
    }
    Ok(apertures)
}

/// MLC 类设备的叶宽: 叶片边界位置的逐项差分.
fn leaf_widths(beam: &Beam) -> MetricResult<Vec<f64>> {
    beam.limiting_devices
        .iter()
        .find(|dev| dev.kind.is_mlc())
        .map(|dev| {
            dev.leaf_position_boundaries
                .windows(2)
                .map(|w| w[1] - w[0])
                .collect()
        })
        .ok_or(MetricError::MissingMlcDevice)
}

/// 射野级 jaw. 设备约定的 Y 轴与孔径的笛卡尔约定相反, 须取负.
fn beam_jaw(beam: &Beam) -> [f64; 4] {
    let [left, right] = beam.asym_x.unwrap_or([-OPEN_JAW_MM, OPEN_JAW_MM]);
    let [top, bottom] = beam.asym_y.unwrap_or([-OPEN_JAW_MM, OPEN_JAW_MM]);
    [left, -top, right, -bottom]
}

/// 控制点的叶片位置矩阵 `(2, N)`. MLC 位置数组前一半是 bank A,
/// 后一半是 bank B. 控制点没有 MLC 位置时返回 `None`.
fn leaf_positions(cp: &ControlPoint) -> Option<Array2<f64>> {
    let positions = cp
        .device_positions
        .iter()
        .find(|p| p.kind.is_mlc())
        .map(|p| &p.positions)?;

    let n = positions.len() / 2;
    if n == 0 || positions.len() % 2 != 0 {
        return None;
    }
    Array2::from_shape_vec((2, n), positions.clone()).ok()
}

/// 控制点级 jaw 更新. 没有可解析的 jaw 时返回 `None` (沿用旧 jaw).
///
/// 解析优先级: 普通 X/Y 先于 ASYMX/ASYMY, 两者只适用于非 Halcyon
/// 机型; 恰好 28 对叶片的 Halcyon 系 MLC 没有独立 jaw, 由叶片位置反推.
fn control_point_jaw(cp: &ControlPoint, leaf_widths: &[f64]) -> Option<[f64; 4]> {
    if leaf_widths.len() != HALCYON_LEAF_PAIRS {
        let explicit = cp
            .position_of(DeviceKind::X)
            .zip(cp.position_of(DeviceKind::Y))
            .or_else(|| {
                cp.position_of(DeviceKind::AsymX)
                    .zip(cp.position_of(DeviceKind::AsymY))
            });
        return explicit.map(|(x, y)| [x[0], -y[0], x[1], -y[1]]);
    }

    cp.device_positions
        .iter()
        .filter(|p| p.kind.is_mlc())
        .find_map(|p| jaw_from_leaves(&p.positions, leaf_widths))
}

/// 从 Halcyon MLC 的叶片位置反推 jaw.
///
/// left/right 取两 bank 位置发生分歧的叶片中最小的 bank A 位置与
/// 最大的 bank B 位置; top/bottom 由首个/末个分歧叶片对的索引经
/// 叶宽累加换算成相对等中心的物理偏移.
///
/// 两 bank 完全一致 (射野全闭) 时无从推断, 返回 `None`.
fn jaw_from_leaves(positions: &[f64], leaf_widths: &[f64]) -> Option<[f64; 4]> {
    let n = positions.len() / 2;
    let (bank_a, bank_b) = positions.split_at(n);

    let differ: Vec<usize> = (0..n).filter(|&i| bank_a[i] != bank_b[i]).collect();
    let (&first, &last) = (differ.first()?, differ.last()?);

    let left = differ
        .iter()
        .map(|&i| NotNan::new(bank_a[i]).unwrap())
        .min()?
        .into_inner();
    let right = differ
        .iter()
        .map(|&i| NotNan::new(bank_b[i]).unwrap())
        .max()?
        .into_inner();

    let center = n / 2;
    // 索引在中心上方向上累加叶宽为正偏移, 下方为负.
    let offset = |idx: usize| -> f64 {
        if idx < center {
            leaf_widths[idx..center].iter().sum()
        } else {
            -leaf_widths[center..idx].iter().sum::<f64>()
        }
    };
    let bottom = offset(first);
    let top = offset(last);

    Some([left, -top, right, -bottom])
}
