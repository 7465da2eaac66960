//! 把控制点的累积 meterset 权重换算成逐控制点的机器跳数 (MU).

use crate::consts;
use crate::metric::{MetricError, MetricResult};
use crate::plan::Beam;

/// 逐控制点的 MU 份额.
///
/// 累积权重先按最后一个权重归一化并乘以射野总 MU, 再对累积序列
/// 做梯形化反差分: 每个控制点分得相邻两段增量各一半, 因此整个
/// 序列之和恰等于射野总 MU.
///
/// 剂量计单位不是 MU 时返回 `Err(MetricError::UnsupportedDosimeterUnit)`;
/// 射野没有 MU 返回 `Err(MetricError::MissingMeterset)`;
/// 没有控制点返回 `Err(MetricError::NoControlPoints)`.
pub fn per_control_point(beam: &Beam) -> MetricResult<Vec<f64>> {
    Ok(undo_cumulative_sum(&cumulative(beam)?))
}

/// 逐控制点的累积 MU (已按总 MU 缩放).
pub fn cumulative(beam: &Beam) -> MetricResult<Vec<f64>> {
    if !consts::is_mu_unit(&beam.primary_dosimeter_unit) {
        return Err(MetricError::UnsupportedDosimeterUnit(
            beam.primary_dosimeter_unit.clone(),
        ));
    }
    let total = beam.mu.ok_or(MetricError::MissingMeterset)?;
    let last = beam
        .control_points
        .last()
        .ok_or(MetricError::NoControlPoints)?
        .cumulative_meterset_weight;

    Ok(beam
        .control_points
        .iter()
        .map(|cp| total * cp.cumulative_meterset_weight / last)
        .collect())
}

/// 累积序列的梯形化反差分.
///
/// 与朴素差分不同, 相邻控制点间的增量被均分到两端, 使每个控制点的
/// 份额代表 "它前后半段" 的出束量.
fn undo_cumulative_sum(cumulative: &[f64]) -> Vec<f64> {
    let mut shares = vec![0.0; cumulative.len()];
    for (i, w) in cumulative.windows(2).enumerate() {
        let half = (w[1] - w[0]) / 2.0;
        shares[i] += half;
        shares[i + 1] += half;
    }
    shares
}
