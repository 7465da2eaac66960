//! 孔径复杂度度量与 MU 加权聚合框架.
//!
//! 所有度量都先定义在 "单个孔径" 粒度上, 再沿两级加权向上聚合:
//!
//! 1. 射野级: 逐控制点的度量值按该控制点分得的 MU 加权平均;
//! 2. 计划级: 各治疗射野的度量值按射野总 MU 加权平均.
//!
//! 非治疗射野与 MU 不为正的射野不参与计划级聚合.

use cfg_if::cfg_if;

mod error;
mod mcs;

pub use error::MetricError;

use crate::aperture::{apertures_from_beam, Aperture};
use crate::meterset;
use crate::plan::{Beam, Plan};

/// 度量计算的统一结果类型.
pub type MetricResult<T> = Result<T, MetricError>;

/// 单孔径复杂度度量的种类.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ApertureMetric {
    /// 边缘度量: 侧向周长与开口面积之比 (1/毫米).
    Edge,

    /// 开口面积 (平方毫米).
    Area,

    /// 打开叶片对的平均开口面积 (平方毫米).
    MeanLeafArea,

    /// 不规则度: `侧向周长^2 / (4 * PI * 面积)`, 无量纲.
    Irregularity,

    /// 调制复杂度评分 (MCS), 见 [`mcs`] 模块.
    Mcs,
}

impl ApertureMetric {
    /// 对孔径序列逐个求值.
    ///
    /// MCS 的归一化分母跨越整个序列, 其余度量逐孔径独立.
    pub fn per_aperture(&self, apertures: &[Aperture]) -> Vec<f64> {
        match self {
            Self::Edge => apertures
                .iter()
                .map(|ap| div_or_zero(ap.side_perimeter(), ap.area()))
                .collect(),
            Self::Area => apertures.iter().map(Aperture::area).collect(),
            Self::MeanLeafArea => apertures.iter().map(mean_leaf_area).collect(),
            Self::Irregularity => apertures
                .iter()
                .map(|ap| {
                    let p = ap.side_perimeter();
                    div_or_zero(p * p, 4.0 * std::f64::consts::PI * ap.area())
                })
                .collect(),
            Self::Mcs => mcs::per_aperture(apertures),
        }
    }

    /// 计划级度量: 各治疗射野的射野级度量按总 MU 加权平均.
    ///
    /// 计划中没有 MU 为正的治疗射野时返回
    /// `Err(MetricError::NoTreatmentBeams)`.
    pub fn for_plan(&self, plan: &Plan) -> MetricResult<f64> {
        let beams: Vec<&Beam> = plan.treatment_beams().collect();
        if beams.is_empty() {
            return Err(MetricError::NoTreatmentBeams);
        }

        cfg_if! {
            if #[cfg(feature = "rayon")] {
                use rayon::prelude::*;
                let per_beam = beams
                    .par_iter()
                    .map(|b| self.beam_value(b))
                    .collect::<MetricResult<Vec<_>>>()?;
            } else {
                let per_beam = beams
                    .iter()
                    .map(|b| self.beam_value(b))
                    .collect::<MetricResult<Vec<_>>>()?;
            }
        }

        let weight_sum: f64 = per_beam.iter().map(|&(_, mu)| mu).sum();
        let value_sum: f64 = per_beam.iter().map(|&(v, mu)| v * mu).sum();
        Ok(div_or_zero(value_sum, weight_sum))
    }

    /// 射野级度量: 逐控制点度量按控制点 MU 份额加权平均.
    pub fn for_beam(&self, beam: &Beam) -> MetricResult<f64> {
        let values = self.per_control_point_unweighted(beam)?;
        let weights = meterset::per_control_point(beam)?;
        Ok(weighted_mean(&values, &weights))
    }

    /// 逐控制点的未加权度量值.
    ///
    /// 无法解析叶片位置的控制点不产生孔径, 序列可能短于控制点数.
    pub fn per_control_point_unweighted(&self, beam: &Beam) -> MetricResult<Vec<f64>> {
        Ok(self.per_aperture(&apertures_from_beam(beam)?))
    }

    /// 逐控制点的加权度量值 (度量值乘以归一化 MU 权重).
    /// 求和即为射野级度量.
    pub fn per_control_point_weighted(&self, beam: &Beam) -> MetricResult<Vec<f64>> {
        let values = self.per_control_point_unweighted(beam)?;
        let weights = control_point_weights(beam)?;
        Ok(values
            .iter()
            .zip(&weights)
            .map(|(v, w)| v * w)
            .collect())
    }

    fn beam_value(&self, beam: &Beam) -> MetricResult<(f64, f64)> {
        Ok((self.for_beam(beam)?, beam.mu.unwrap_or(0.0)))
    }
}

/// 归一化的控制点 MU 权重 (之和为 1).
pub fn control_point_weights(beam: &Beam) -> MetricResult<Vec<f64>> {
    let shares = meterset::per_control_point(beam)?;
    let total: f64 = shares.iter().sum();
    Ok(shares.iter().map(|&s| div_or_zero(s, total)).collect())
}

/// 加权平均. 分子对两序列按较短者对齐截断, 分母始终是全部权重之和:
/// 被跳过的控制点不产生度量值, 但它的 MU 份额仍计入归一化.
/// 权重和为 0 时记 0.
fn weighted_mean(values: &[f64], weights: &[f64]) -> f64 {
    let value_sum: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    let weight_sum: f64 = weights.iter().sum();
    div_or_zero(value_sum, weight_sum)
}

/// 打开叶片对的平均开口面积. 没有打开的叶片对时记 0.
fn mean_leaf_area(ap: &Aperture) -> f64 {
    let areas: Vec<f64> = ap
        .leaf_pair_areas()
        .into_iter()
        .filter(|&a| a != 0.0)
        .collect();
    div_or_zero(areas.iter().sum(), areas.len() as f64)
}

/// 分母为 0 时约定商为 0, 统一消除各度量中的退化情形.
#[inline]
pub(crate) fn div_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}
