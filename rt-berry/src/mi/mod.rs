//! 调制指数 (MI) 引擎.
//!
//! 把孔径序列还原成叶片速度/加速度的时间序列, 统计超过阈值因子
//! `f` 倍标准差的样本占比 `z(f)`, 再把 `z` 在 `[0, k]` 上积分得到
//! 速度指数, 加速度指数与综合指数. 综合指数额外用机架加速度与
//! 剂量率变化的 logistic 权重放大对应控制点的贡献.
//!
//! 时间模型: 相邻控制点间的 MU 增量低于阈值时出束时间取固定的
//! MLC 换位死区, 否则按额定剂量率折算, 两段在阈值处衔接.

mod quad;

use cfg_if::cfg_if;
use itertools::izip;
use ndarray::{Array2, ArrayView1};

use crate::aperture::{apertures_from_beam, Aperture};
use crate::consts::mi as mi_consts;
use crate::meterset;
use crate::metric::{MetricError, MetricResult};
use crate::plan::{Beam, Plan};

/// MI 计算的可调参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MiOptions {
    /// 阈值因子积分上限. 指数是 `z(f)` 在 `[0, k]` 上的定积分.
    pub k: f64,

    /// logistic 权重的尺度参数.
    pub alpha: f64,

    /// logistic 权重的饱和值 (`x` 趋于无穷时权重趋于 `beta`).
    pub beta: f64,
}

impl Default for MiOptions {
    fn default() -> Self {
        Self {
            k: mi_consts::DEFAULT_K,
            alpha: mi_consts::DEFAULT_ALPHA,
            beta: mi_consts::DEFAULT_BETA,
        }
    }
}

/// 一次 MI 计算得到的三个指数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModulationIndices {
    /// 速度指数: 只看叶片速度.
    pub speed: f64,

    /// 加速度指数: 叶片速度或加速度任一超阈值即计数.
    pub acceleration: f64,

    /// 综合指数: 加速度口径再乘机架/剂量率 logistic 权重.
    pub total: f64,
}

/// 计划级 MI: 各治疗射野的孔径序列按投照顺序拼接, 累积 MU 原样
/// 衔接 (不平移). 配合差分取绝对值, 射野分界处的 MU 差分等于前一
/// 射野的总 MU, 换野间隔按出束时间折算.
///
/// 没有 MU 为正的治疗射野时返回 `Err(MetricError::NoTreatmentBeams)`.
pub fn for_plan(plan: &Plan, options: &MiOptions) -> MetricResult<ModulationIndices> {
    let (apertures, cumulative) = concatenated_series(plan)?;
    if apertures.is_empty() {
        return Err(MetricError::NoTreatmentBeams);
    }

    Ok(Series::build(&apertures, &cumulative)?.integrate(options))
}

/// 把计划内所有治疗射野的孔径与累积 MU 按投照顺序拼接.
fn concatenated_series(plan: &Plan) -> MetricResult<(Vec<Aperture>, Vec<f64>)> {
    let mut apertures = Vec::new();
    let mut cumulative = Vec::new();

    for beam in plan.treatment_beams() {
        let beam_apertures = apertures_from_beam(beam)?;
        let beam_cumulative = meterset::cumulative(beam)?;
        let n = beam_apertures.len().min(beam_cumulative.len());

        apertures.extend(beam_apertures.into_iter().take(n));
        cumulative.extend_from_slice(&beam_cumulative[..n]);
    }
    Ok((apertures, cumulative))
}

/// 射野级 MI.
pub fn for_beam(beam: &Beam, options: &MiOptions) -> MetricResult<ModulationIndices> {
    let apertures = apertures_from_beam(beam)?;
    let cumulative = meterset::cumulative(beam)?;
    let n = apertures.len().min(cumulative.len());
    Ok(Series::build(&apertures[..n], &cumulative[..n])?.integrate(options))
}

/// 由孔径序列与累积 MU 导出的运动学时间序列.
///
/// 叶片位置矩阵的每一行是一个控制点, 列为 bank A 各叶片位置接
/// bank B 各叶片位置. 速度比位置少一行, 加速度再少一行.
#[derive(Debug)]
struct Series {
    ncp: usize,
    /// 相邻控制点间的出束时间 (秒), 长度 `ncp - 1`.
    time: Vec<f64>,
    /// 叶片速度, `(ncp - 1, 列数)`.
    mlc_speed: Array2<f64>,
    /// 逐列 (逐叶片) 的速度总体标准差.
    mlc_speed_std: Vec<f64>,
    /// 叶片加速度, `(ncp - 2, 列数)`.
    mlc_acc: Array2<f64>,
    mlc_acc_std: Vec<f64>,
    /// 机架角加速度 (度每二次方秒), 长度 `ncp - 2`.
    gantry_acc: Vec<f64>,
    /// 相邻区间剂量率之差的绝对值 (MU 每秒), 长度 `ncp - 2`.
    delta_dose_rate: Vec<f64>,
}

impl Series {
    /// 从孔径序列与对应的累积 MU 构建时间序列.
    ///
    /// 速度的标准差需要至少两个样本, 少于 3 个控制点时返回
    /// `Err(MetricError::TooFewControlPoints)`.
    fn build(apertures: &[Aperture], cumulative_mu: &[f64]) -> MetricResult<Series> {
        let ncp = apertures.len();
        if ncp < 3 {
            return Err(MetricError::TooFewControlPoints(ncp, 3));
        }
        assert_eq!(ncp, cumulative_mu.len(), "孔径数与累积 MU 数不一致");

        let pairs = apertures[0].leaf_pairs().len();
        assert!(
            apertures.iter().all(|ap| ap.leaf_pairs().len() == pairs),
            "同一序列的孔径必须有相同的叶片对数"
        );
        let columns = 2 * pairs;

        let mut positions = Array2::zeros((ncp, columns));
        for (i, ap) in apertures.iter().enumerate() {
            for (j, pair) in ap.leaf_pairs().iter().enumerate() {
                positions[[i, j]] = pair.left();
                positions[[i, pairs + j]] = pair.right();
            }
        }

        // 差分取绝对值: 计划级序列按射野原样衔接, 分界处的回绕差分
        // 应等于前一射野的总 MU.
        let delta_mu: Vec<f64> = cumulative_mu
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .collect();
        let time: Vec<f64> = delta_mu.iter().map(|&d| control_point_time(d)).collect();

        let mut mlc_speed = Array2::zeros((ncp - 1, columns));
        for i in 0..ncp - 1 {
            for j in 0..columns {
                mlc_speed[[i, j]] = (positions[[i + 1, j]] - positions[[i, j]]).abs() / time[i];
            }
        }

        // 加速度与较晚一段的出束时间对齐: acc[i] = |speed[i+1] -
        // speed[i]| / time[i+1].
        let mut mlc_acc = Array2::zeros((ncp - 2, columns));
        for i in 0..ncp - 2 {
            for j in 0..columns {
                mlc_acc[[i, j]] = (mlc_speed[[i + 1, j]] - mlc_speed[[i, j]]).abs() / time[i + 1];
            }
        }

        let mlc_speed_std = (0..columns).map(|j| column_std(mlc_speed.column(j))).collect();
        let mlc_acc_std = (0..columns).map(|j| column_std(mlc_acc.column(j))).collect();

        let gantry: Vec<f64> = apertures.iter().map(Aperture::gantry_angle).collect();
        let gantry_speed: Vec<f64> = izip!(gantry.windows(2), &time)
            .map(|(w, &t)| circular_diff(w[1], w[0]) / t)
            .collect();
        let gantry_acc: Vec<f64> = (0..ncp - 2)
            .map(|i| (gantry_speed[i + 1] - gantry_speed[i]).abs() / time[i + 1])
            .collect();

        let dose_rate: Vec<f64> = izip!(&delta_mu, &time).map(|(&d, &t)| d / t).collect();
        let delta_dose_rate: Vec<f64> = dose_rate.windows(2).map(|w| (w[1] - w[0]).abs()).collect();

        Ok(Series {
            ncp,
            time,
            mlc_speed,
            mlc_speed_std,
            mlc_acc,
            mlc_acc_std,
            gantry_acc,
            delta_dose_rate,
        })
    }

    /// 把三种超阈值占比函数在 `[0, k]` 上积分.
    fn integrate(&self, options: &MiOptions) -> ModulationIndices {
        const EPS: f64 = 1e-10;

        let mean_time = self.time.iter().sum::<f64>() / self.time.len() as f64;
        let alpha_acc = 1.0 / mean_time;

        let weights: Vec<f64> = izip!(&self.gantry_acc, &self.delta_dose_rate)
            .map(|(&g, &d)| {
                logistic_weight(g, options.alpha, options.beta)
                    * logistic_weight(d, options.alpha, options.beta)
            })
            .collect();

        cfg_if! {
            if #[cfg(feature = "rayon")] {
                // 三个积分相互独立.
                let ((speed, acceleration), total) = rayon::join(
                    || {
                        rayon::join(
                            || quad::integrate(|f| self.z_speed(f), 0.0, options.k, EPS),
                            || quad::integrate(|f| self.z_acceleration(f, alpha_acc), 0.0, options.k, EPS),
                        )
                    },
                    || quad::integrate(|f| self.z_total(f, alpha_acc, &weights), 0.0, options.k, EPS),
                );
            } else {
                let speed = quad::integrate(|f| self.z_speed(f), 0.0, options.k, EPS);
                let acceleration =
                    quad::integrate(|f| self.z_acceleration(f, alpha_acc), 0.0, options.k, EPS);
                let total =
                    quad::integrate(|f| self.z_total(f, alpha_acc, &weights), 0.0, options.k, EPS);
            }
        }

        ModulationIndices {
            speed,
            acceleration,
            total,
        }
    }

    #[inline]
    fn speed_exceeds(&self, i: usize, j: usize, f: f64) -> bool {
        self.mlc_speed[[i, j]] > f * self.mlc_speed_std[j]
    }

    /// 速度或加速度任一超阈值. 速度行 `i = 0` 没有对应的加速度.
    #[inline]
    fn motion_exceeds(&self, i: usize, j: usize, f: f64, alpha_acc: f64) -> bool {
        self.speed_exceeds(i, j, f)
            || (i >= 1 && self.mlc_acc[[i - 1, j]] > alpha_acc * f * self.mlc_acc_std[j])
    }

    /// 速度样本中超过 `f` 倍逐叶片标准差的个数, 按区间数归一.
    fn z_speed(&self, f: f64) -> f64 {
        let mut count = 0usize;
        for i in 0..self.mlc_speed.nrows() {
            for j in 0..self.mlc_speed.ncols() {
                if self.speed_exceeds(i, j, f) {
                    count += 1;
                }
            }
        }
        count as f64 / (self.ncp as f64 - 1.0)
    }

    fn z_acceleration(&self, f: f64, alpha_acc: f64) -> f64 {
        let mut count = 0usize;
        for i in 0..self.mlc_speed.nrows() {
            for j in 0..self.mlc_speed.ncols() {
                if self.motion_exceeds(i, j, f, alpha_acc) {
                    count += 1;
                }
            }
        }
        count as f64 / (self.ncp as f64 - 2.0)
    }

    /// 综合口径: 只统计加速度有定义的行, 每行计数乘以该行的
    /// logistic 权重, 权重非有限的行整体丢弃.
    fn z_total(&self, f: f64, alpha_acc: f64, weights: &[f64]) -> f64 {
        let mut weighted = 0.0;
        for (r, &w) in weights.iter().enumerate() {
            if !w.is_finite() {
                continue;
            }
            let mut count = 0usize;
            for j in 0..self.mlc_speed.ncols() {
                if self.motion_exceeds(r + 1, j, f, alpha_acc) {
                    count += 1;
                }
            }
            weighted += w * count as f64;
        }
        weighted / (self.ncp as f64 - 2.0)
    }
}

/// 相邻控制点间的出束时间 (秒).
fn control_point_time(delta_mu: f64) -> f64 {
    if delta_mu.is_nan() {
        f64::NAN
    } else if delta_mu <= mi_consts::DOSE_RATE_LIMIT_MU {
        mi_consts::DEAD_TIME_S
    } else {
        delta_mu / mi_consts::MU_PER_SECOND
    }
}

/// 机架角的圆周差 (度), 取劣弧, 落在 `[0, 180]`.
fn circular_diff(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % 360.0;
    if d > 180.0 {
        360.0 - d
    } else {
        d
    }
}

/// 一列样本的总体标准差, 非有限样本跳过, 无有效样本时记 0.
fn column_std(column: ArrayView1<'_, f64>) -> f64 {
    let finite: Vec<f64> = column.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return 0.0;
    }
    let n = finite.len() as f64;
    let mean = finite.iter().sum::<f64>() / n;
    let variance = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// logistic 权重 `beta / (1 + (beta - 1) * exp(-x / alpha))`.
/// `x = 0` 时恰为 1, `x` 增大时趋于 `beta`.
fn logistic_weight(x: f64, alpha: f64, beta: f64) -> f64 {
    beta / (1.0 + (beta - 1.0) * (-x / alpha).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{ControlPoint, LimitingDevice};
    use ndarray::arr2;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// 2 对叶片, 两 bank 整体平移 `shift` 毫米的孔径.
    fn shifted_aperture(shift: f64) -> Aperture {
        let positions = arr2(&[
            [-20.0 + shift, -20.0 + shift],
            [10.0 + shift, 10.0 + shift],
        ]);
        Aperture::new(
            positions.view(),
            &[10.0, 10.0],
            [-200.0, 200.0, 200.0, -200.0],
            0.0,
        )
    }

    /// 匀速序列的闭式解.
    ///
    /// 4 个控制点, 累积 MU [0, 10, 20, 30], 每段 delta_mu = 10 > 4.238,
    /// 每段 1 秒. 所有叶片每控制点移动 5 毫米, 速度全为 5, 逐列标准差
    /// 为 0, 于是任意 f 下全部 12 个速度样本超阈值:
    ///   z_speed = 12 / 3 = 4, z_acc = 12 / 2 = 6,
    ///   z_total = (1 * 4 + 1 * 4) / 2 = 4 (静止机架与恒定剂量率的
    ///   logistic 权重恰为 1).
    /// 积分上限 k 下三个指数分别为 4k, 6k, 4k.
    #[test]
    fn test_uniform_motion_closed_form() {
        let apertures: Vec<Aperture> = (0..4).map(|i| shifted_aperture(5.0 * i as f64)).collect();
        let cumulative = [0.0, 10.0, 20.0, 30.0];

        let series = Series::build(&apertures, &cumulative).unwrap();
        assert!(f64_eq(series.time[0], 1.0));
        assert!(f64_eq(series.mlc_speed[[0, 0]], 5.0));
        assert!(f64_eq(series.mlc_speed_std[0], 0.0));

        let k = 0.02;
        let indices = series.integrate(&MiOptions {
            k,
            ..MiOptions::default()
        });
        assert!(f64_eq(indices.speed, 4.0 * k));
        assert!(f64_eq(indices.acceleration, 6.0 * k));
        assert!(f64_eq(indices.total, 4.0 * k));
    }

    /// 静止的叶片没有任何超阈值样本, 三个指数均为 0.
    #[test]
    fn test_static_series_is_zero() {
        let apertures: Vec<Aperture> = (0..4).map(|_| shifted_aperture(0.0)).collect();
        let cumulative = [0.0, 10.0, 20.0, 30.0];

        let indices = Series::build(&apertures, &cumulative)
            .unwrap()
            .integrate(&MiOptions::default());
        assert!(f64_eq(indices.speed, 0.0));
        assert!(f64_eq(indices.acceleration, 0.0));
        assert!(f64_eq(indices.total, 0.0));
    }

    /// 指数关于积分上限 k 单调不减 (z 非负).
    #[test]
    fn test_monotonic_in_k() {
        let apertures: Vec<Aperture> = (0..4).map(|i| shifted_aperture(5.0 * i as f64)).collect();
        let cumulative = [0.0, 10.0, 20.0, 30.0];
        let series = Series::build(&apertures, &cumulative).unwrap();

        let at = |k: f64| {
            series
                .integrate(&MiOptions {
                    k,
                    ..MiOptions::default()
                })
                .total
        };
        assert!(at(0.01) < at(0.02));
        assert!(at(0.02) < at(0.04));
    }

    /// 加速度与较晚一段的出束时间对齐.
    ///
    /// 累积 MU [0, 10, 60, 70] 给出时间 [1, 5, 1] 秒; 叶片先移动
    /// 5 毫米, 停一段, 再移动 5 毫米, 速度序列为 [5, 0, 5]:
    ///   acc[0] = |0 - 5| / time[1] = 1, acc[1] = |5 - 0| / time[2] = 5.
    #[test]
    fn test_acceleration_aligned_to_later_segment() {
        let apertures: Vec<Aperture> =
            [0.0, 5.0, 5.0, 10.0].map(shifted_aperture).to_vec();
        let series = Series::build(&apertures, &[0.0, 10.0, 60.0, 70.0]).unwrap();

        assert!(f64_eq(series.time[1], 5.0));
        assert!(f64_eq(series.mlc_acc[[0, 0]], 1.0));
        assert!(f64_eq(series.mlc_acc[[1, 0]], 5.0));
    }

    /// 累积 MU 在射野分界处回绕时, 差分取绝对值再折算时间.
    #[test]
    fn test_wrapped_cumulative_mu_uses_abs_delta() {
        let apertures: Vec<Aperture> = (0..4).map(|_| shifted_aperture(0.0)).collect();
        let series = Series::build(&apertures, &[0.0, 20.0, 0.0, 20.0]).unwrap();
        // 分界处 |0 - 20| = 20 MU, 统一按 2 秒出束.
        assert!(f64_eq(series.time[0], 2.0));
        assert!(f64_eq(series.time[1], 2.0));
        assert!(f64_eq(series.time[2], 2.0));
    }

    #[test]
    fn test_too_few_control_points() {
        let apertures: Vec<Aperture> = (0..2).map(|_| shifted_aperture(0.0)).collect();
        assert_eq!(
            Series::build(&apertures, &[0.0, 10.0]).unwrap_err(),
            MetricError::TooFewControlPoints(2, 3)
        );
    }

    /// 小 MU 段的时间由换位死区主导.
    #[test]
    fn test_dead_time_dominates_small_segments() {
        assert!(f64_eq(control_point_time(1.0), mi_consts::DEAD_TIME_S));
        assert!(f64_eq(control_point_time(42.0), 4.2));
    }

    #[test]
    fn test_circular_diff_takes_minor_arc() {
        assert!(f64_eq(circular_diff(350.0, 10.0), 20.0));
        assert!(f64_eq(circular_diff(10.0, 350.0), 20.0));
        assert!(f64_eq(circular_diff(90.0, 270.0), 180.0));
    }

    #[test]
    fn test_logistic_weight_shape() {
        assert!(f64_eq(logistic_weight(0.0, 2.0, 2.0), 1.0));
        assert!(logistic_weight(1.0, 2.0, 2.0) > 1.0);
        assert!(logistic_weight(100.0, 2.0, 2.0) < 2.0 + 1e-12);
    }

    /// 射野级入口: 匀速射野与闭式解一致.
    #[test]
    fn test_for_beam_matches_series() {
        let mut beam = Beam::treatment(30.0);
        beam.limiting_devices = vec![LimitingDevice::mlcx(vec![-10.0, 0.0, 10.0])];
        beam.control_points = (0..4)
            .map(|i| {
                let shift = 5.0 * i as f64;
                ControlPoint::new(i as f64 / 3.0).with_mlc(vec![
                    -20.0 + shift,
                    -20.0 + shift,
                    10.0 + shift,
                    10.0 + shift,
                ])
            })
            .collect();

        let options = MiOptions::default();
        let indices = for_beam(&beam, &options).unwrap();
        assert!(f64_eq(indices.speed, 4.0 * options.k));
        assert!(f64_eq(indices.acceleration, 6.0 * options.k));
        assert!(f64_eq(indices.total, 4.0 * options.k));
    }

    /// 计划级入口: 累积 MU 跨射野顺延, 两个静止射野拼成一条静止序列.
    #[test]
    fn test_for_plan_concatenates_beams() {
        let static_beam = || {
            let mut beam = Beam::treatment(20.0);
            beam.limiting_devices = vec![LimitingDevice::mlcx(vec![-10.0, 0.0, 10.0])];
            beam.control_points = vec![
                ControlPoint::new(0.0).with_mlc(vec![-20.0, -20.0, 10.0, 10.0]),
                ControlPoint::new(1.0).with_mlc(vec![-20.0, -20.0, 10.0, 10.0]),
            ];
            beam
        };
        let mut plan = Plan::new();
        plan.beams.insert(1, static_beam());
        plan.beams.insert(2, static_beam());

        // 各射野的累积 MU 原样衔接, 不平移.
        let (apertures, cumulative) = concatenated_series(&plan).unwrap();
        assert_eq!(apertures.len(), 4);
        assert_eq!(cumulative, vec![0.0, 20.0, 0.0, 20.0]);

        let indices = for_plan(&plan, &MiOptions::default()).unwrap();
        assert!(f64_eq(indices.speed, 0.0));
        assert!(f64_eq(indices.acceleration, 0.0));
        assert!(f64_eq(indices.total, 0.0));

        assert_eq!(
            for_plan(&Plan::new(), &MiOptions::default()).unwrap_err(),
            MetricError::NoTreatmentBeams
        );
    }
}
