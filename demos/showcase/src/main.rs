//! 端到端演示: 构造一个两射野的合成计划, 打印全部复杂度度量.
//!
//! 射野 1 是 field-in-field 静态调强, 射野 2 是叶片匀速滑窗.

use rt_berry::prelude::*;

/// 10 对均匀 10 毫米叶片的边界 (-50 到 50 毫米).
fn boundaries() -> Vec<f64> {
    (0..=10).map(|i| -50.0 + 10.0 * i as f64).collect()
}

/// field-in-field 射野: 先 10x10 厘米开野, 再把中央 5 对叶片收到
/// ±25 毫米形成 5x5 厘米内野.
fn field_in_field_beam() -> Beam {
    let mut open = vec![-50.0; 10];
    open.extend(vec![50.0; 10]);

    let mut inner = vec![0.0; 20];
    for i in 2..7 {
        inner[i] = -25.0;
        inner[10 + i] = 25.0;
    }

    let mut beam = Beam::treatment(120.0);
    beam.gantry_angle = Some(0.0);
    beam.limiting_devices = vec![LimitingDevice::mlcx(boundaries())];
    beam.control_points = vec![
        ControlPoint::new(0.0).with_mlc(open.clone()),
        ControlPoint::new(0.7).with_mlc(open),
        ControlPoint::new(0.7).with_mlc(inner.clone()),
        ControlPoint::new(1.0).with_mlc(inner),
    ];
    beam
}

/// 滑窗射野: 20 毫米宽的缝隙以每控制点 10 毫米匀速扫过射野.
fn sliding_window_beam() -> Beam {
    let mut beam = Beam::treatment(180.0);
    beam.gantry_angle = Some(180.0);
    beam.limiting_devices = vec![LimitingDevice::mlcx(boundaries())];
    beam.control_points = (0..8)
        .map(|i| {
            let left = -50.0 + 10.0 * i as f64;
            let mut positions = vec![left; 10];
            positions.extend(vec![left + 20.0; 10]);
            ControlPoint::new(i as f64 / 7.0).with_mlc(positions)
        })
        .collect();
    beam
}

fn main() -> MetricResult<()> {
    let mut plan = Plan::new();
    plan.beams.insert(1, field_in_field_beam());
    plan.beams.insert(2, sliding_window_beam());

    let metrics = [
        ApertureMetric::Edge,
        ApertureMetric::Area,
        ApertureMetric::MeanLeafArea,
        ApertureMetric::Irregularity,
        ApertureMetric::Mcs,
    ];

    println!("== 计划级度量 ==");
    for metric in metrics {
        println!("{:?}: {:.6}", metric, metric.for_plan(&plan)?);
    }

    for (number, beam) in &plan.beams {
        println!("\n== 射野 {number} ==");
        for metric in metrics {
            println!("{:?}: {:.6}", metric, metric.for_beam(beam)?);
        }

        let weights = control_point_weights(beam)?;
        let edge = ApertureMetric::Edge.per_control_point_unweighted(beam)?;
        println!("控制点 MU 权重: {weights:.3?}");
        println!("逐控制点边缘度量: {edge:.4?}");

        for ap in apertures_from_beam(beam)? {
            if ap.has_open_leaf_behind_jaws() {
                println!("警告: 存在打开但被 jaw 遮挡的叶片对");
            }
        }
    }

    println!("\n== 调制指数 ==");
    let options = MiOptions::default();
    let indices = mi::for_plan(&plan, &options)?;
    println!("速度指数:   {:.6}", indices.speed);
    println!("加速度指数: {:.6}", indices.acceleration);
    println!("综合指数:   {:.6}", indices.total);

    Ok(())
}
