#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 针对 IMRT/VMAT 治疗计划计算 MLC 孔径复杂度度量.
//!
//! 输入是外部 plan loader 解析好的计划记录 (射野, 控制点, 叶片/jaw 位置,
//! meterset 权重), 输出是计划级/射野级/逐控制点的复杂度标量, 用于提示
//! 加速器可能难以精确投照的计划.
//!
//! # 注意
//!
//! 1. 本 crate 不解析 DICOM 容器格式. 计划记录的 schema 见 [`plan`] 模块,
//!   由外部协作者 (plan loader) 产出.
//! 2. 在调用方违反构造契约时, 程序会直接 panic, 而不会导致内存错误.
//!   As what Rust promises.
//!
//! # 开发计划
//!
//! ### 孔径几何模型 ✅
//!
//! `Rect` / `Jaw` / 叶片对 / 孔径, 开口面积与侧向周长的完整分类讨论.
//!
//! 实现位于 `rt-berry/src/aperture`.
//!
//! ### 孔径构建器 ✅
//!
//! 把一个射野的控制点序列转换成孔径序列, 逐控制点解析 jaw
//! (含 Halcyon 系 MLC 的 jaw 反推).
//!
//! 实现位于 `rt-berry/src/aperture/builder.rs`.
//!
//! ### Meterset 权重换算 ✅
//!
//! 累计 meterset 权重 → 逐控制点 MU 贡献, 梯形半增量规则.
//!
//! 实现位于 `rt-berry/src/meterset.rs`.
//!
//! ### 加权聚合框架与形状度量 ✅
//!
//! 控制点 → 射野 → 计划三级加权和, 以及边缘度量、面积、
//! 叶片对平均面积、不规则度四个具体度量.
//!
//! 参考论文: "Predicting deliverability of volumetric-modulated arc
//! therapy (VMAT) plans using aperture complexity analysis".
//!
//! 实现位于 `rt-berry/src/metric`.
//!
//! ### 调制复杂度评分 (MCS) ✅
//!
//! 叶序变异度 (LSV) × 孔径面积变异度 (AAV).
//!
//! 参考论文: McNiven AL, Sharpe MB, Purdie TG. "A new metric for
//! assessing IMRT modulation complexity and plan deliverability".
//!
//! 实现位于 `rt-berry/src/metric/mcs.rs`.
//!
//! ### 调制指数 ✅
//!
//! 叶速/叶加速度时间序列、机架角速度与剂量率加权、阈值超限积分.
//!
//! 参考论文: Park JM et al. "Modulation indices for volumetric
//! modulated arc therapy".
//!
//! 实现位于 `rt-berry/src/mi`.

pub mod consts;

pub mod plan;

pub mod aperture;

pub mod meterset;

pub mod metric;

pub mod mi;

pub mod prelude;

pub use aperture::{apertures_from_beam, Aperture, Jaw, LeafPair, Rect};

pub use metric::{ApertureMetric, MetricError, MetricResult};
