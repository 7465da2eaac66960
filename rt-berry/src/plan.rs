//! 治疗计划记录.
//!
//! 本模块定义外部 plan loader 产出并交给本 crate 的数据结构.
//! 核心只读取这里列出的字段, 对容器格式 (DICOM 等) 一无所知.
//! 字段命名沿用 DICOM RT Plan 的惯用名, 便于与 loader 对照.

use std::collections::BTreeMap;

use crate::consts;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// 束流限制设备的种类标记.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DeviceKind {
    /// 标准 MLC (X 方向叶片).
    Mlcx,

    /// 双层 MLC 的上层 (Halcyon 等机型).
    Mlcx1,

    /// 双层 MLC 的下层.
    Mlcx2,

    /// 对称 X jaw.
    X,

    /// 对称 Y jaw.
    Y,

    /// 非对称 X jaw.
    AsymX,

    /// 非对称 Y jaw.
    AsymY,

    /// 本 crate 不识别的其它设备.
    Other,
}

impl DeviceKind {
    /// 是否是 MLC 类设备?
    #[inline]
    pub fn is_mlc(&self) -> bool {
        matches!(self, Self::Mlcx | Self::Mlcx1 | Self::Mlcx2)
    }
}

/// 射野级束流限制设备描述 (`BeamLimitingDeviceSequence` 的一项).
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LimitingDevice {
    /// 设备种类.
    pub kind: DeviceKind,

    /// MLC 类设备的叶片边界位置 (N+1 个, 由下至上递增).
    /// 相邻两项之差即叶片宽度. 非 MLC 设备该字段为空.
    pub leaf_position_boundaries: Vec<f64>,
}

impl LimitingDevice {
    /// 构造一个标准 MLCX 设备描述.
    pub fn mlcx(leaf_position_boundaries: Vec<f64>) -> Self {
        Self {
            kind: DeviceKind::Mlcx,
            leaf_position_boundaries,
        }
    }
}

/// 控制点级设备位置 (`BeamLimitingDevicePositionSequence` 的一项).
///
/// MLC 类设备的 `positions` 为 2N 个值: 前一半是 bank A, 后一半是 bank B.
/// jaw 类设备的 `positions` 为 2 个值.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DevicePosition {
    /// 设备种类.
    pub kind: DeviceKind,

    /// 位置数组 (单位: 毫米, 投影到等中心平面).
    pub positions: Vec<f64>,
}

/// 一个控制点: 射野投照序列中的一个瞬时机器状态.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlPoint {
    /// 机架角 (度). 缺省时回退到射野级机架角.
    pub gantry_angle: Option<f64>,

    /// 累计 meterset 权重. 序列单调非降, 末值按 DICOM 约定为 1.
    pub cumulative_meterset_weight: f64,

    /// 本控制点显式给出的设备位置.
    pub device_positions: Vec<DevicePosition>,
}

impl ControlPoint {
    /// 以累计 meterset 权重构造控制点.
    pub fn new(cumulative_meterset_weight: f64) -> Self {
        Self {
            cumulative_meterset_weight,
            ..Self::default()
        }
    }

    /// 追加一组 MLCX 叶片位置 (前一半 bank A, 后一半 bank B).
    pub fn with_mlc(self, positions: Vec<f64>) -> Self {
        self.with_device(DeviceKind::Mlcx, positions)
    }

    /// 追加任意设备位置.
    pub fn with_device(mut self, kind: DeviceKind, positions: Vec<f64>) -> Self {
        self.device_positions.push(DevicePosition { kind, positions });
        self
    }

    /// 指定本控制点的机架角.
    pub fn with_gantry(mut self, angle: f64) -> Self {
        self.gantry_angle = Some(angle);
        self
    }

    /// 查找给定种类的设备位置.
    pub fn position_of(&self, kind: DeviceKind) -> Option<&[f64]> {
        self.device_positions
            .iter()
            .find(|p| p.kind == kind)
            .map(|p| p.positions.as_slice())
    }
}

/// 一个射野 (beam). 核心只读取下列字段.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Beam {
    /// 投照类型. 仅 [`consts::TREATMENT`] 参与计划级聚合.
    pub treatment_delivery_type: String,

    /// 射野总 monitor unit. 部分射野 (如 setup) 没有.
    pub mu: Option<f64>,

    /// 主剂量计单位. meterset 加权要求其为 [`consts::MU_UNIT`].
    pub primary_dosimeter_unit: String,

    /// 束流限制设备描述序列.
    pub limiting_devices: Vec<LimitingDevice>,

    /// 控制点序列 (投照顺序).
    pub control_points: Vec<ControlPoint>,

    /// 射野级机架角 (度). 静态野只在这里给出; 弧形野逐控制点给出.
    pub gantry_angle: Option<f64>,

    /// 射野级非对称 X jaw `[x1, x2]`.
    pub asym_x: Option<[f64; 2]>,

    /// 射野级非对称 Y jaw `[y1, y2]`.
    pub asym_y: Option<[f64; 2]>,
}

impl Beam {
    /// 便于组装的治疗射野构造器: TREATMENT 类型, MU 主单位, 其余字段为空.
    pub fn treatment(mu: f64) -> Self {
        Self {
            treatment_delivery_type: consts::TREATMENT.to_owned(),
            mu: Some(mu),
            primary_dosimeter_unit: consts::MU_UNIT.to_owned(),
            limiting_devices: vec![],
            control_points: vec![],
            gantry_angle: None,
            asym_x: None,
            asym_y: None,
        }
    }

    /// 是否为治疗射野?
    #[inline]
    pub fn is_treatment(&self) -> bool {
        consts::is_treatment(&self.treatment_delivery_type)
    }

    /// 总 MU 是否存在且为正?
    #[inline]
    pub fn has_positive_mu(&self) -> bool {
        self.mu.unwrap_or(0.0) > 0.0
    }
}

/// 一个治疗计划: 射野号 → 射野.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Plan {
    /// 按射野号索引的射野集合.
    pub beams: BTreeMap<u32, Beam>,
}

impl Plan {
    /// 空计划.
    pub fn new() -> Self {
        Self::default()
    }

    /// 参与计划级聚合的射野: TREATMENT 且 MU > 0.
    pub fn treatment_beams(&self) -> impl Iterator<Item = &Beam> {
        self.beams
            .values()
            .filter(|b| b.is_treatment() && b.has_positive_mu())
    }
}
