//! 通用常量与协议标记.

/// DICOM RT 中治疗射野的 `TreatmentDeliveryType` 取值.
/// 其它取值 (如 SETUP) 不参与计划级聚合.
pub const TREATMENT: &str = "TREATMENT";

/// 以 monitor unit 计量的主剂量计单位标记.
pub const MU_UNIT: &str = "MU";

/// 射野未显式给出 jaw 时, 认为 jaw 在每个方向上全开 ±200 毫米.
pub const OPEN_JAW_MM: f64 = 200.0;

/// Halcyon 系 MLC 的叶片对数. 该机型不单独下发 jaw 位置,
/// 需要从两 bank 叶片位置的分歧反推 jaw.
pub const HALCYON_LEAF_PAIRS: usize = 28;

/// 调制指数 (modulation index) 的标定常量.
pub mod mi {
    /// 控制点之间加速器的固定死区时间 (单位: 秒). 标定值.
    pub const DEAD_TIME_S: f64 = 2.0341 / 4.8;

    /// MU 增量超过该值时, 控制点间隔由剂量率上限决定 (单位: MU).
    pub const DOSE_RATE_LIMIT_MU: f64 = 4.238;

    /// 剂量率受限段的投照速率 (单位: MU/s).
    pub const MU_PER_SECOND: f64 = 10.0;

    /// 阈值分数积分上限缺省值.
    pub const DEFAULT_K: f64 = 0.02;

    /// logistic 加权因子缺省 beta.
    pub const DEFAULT_BETA: f64 = 2.0;

    /// logistic 加权因子缺省 alpha.
    pub const DEFAULT_ALPHA: f64 = 2.0;
}

/// 射野是否为治疗射野?
#[inline]
pub fn is_treatment(delivery_type: &str) -> bool {
    delivery_type == TREATMENT
}

/// 主剂量计单位是否以 MU 计?
#[inline]
pub fn is_mu_unit(unit: &str) -> bool {
    unit == MU_UNIT
}
