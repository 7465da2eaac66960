//! 复杂度度量过程中的错误类型.

/// 孔径构建与度量计算的错误.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricError {
    /// 射野的限束设备列表中没有 MLC 类设备, 无法得到叶宽.
    MissingMlcDevice,

    /// 射野的主剂量计单位不是 MU, 无法换算 meterset 权重.
    /// 携带实际遇到的单位字符串.
    UnsupportedDosimeterUnit(String),

    /// 治疗射野缺少总 MU.
    MissingMeterset,

    /// 射野没有控制点.
    NoControlPoints,

    /// 计划中没有 (MU > 0 的) 治疗射野, 加权聚合无意义.
    NoTreatmentBeams,

    /// 控制点数不足以计算该度量. 依次携带实际数与最小要求数.
    TooFewControlPoints(usize, usize),
}
