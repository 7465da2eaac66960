//! 常用导出的一站式引入: `use rt_berry::prelude::*;`.

pub use crate::aperture::{apertures_from_beam, Aperture, Jaw, LeafPair, Rect};
pub use crate::consts;
pub use crate::meterset;
pub use crate::metric::{control_point_weights, ApertureMetric, MetricError, MetricResult};
pub use crate::mi::{self, MiOptions, ModulationIndices};
pub use crate::plan::{Beam, ControlPoint, DeviceKind, DevicePosition, LimitingDevice, Plan};
