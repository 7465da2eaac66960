//! 几何基元: `Rect`, `Jaw` 与叶片对.

use std::fmt::Formatter;

/// 矩形区域 (单位: 毫米, 以计划等中心为原点, IEC 61217 约定,
/// 负 Y 朝向机架侧).
///
/// 不保证 `left < right` 或 `bottom < top`; 交叉叶片等情形下
/// 符号语义由调用方解释.
#[derive(Copy, Clone, PartialEq)]
pub struct Rect {
    /// 左边缘.
    pub left: f64,
    /// 上边缘.
    pub top: f64,
    /// 右边缘.
    pub right: f64,
    /// 下边缘.
    pub bottom: f64,
}

impl Rect {
    /// 以四个边缘位置构造矩形.
    #[inline]
    pub const fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// 压缩到一行, 保留一位小数便于阅读.
impl std::fmt::Debug for Rect {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "Rect {{ left: {:.1} top: {:.1} right: {:.1} bottom: {:.1} }}",
            self.left, self.top, self.right, self.bottom
        ))
    }
}

/// 次级准直器 (jaw), 独立于 MLC 限制射野的矩形开口.
///
/// 位置可变: 控制点可以在射野中途移动 jaw.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Jaw {
    position: Rect,
}

impl Jaw {
    /// 以矩形位置构造 jaw.
    #[inline]
    pub const fn new(position: Rect) -> Self {
        Self { position }
    }

    /// 当前位置.
    #[inline]
    pub fn position(&self) -> Rect {
        self.position
    }

    /// 移动 jaw 到新位置.
    #[inline]
    pub fn set_position(&mut self, position: Rect) {
        self.position = position;
    }

    /// 左边缘.
    #[inline]
    pub fn left(&self) -> f64 {
        self.position.left
    }

    /// 上边缘.
    #[inline]
    pub fn top(&self) -> f64 {
        self.position.top
    }

    /// 右边缘.
    #[inline]
    pub fn right(&self) -> f64 {
        self.position.right
    }

    /// 下边缘.
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.position.bottom
    }
}

/// 一个 MLC 叶片对. `left`/`right` 分别是 bank A/B 的叶端位置.
///
/// 叶片对不持有 jaw 的副本: 同一控制点的所有叶片对共享所属
/// [`Aperture`](super::Aperture) 的唯一 `Jaw` 实例, 因此与 jaw
/// 相关的运算都以 `&Jaw` 参数传入.
#[derive(Copy, Clone)]
pub struct LeafPair {
    position: Rect,
    width: f64,
}

impl LeafPair {
    /// 以叶端位置、叶宽与顶端位置构造叶片对. `bottom = top - width`.
    pub fn new(left: f64, right: f64, width: f64, top: f64) -> Self {
        Self {
            position: Rect::new(left, top, right, top - width),
            width,
        }
    }

    /// 叶片对所占的矩形.
    #[inline]
    pub fn position(&self) -> Rect {
        self.position
    }

    /// bank A 叶端位置.
    #[inline]
    pub fn left(&self) -> f64 {
        self.position.left
    }

    /// 顶端位置.
    #[inline]
    pub fn top(&self) -> f64 {
        self.position.top
    }

    /// bank B 叶端位置.
    #[inline]
    pub fn right(&self) -> f64 {
        self.position.right
    }

    /// 底端位置.
    #[inline]
    pub fn bottom(&self) -> f64 {
        self.position.bottom
    }

    /// 叶片宽度.
    #[inline]
    pub fn width(&self) -> f64 {
        self.width
    }

    /// 叶片对是否完全处于 jaw 之外?
    ///
    /// 这里故意使用非严格比较: 若 jaw 边缘与叶片边缘重合, 相当于
    /// jaw 边缘就是叶片边缘, 按 "outside" 处理, 同一条边才不会被
    /// jaw 和叶片各计一次.
    pub fn is_outside_jaw(&self, jaw: &Jaw) -> bool {
        jaw.top() <= self.bottom()
            || jaw.bottom() >= self.top()
            || jaw.left() >= self.right()
            || jaw.right() <= self.left()
    }

    /// 被 jaw 裁剪后, 叶片对沿叶片运动方向的开口长度.
    ///
    /// 非 "outside" 情形下可能为负 (两 bank 叶片交叉时), 不做钳位,
    /// 下游求和依赖符号相消.
    pub fn field_size(&self, jaw: &Jaw) -> f64 {
        if self.is_outside_jaw(jaw) {
            return 0.0;
        }
        jaw.right().min(self.right()) - jaw.left().max(self.left())
    }

    /// 被 jaw 裁剪后, 叶片对垂直于运动方向的开口宽度.
    pub fn open_leaf_width(&self, jaw: &Jaw) -> f64 {
        if self.is_outside_jaw(jaw) {
            return 0.0;
        }
        jaw.top().min(self.top()) - jaw.bottom().max(self.bottom())
    }

    /// 叶片对贡献的开口面积.
    #[inline]
    pub fn field_area(&self, jaw: &Jaw) -> f64 {
        self.field_size(jaw) * self.open_leaf_width(jaw)
    }

    /// 叶片对是否打开?
    #[inline]
    pub fn is_open(&self, jaw: &Jaw) -> bool {
        self.field_size(jaw) > 0.0
    }

    /// 叶片对打开但被 jaw 在运动方向上遮挡.
    /// 这是一个计划质量警示信号, 不参与度量本身.
    pub fn is_open_but_behind_jaw(&self, jaw: &Jaw) -> bool {
        self.field_size(jaw) > 0.0
            && (jaw.left() > self.left() || jaw.right() < self.right())
    }
}

impl std::fmt::Debug for LeafPair {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "LeafPair {{ left: {:.1} top: {:.1} right: {:.1} bottom: {:.1} }}",
            self.left(),
            self.top(),
            self.right(),
            self.bottom()
        ))
    }
}
