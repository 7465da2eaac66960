//! 自适应 Simpson 求积.
//!
//! 被积函数是离散序列上的计数统计, 分段常值且不光滑, 固定步长的
//! 求积公式在这里收敛很慢. 自适应细分配合 Richardson 外推可以把
//! 细分集中到值发生跳变的位置.

use num::Float;

/// 递归细分的最大深度. 达到后接受当前估计, 不再细分.
const MAX_DEPTH: u32 = 20;

/// 求 `f` 在 `[a, b]` 上的定积分, `eps` 为目标绝对误差.
pub(crate) fn integrate<T, F>(f: F, a: T, b: T, eps: T) -> T
where
    T: Float,
    F: Fn(T) -> T,
{
    let two = T::from(2.0).unwrap();
    let m = (a + b) / two;
    let (fa, fm, fb) = (f(a), f(m), f(b));
    let whole = simpson(a, b, fa, fm, fb);
    adaptive(&f, a, b, fa, fm, fb, whole, eps, MAX_DEPTH)
}

/// 区间 `[a, b]` 上的三点 Simpson 估计.
fn simpson<T: Float>(a: T, b: T, fa: T, fm: T, fb: T) -> T {
    let six = T::from(6.0).unwrap();
    let four = T::from(4.0).unwrap();
    (b - a) / six * (fa + four * fm + fb)
}

#[allow(clippy::too_many_arguments)]
fn adaptive<T, F>(f: &F, a: T, b: T, fa: T, fm: T, fb: T, whole: T, eps: T, depth: u32) -> T
where
    T: Float,
    F: Fn(T) -> T,
{
    let two = T::from(2.0).unwrap();
    let fifteen = T::from(15.0).unwrap();

    let m = (a + b) / two;
    let lm = (a + m) / two;
    let rm = (m + b) / two;
    let (flm, frm) = (f(lm), f(rm));

    let left = simpson(a, m, fa, flm, fm);
    let right = simpson(m, b, fm, frm, fb);
    let delta = left + right - whole;

    // |delta| <= 15 eps 时两半之和的误差已低于 eps, Richardson
    // 外推项 delta / 15 再抵消主误差项.
    if depth == 0 || delta.abs() <= fifteen * eps {
        return left + right + delta / fifteen;
    }
    let half_eps = eps / two;
    adaptive(f, a, m, fa, flm, fm, left, half_eps, depth - 1)
        + adaptive(f, m, b, fm, frm, fb, right, half_eps, depth - 1)
}
