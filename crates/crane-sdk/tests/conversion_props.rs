//! 角度/tick 换算性质测试

use crane_sdk::protocol::{DEG_PER_TICK, deg_to_tick, tick_to_deg};
use proptest::prelude::*;

proptest! {
    /// 整数角度往返误差不超过 1°
    #[test]
    fn prop_integer_degrees_round_trip_within_one(goal in -156i32..=156) {
        let back = tick_to_deg(deg_to_tick(f64::from(goal)));
        prop_assert!((back - goal).abs() <= 1, "{} -> {}", goal, back);
    }

    /// 任意实数角度：两次截断，误差小于 1° + 1 tick
    #[test]
    fn prop_real_degrees_round_trip(goal in -156.0f64..156.0) {
        let back = f64::from(tick_to_deg(deg_to_tick(goal)));
        prop_assert!((back - goal).abs() < 1.0 + DEG_PER_TICK, "{} -> {}", goal, back);
    }

    /// 换算单调不减
    #[test]
    fn prop_deg_to_tick_monotonic(a in -170.0f64..170.0, b in -170.0f64..170.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(deg_to_tick(lo) <= deg_to_tick(hi));
    }
}

#[test]
fn test_truncation_toward_zero() {
    // 190 / 0.087890625 = 2161.77 -> 2161
    assert_eq!(deg_to_tick(10.0), 2161);
    // 2161 * 0.087890625 - 180 = 9.93 -> 9
    assert_eq!(tick_to_deg(2161), 9);
    // 负角度同样向零截断
    assert_eq!(tick_to_deg(1934), -10);
    assert_eq!(tick_to_deg(2048), 0);
}
