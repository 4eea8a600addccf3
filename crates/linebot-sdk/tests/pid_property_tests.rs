//! SteeringController 性质测试

use linebot_sdk::control::SteeringController;
use linebot_sdk::tools::PidSettings;
use proptest::prelude::*;
use std::time::{Duration, Instant};

fn params() -> impl Strategy<Value = PidSettings> {
    (0.0..5.0f64, 0.0..1.0f64, 0.0..2.0f64, 0.0..20.0f64, 0.0..500.0f64).prop_map(
        |(kp, ki, kd, dead_zone, max_integral)| PidSettings {
            kp,
            ki,
            kd,
            dead_zone,
            max_integral,
        },
    )
}

/// (误差, 距上一次的间隔 ms)
fn samples() -> impl Strategy<Value = Vec<(f64, u64)>> {
    prop::collection::vec((-400.0..400.0f64, 0u64..200), 1..60)
}

fn feed(pid: &mut SteeringController, t0: Instant, samples: &[(f64, u64)]) -> Vec<f64> {
    let mut now = t0;
    samples
        .iter()
        .map(|&(error, gap_ms)| {
            now += Duration::from_millis(gap_ms);
            pid.compute_at(error, now)
        })
        .collect()
}

proptest! {
    #[test]
    fn output_always_within_limits(params in params(), samples in samples()) {
        let mut pid = SteeringController::new(params);
        for out in feed(&mut pid, Instant::now(), &samples) {
            prop_assert!((-100.0..=100.0).contains(&out), "out = {}", out);
        }
    }

    #[test]
    fn integral_never_exceeds_limit(params in params(), samples in samples()) {
        let limit = params.max_integral;
        let mut pid = SteeringController::new(params);
        let mut now = Instant::now();
        for &(error, gap_ms) in &samples {
            now += Duration::from_millis(gap_ms);
            pid.compute_at(error, now);
            prop_assert!(pid.integral().abs() <= limit + 1e-9);
        }
    }

    #[test]
    fn reset_matches_fresh_controller(
        params in params(),
        history in samples(),
        error in -400.0..400.0f64,
    ) {
        let t0 = Instant::now();
        let mut used = SteeringController::new(params.clone());
        feed(&mut used, t0, &history);
        used.reset();

        let mut fresh = SteeringController::new(params);
        let t1 = t0 + Duration::from_secs(60);
        prop_assert_eq!(used.compute_at(error, t1), fresh.compute_at(error, t1));
        prop_assert_eq!(used.integral(), fresh.integral());
    }
}
