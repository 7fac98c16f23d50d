use serde::Serialize;

/// Deviations under this percentage count as on target.
pub const ON_TARGET_TOLERANCE_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendState {
    OnTarget,
    Over,
    Under,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Flat,
}

impl TrendState {
    pub fn direction(self) -> Direction {
        match self {
            TrendState::OnTarget => Direction::Flat,
            TrendState::Over => Direction::Up,
            TrendState::Under => Direction::Down,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Trend {
    pub target: f64,
    pub actual: f64,
    pub deviation_pct: f64,
    pub state: TrendState,
    pub direction: Direction,
}

/// Signed deviation of `actual` from `target` in percent.
/// `None` when the target is zero or the result is not finite.
pub fn deviation_pct(target: f64, actual: f64) -> Option<f64> {
    if target == 0.0 {
        return None;
    }
    let pct = (actual - target) / target * 100.0;
    pct.is_finite().then_some(pct)
}

pub fn classify(deviation_pct: f64) -> TrendState {
    if deviation_pct.abs() < ON_TARGET_TOLERANCE_PCT {
        TrendState::OnTarget
    } else if deviation_pct > 0.0 {
        TrendState::Over
    } else {
        TrendState::Under
    }
}

pub fn annotate(target: f64, actual: f64) -> Option<Trend> {
    let deviation_pct = deviation_pct(target, actual)?;
    let state = classify(deviation_pct);
    Some(Trend {
        target,
        actual,
        deviation_pct,
        state,
        direction: state.direction(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn within_tolerance_is_on_target() {
        let t = annotate(2000.0, 2080.0).unwrap();
        assert_eq!(t.state, TrendState::OnTarget);
        assert_eq!(t.direction, Direction::Flat);
        assert!((t.deviation_pct - 4.0).abs() < 1e-9);
    }

    #[test]
    fn identical_values_are_on_target() {
        let t = annotate(1800.0, 1800.0).unwrap();
        assert_eq!(t.deviation_pct, 0.0);
        assert_eq!(t.state, TrendState::OnTarget);
    }

    #[test]
    fn above_and_below_tolerance() {
        let over = annotate(2000.0, 2200.0).unwrap();
        assert_eq!(over.state, TrendState::Over);
        assert_eq!(over.direction, Direction::Up);

        let under = annotate(2000.0, 1800.0).unwrap();
        assert_eq!(under.state, TrendState::Under);
        assert_eq!(under.direction, Direction::Down);
    }

    #[test]
    fn exactly_five_percent_is_not_on_target() {
        assert_eq!(classify(5.0), TrendState::Over);
        assert_eq!(classify(-5.0), TrendState::Under);
    }

    #[test]
    fn zero_target_has_no_trend() {
        assert_eq!(deviation_pct(0.0, 1500.0), None);
        assert!(annotate(0.0, 0.0).is_none());
    }
}
