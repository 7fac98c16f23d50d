use serde::Serialize;
use uuid::Uuid;

use super::repo_types::MealPlan;

/// Differences smaller than one unit (kcal or gram) are treated as equal.
pub const EQUAL_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Equal,
    Increase,
    Decrease,
}

impl Change {
    pub fn classify(diff: f64) -> Self {
        if diff.abs() < EQUAL_THRESHOLD {
            Change::Equal
        } else if diff > 0.0 {
            Change::Increase
        } else {
            Change::Decrease
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Change::Equal => "minus",
            Change::Increase => "arrow-up",
            Change::Decrease => "arrow-down",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Change::Equal => "gray",
            Change::Increase => "green",
            Change::Decrease => "red",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroDiff {
    pub from: f64,
    pub to: f64,
    pub diff: f64,
    /// `None` when the baseline is zero.
    pub percentage: Option<f64>,
    pub display_percentage: String,
    pub change: Change,
    pub icon: &'static str,
    pub color: &'static str,
}

impl MacroDiff {
    pub fn between(from: f64, to: f64) -> Self {
        let diff = to - from;
        let percentage = if from == 0.0 {
            None
        } else {
            Some(diff / from * 100.0).filter(|p| p.is_finite())
        };
        let change = Change::classify(diff);
        Self {
            from,
            to,
            diff,
            percentage,
            display_percentage: display_percentage(percentage),
            change,
            icon: change.icon(),
            color: change.color(),
        }
    }
}

pub fn display_percentage(percentage: Option<f64>) -> String {
    match percentage {
        Some(p) => format!("{:+.1}%", p),
        None => "N/A".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroComparison {
    pub calories: MacroDiff,
    pub protein: MacroDiff,
    pub carbs: MacroDiff,
    pub fat: MacroDiff,
}

/// Target differences going from `a` to `b`.
pub fn compare_targets(a: &MealPlan, b: &MealPlan) -> MacroComparison {
    MacroComparison {
        calories: MacroDiff::between(a.calorie_target, b.calorie_target),
        protein: MacroDiff::between(a.protein_target_g, b.protein_target_g),
        carbs: MacroDiff::between(a.carb_target_g, b.carb_target_g),
        fat: MacroDiff::between(a.fat_target_g, b.fat_target_g),
    }
}

/// Pending compare slot held by the caller between clicks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareSelection {
    pub pending: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// Waiting for a second plan.
    Pending(Uuid),
    /// Same plan picked twice; nothing selected any more.
    Cleared,
    /// Two distinct plans picked; slot is empty again.
    Compare(Uuid, Uuid),
}

impl CompareSelection {
    pub fn toggle(&mut self, plan_id: Uuid) -> SelectionOutcome {
        match self.pending.take() {
            None => {
                self.pending = Some(plan_id);
                SelectionOutcome::Pending(plan_id)
            }
            Some(first) if first == plan_id => SelectionOutcome::Cleared,
            Some(first) => SelectionOutcome::Compare(first, plan_id),
        }
    }
}
