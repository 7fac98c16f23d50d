use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::compare::MacroComparison;
use super::repo_types::{MealItemRow, MealPlan};
use super::totals::NutrientTotals;
use super::trend::Trend;

// ---- history ----

#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub plan: MealPlan,
    pub is_draft: bool,
    pub meal_count: i64,
    pub item_count: i64,
    pub composed_kcal: f64,
    pub trend: Option<Trend>,
}

// ---- detail ----

#[derive(Debug, Serialize)]
pub struct MealDetail {
    pub id: Uuid,
    pub name: String,
    pub time: Option<String>,
    pub order_index: i32,
    pub items: Vec<MealItemRow>,
    pub totals: NutrientTotals,
    pub placeholder: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct PlanDetail {
    pub plan: MealPlan,
    pub meals: Vec<MealDetail>,
    pub totals: NutrientTotals,
}

// ---- comparison ----

#[derive(Debug, Deserialize)]
pub struct CompareQuery {
    pub plan_a: Uuid,
    pub plan_b: Uuid,
}

#[derive(Debug, Serialize)]
pub struct MealOverview {
    pub id: Uuid,
    pub name: String,
    pub time: Option<String>,
    pub item_count: i64,
}

#[derive(Debug, Serialize)]
pub struct ComparedPlan {
    pub plan: MealPlan,
    pub meals: Vec<MealOverview>,
}

#[derive(Debug, Serialize)]
pub struct Comparison {
    pub plan_a: ComparedPlan,
    pub plan_b: ComparedPlan,
    pub macros: MacroComparison,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    #[serde(default)]
    pub pending: Option<Uuid>,
    pub plan_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SelectResponse {
    pub pending: Option<Uuid>,
    pub comparison: Option<Comparison>,
}

// ---- writes ----

#[derive(Debug, Default, Deserialize)]
pub struct RestoreRequest {
    /// Plan the caller believes is active; `None` skips the check.
    #[serde(default)]
    pub expected_active_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub activated: MealPlan,
    pub deactivated: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub food_id: Uuid,
    pub measure_id: Uuid,
    pub quantity: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreateMealRequest {
    pub name: String,
    pub time: Option<String>,
    pub order_index: Option<i32>,
    #[serde(default)]
    pub items: Vec<CreateItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreatePlanRequest {
    pub calorie_target: f64,
    pub protein_target_g: f64,
    pub carb_target_g: f64,
    pub fat_target_g: f64,
    pub notes: Option<String>,
    #[serde(default)]
    pub activate: bool,
    #[serde(default)]
    pub meals: Vec<CreateMealRequest>,
}
