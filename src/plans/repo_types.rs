use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::totals::NutrientTotals;

/// Lifecycle of a plan version: draft -> active -> archived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "plan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Draft,
    Active,
    Archived,
}

/// One version of a client's meal plan.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MealPlan {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub version: i32,
    pub is_active: bool,
    pub status: PlanStatus,
    pub calorie_target: f64,
    pub protein_target_g: f64,
    pub carb_target_g: f64,
    pub fat_target_g: f64,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub replaced_by: Option<Uuid>, // newer version that superseded this one
}

/// Plan row plus aggregates used by the history list.
#[derive(Debug, Clone, FromRow)]
pub struct PlanHistoryRow {
    #[sqlx(flatten)]
    pub plan: MealPlan,
    pub meal_count: i64,
    pub item_count: i64,
    pub composed_kcal: f64, // sum of stored item kcal_total
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MealRow {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub name: String,
    pub time: Option<String>,
    pub order_index: Option<i32>,
}

#[derive(Debug, Clone, FromRow)]
pub struct MealSummaryRow {
    #[sqlx(flatten)]
    pub meal: MealRow,
    pub item_count: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MealItemRow {
    pub id: Uuid,
    pub meal_id: Uuid,
    pub food_id: Uuid,
    pub food_name: Option<String>,
    pub measure_id: Uuid,
    pub quantity: f64,
    pub grams_total: f64,
    pub kcal_total: f64,
    pub protein_total: f64,
    pub carb_total: f64,
    pub fat_total: f64,
}

impl MealItemRow {
    pub fn totals(&self) -> NutrientTotals {
        NutrientTotals {
            kcal: self.kcal_total,
            protein: self.protein_total,
            carb: self.carb_total,
            fat: self.fat_total,
        }
    }
}

/// Reference nutrient densities per 100 g.
#[derive(Debug, Clone, FromRow)]
pub struct FoodRow {
    pub id: Uuid,
    pub kcal_100g: f64,
    pub protein_100g: f64,
    pub carb_100g: f64,
    pub fat_100g: f64,
}

/// Named portion ("1 slice", "1 cup") converted to grams.
#[derive(Debug, Clone, FromRow)]
pub struct FoodMeasureRow {
    pub id: Uuid,
    pub food_id: Uuid,
    pub label: String,
    pub grams: f64,
}

// ---- write models ----

#[derive(Debug, Clone)]
pub struct NewItem {
    pub food_id: Uuid,
    pub measure_id: Uuid,
    pub quantity: f64,
    pub grams_total: f64,
    pub totals: NutrientTotals,
}

#[derive(Debug, Clone)]
pub struct NewMeal {
    pub name: String,
    pub time: Option<String>,
    pub order_index: i32,
    pub items: Vec<NewItem>,
}

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub tenant_id: Uuid,
    pub client_id: Uuid,
    pub calorie_target: f64,
    pub protein_target_g: f64,
    pub carb_target_g: f64,
    pub fat_target_g: f64,
    pub notes: Option<String>,
    pub activate: bool,
    pub meals: Vec<NewMeal>,
}

/// Result of an activation swap.
#[derive(Debug, Clone)]
pub struct Activation {
    pub activated: MealPlan,
    pub deactivated: Option<Uuid>,
}
