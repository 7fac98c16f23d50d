use std::collections::HashMap;
use std::iter::Sum;
use std::ops::Add;

use serde::Serialize;
use uuid::Uuid;

use super::dto::{MealDetail, PlanDetail};
use super::repo_types::{FoodMeasureRow, FoodRow, MealItemRow, MealPlan, MealRow};

pub const EMPTY_MEAL_MESSAGE: &str = "No foods added to this meal";

/// Energy and macro totals in kcal / grams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct NutrientTotals {
    pub kcal: f64,
    pub protein: f64,
    pub carb: f64,
    pub fat: f64,
}

impl Add for NutrientTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            kcal: self.kcal + rhs.kcal,
            protein: self.protein + rhs.protein,
            carb: self.carb + rhs.carb,
            fat: self.fat + rhs.fat,
        }
    }
}

impl Sum for NutrientTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Totals stored on an item at write time: quantity x measure grams x density / 100.
/// Returns `(grams_total, totals)`.
pub fn item_totals(quantity: f64, measure: &FoodMeasureRow, food: &FoodRow) -> (f64, NutrientTotals) {
    let grams = quantity * measure.grams;
    let factor = grams / 100.0;
    (
        grams,
        NutrientTotals {
            kcal: food.kcal_100g * factor,
            protein: food.protein_100g * factor,
            carb: food.carb_100g * factor,
            fat: food.fat_100g * factor,
        },
    )
}

/// Assemble the single-plan view. Plan totals are re-summed from the stored
/// item totals; meals come out ordered by `order_index` (missing = 0), then id.
pub fn build_plan_detail(plan: MealPlan, meals: Vec<MealRow>, items: Vec<MealItemRow>) -> PlanDetail {
    let mut by_meal: HashMap<Uuid, Vec<MealItemRow>> = HashMap::new();
    for item in items {
        by_meal.entry(item.meal_id).or_default().push(item);
    }

    let mut meals = meals;
    meals.sort_by_key(|m| (m.order_index.unwrap_or(0), m.id));

    let meals: Vec<MealDetail> = meals
        .into_iter()
        .map(|meal| {
            let items = by_meal.remove(&meal.id).unwrap_or_default();
            let totals = items.iter().map(MealItemRow::totals).sum();
            let placeholder = items.is_empty().then_some(EMPTY_MEAL_MESSAGE);
            MealDetail {
                id: meal.id,
                name: meal.name,
                time: meal.time,
                order_index: meal.order_index.unwrap_or(0),
                items,
                totals,
                placeholder,
            }
        })
        .collect();

    let totals = meals.iter().map(|m| m.totals).sum();

    PlanDetail {
        plan,
        meals,
        totals,
    }
}
