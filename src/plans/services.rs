use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use super::compare::{compare_targets, CompareSelection, SelectionOutcome};
use super::dto::{
    ComparedPlan, Comparison, CreatePlanRequest, HistoryEntry, MealOverview, PlanDetail,
    SelectRequest, SelectResponse,
};
use super::repo::PlanStore;
use super::repo_types::{
    Activation, MealPlan, MealSummaryRow, NewItem, NewMeal, NewPlan, PlanStatus,
};
use super::totals::{build_plan_detail, item_totals};
use super::trend;
use crate::error::ApiError;

/// Every version of the client's plan, newest first, each with its trend.
pub async fn history(
    store: &dyn PlanStore,
    tenant_id: Uuid,
    client_id: Uuid,
) -> Result<Vec<HistoryEntry>, ApiError> {
    let mut rows = store.history(tenant_id, client_id).await?;
    rows.sort_by(|a, b| b.plan.version.cmp(&a.plan.version));

    let entries = rows
        .into_iter()
        .map(|row| {
            // No consumption data is recorded yet, so the target is measured
            // against itself. Replace `actual` once adherence is tracked.
            let trend = trend::annotate(row.plan.calorie_target, row.plan.calorie_target);
            HistoryEntry {
                is_draft: row.plan.status == PlanStatus::Draft,
                meal_count: row.meal_count,
                item_count: row.item_count,
                composed_kcal: row.composed_kcal,
                trend,
                plan: row.plan,
            }
        })
        .collect();
    Ok(entries)
}

fn overview(plan: MealPlan, meals: &[MealSummaryRow]) -> ComparedPlan {
    let mut own: Vec<&MealSummaryRow> = meals.iter().filter(|m| m.meal.plan_id == plan.id).collect();
    own.sort_by_key(|m| (m.meal.order_index.unwrap_or(0), m.meal.id));
    ComparedPlan {
        meals: own
            .into_iter()
            .map(|m| MealOverview {
                id: m.meal.id,
                name: m.meal.name.clone(),
                time: m.meal.time.clone(),
                item_count: m.item_count,
            })
            .collect(),
        plan,
    }
}

/// Side-by-side comparison going from `plan_a` to `plan_b`.
pub async fn compare(
    store: &dyn PlanStore,
    tenant_id: Uuid,
    plan_a: Uuid,
    plan_b: Uuid,
) -> Result<Comparison, ApiError> {
    if plan_a == plan_b {
        return Err(ApiError::SelfComparison);
    }

    let ids = [plan_a, plan_b];
    let mut plans = store.plans_by_ids(tenant_id, &ids).await?;
    let mut take = |id: Uuid| {
        plans
            .iter()
            .position(|p| p.id == id)
            .map(|idx| plans.swap_remove(idx))
            .ok_or(ApiError::PlanNotFound)
    };
    let a = take(plan_a)?;
    let b = take(plan_b)?;

    let meals = store.meal_summaries(&ids).await?;
    let macros = compare_targets(&a, &b);
    debug!(%plan_a, %plan_b, calorie_diff = macros.calories.diff, "plans compared");

    Ok(Comparison {
        plan_a: overview(a, &meals),
        plan_b: overview(b, &meals),
        macros,
    })
}

/// Applies one select-for-compare click to the caller's pending slot.
pub async fn select(
    store: &dyn PlanStore,
    tenant_id: Uuid,
    req: SelectRequest,
) -> Result<SelectResponse, ApiError> {
    let mut selection = CompareSelection {
        pending: req.pending,
    };
    let comparison = match selection.toggle(req.plan_id) {
        SelectionOutcome::Pending(_) | SelectionOutcome::Cleared => None,
        SelectionOutcome::Compare(a, b) => Some(compare(store, tenant_id, a, b).await?),
    };
    Ok(SelectResponse {
        pending: selection.pending,
        comparison,
    })
}

pub async fn detail(
    store: &dyn PlanStore,
    tenant_id: Uuid,
    plan_id: Uuid,
) -> Result<PlanDetail, ApiError> {
    let plan = store
        .plans_by_ids(tenant_id, &[plan_id])
        .await?
        .into_iter()
        .next()
        .ok_or(ApiError::PlanNotFound)?;
    let (meals, items) = store.plan_contents(plan.id).await?;
    Ok(build_plan_detail(plan, meals, items))
}

fn validate(req: &CreatePlanRequest) -> Result<(), ApiError> {
    let targets = [
        ("calorie_target", req.calorie_target),
        ("protein_target_g", req.protein_target_g),
        ("carb_target_g", req.carb_target_g),
        ("fat_target_g", req.fat_target_g),
    ];
    for (name, value) in targets {
        if !value.is_finite() || value < 0.0 {
            return Err(ApiError::Validation(format!("{name} must be a non-negative number")));
        }
    }
    for meal in &req.meals {
        if meal.name.trim().is_empty() {
            return Err(ApiError::Validation("meal name is required".into()));
        }
        if meal.items.iter().any(|i| !i.quantity.is_finite() || i.quantity <= 0.0) {
            return Err(ApiError::Validation(format!(
                "item quantities in '{}' must be positive",
                meal.name
            )));
        }
    }
    Ok(())
}

/// Stores the editor's plan as the client's next version, computing
/// item nutrient totals from the food reference tables.
pub async fn save_version(
    store: &dyn PlanStore,
    tenant_id: Uuid,
    client_id: Uuid,
    req: CreatePlanRequest,
) -> Result<MealPlan, ApiError> {
    validate(&req)?;

    let items = req.meals.iter().flat_map(|m| m.items.iter());
    let mut food_ids: Vec<Uuid> = items.clone().map(|i| i.food_id).collect();
    let mut measure_ids: Vec<Uuid> = items.map(|i| i.measure_id).collect();
    food_ids.sort_unstable();
    food_ids.dedup();
    measure_ids.sort_unstable();
    measure_ids.dedup();

    let foods: HashMap<Uuid, _> = store
        .foods(&food_ids)
        .await?
        .into_iter()
        .map(|f| (f.id, f))
        .collect();
    let measures: HashMap<Uuid, _> = store
        .measures(&measure_ids)
        .await?
        .into_iter()
        .map(|m| (m.id, m))
        .collect();

    let mut meals = Vec::with_capacity(req.meals.len());
    for (idx, meal) in req.meals.into_iter().enumerate() {
        let mut items = Vec::with_capacity(meal.items.len());
        for item in meal.items {
            let food = foods
                .get(&item.food_id)
                .ok_or_else(|| ApiError::Validation(format!("unknown food {}", item.food_id)))?;
            let measure = measures.get(&item.measure_id).ok_or_else(|| {
                ApiError::Validation(format!("unknown measure {}", item.measure_id))
            })?;
            if measure.food_id != food.id {
                return Err(ApiError::Validation(format!(
                    "measure '{}' does not belong to food {}",
                    measure.label, food.id
                )));
            }
            let (grams_total, totals) = item_totals(item.quantity, measure, food);
            items.push(NewItem {
                food_id: item.food_id,
                measure_id: item.measure_id,
                quantity: item.quantity,
                grams_total,
                totals,
            });
        }
        meals.push(NewMeal {
            name: meal.name.trim().to_string(),
            time: meal.time,
            order_index: meal.order_index.unwrap_or(idx as i32),
            items,
        });
    }

    store
        .insert_plan(NewPlan {
            tenant_id,
            client_id,
            calorie_target: req.calorie_target,
            protein_target_g: req.protein_target_g,
            carb_target_g: req.carb_target_g,
            fat_target_g: req.fat_target_g,
            notes: req.notes,
            activate: req.activate,
            meals,
        })
        .await
}

pub async fn restore(
    store: &dyn PlanStore,
    tenant_id: Uuid,
    plan_id: Uuid,
    expected_active: Option<Uuid>,
) -> Result<Activation, ApiError> {
    store.activate(tenant_id, plan_id, expected_active).await
}

pub async fn archive(
    store: &dyn PlanStore,
    tenant_id: Uuid,
    plan_id: Uuid,
) -> Result<MealPlan, ApiError> {
    store.archive(tenant_id, plan_id).await
}
