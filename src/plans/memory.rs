use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::PlanStore;
use super::repo_types::{
    Activation, FoodMeasureRow, FoodRow, MealItemRow, MealPlan, MealRow, MealSummaryRow, NewPlan,
    PlanHistoryRow, PlanStatus,
};
use crate::error::ApiError;

#[derive(Default)]
struct Tables {
    plans: Vec<MealPlan>,
    meals: Vec<MealRow>,
    items: Vec<MealItemRow>,
    foods: Vec<(FoodRow, String)>,
    measures: Vec<FoodMeasureRow>,
}

/// In-process store with the same semantics as the Postgres one.
#[derive(Default)]
pub struct MemoryPlanStore {
    tables: Mutex<Tables>,
}

impl MemoryPlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_food(&self, name: &str, kcal: f64, protein: f64, carb: f64, fat: f64) -> Uuid {
        let id = Uuid::new_v4();
        let food = FoodRow {
            id,
            kcal_100g: kcal,
            protein_100g: protein,
            carb_100g: carb,
            fat_100g: fat,
        };
        self.tables.lock().unwrap().foods.push((food, name.to_string()));
        id
    }

    pub fn add_measure(&self, food_id: Uuid, label: &str, grams: f64) -> Uuid {
        let id = Uuid::new_v4();
        self.tables.lock().unwrap().measures.push(FoodMeasureRow {
            id,
            food_id,
            label: label.to_string(),
            grams,
        });
        id
    }

    /// Number of active plans for a client.
    pub fn active_count(&self, tenant_id: Uuid, client_id: Uuid) -> usize {
        self.tables
            .lock()
            .unwrap()
            .plans
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.client_id == client_id && p.is_active)
            .count()
    }

    pub fn plan(&self, plan_id: Uuid) -> Option<MealPlan> {
        self.tables
            .lock()
            .unwrap()
            .plans
            .iter()
            .find(|p| p.id == plan_id)
            .cloned()
    }
}

fn activate_locked(
    t: &mut Tables,
    tenant_id: Uuid,
    plan_id: Uuid,
    expected_active: Option<Uuid>,
) -> Result<Activation, ApiError> {
    let client_id = t
        .plans
        .iter()
        .find(|p| p.tenant_id == tenant_id && p.id == plan_id)
        .map(|p| p.client_id)
        .ok_or(ApiError::PlanNotFound)?;

    let current = t
        .plans
        .iter()
        .find(|p| p.tenant_id == tenant_id && p.client_id == client_id && p.is_active)
        .map(|p| p.id);

    if current == Some(plan_id) {
        return Err(ApiError::AlreadyActive(plan_id));
    }
    if let Some(expected) = expected_active {
        if current != Some(expected) {
            return Err(ApiError::ActivationConflict {
                expected: Some(expected),
                actual: current,
            });
        }
    }

    let now = OffsetDateTime::now_utc();
    let mut activated = None;
    for p in t.plans.iter_mut() {
        if Some(p.id) == current {
            p.is_active = false;
            p.status = PlanStatus::Archived;
            p.replaced_by = Some(plan_id);
            p.updated_at = now;
        } else if p.id == plan_id {
            p.is_active = true;
            p.status = PlanStatus::Active;
            p.replaced_by = None;
            p.updated_at = now;
            activated = Some(p.clone());
        }
    }

    Ok(Activation {
        activated: activated.ok_or(ApiError::PlanNotFound)?,
        deactivated: current,
    })
}

#[async_trait]
impl PlanStore for MemoryPlanStore {
    async fn history(&self, tenant_id: Uuid, client_id: Uuid) -> anyhow::Result<Vec<PlanHistoryRow>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<PlanHistoryRow> = t
            .plans
            .iter()
            .filter(|p| p.tenant_id == tenant_id && p.client_id == client_id)
            .map(|p| {
                let meal_ids: HashSet<Uuid> = t
                    .meals
                    .iter()
                    .filter(|m| m.plan_id == p.id)
                    .map(|m| m.id)
                    .collect();
                let items: Vec<&MealItemRow> =
                    t.items.iter().filter(|i| meal_ids.contains(&i.meal_id)).collect();
                PlanHistoryRow {
                    plan: p.clone(),
                    meal_count: meal_ids.len() as i64,
                    item_count: items.len() as i64,
                    composed_kcal: items.iter().map(|i| i.kcal_total).sum(),
                }
            })
            .collect();
        rows.sort_by(|a, b| b.plan.version.cmp(&a.plan.version));
        Ok(rows)
    }

    async fn plans_by_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<MealPlan>> {
        let t = self.tables.lock().unwrap();
        Ok(t.plans
            .iter()
            .filter(|p| p.tenant_id == tenant_id && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn meal_summaries(&self, plan_ids: &[Uuid]) -> anyhow::Result<Vec<MealSummaryRow>> {
        let t = self.tables.lock().unwrap();
        let mut rows: Vec<MealSummaryRow> = t
            .meals
            .iter()
            .filter(|m| plan_ids.contains(&m.plan_id))
            .map(|m| MealSummaryRow {
                meal: m.clone(),
                item_count: t.items.iter().filter(|i| i.meal_id == m.id).count() as i64,
            })
            .collect();
        rows.sort_by_key(|r| (r.meal.plan_id, r.meal.order_index.unwrap_or(0), r.meal.id));
        Ok(rows)
    }

    async fn plan_contents(&self, plan_id: Uuid) -> anyhow::Result<(Vec<MealRow>, Vec<MealItemRow>)> {
        let t = self.tables.lock().unwrap();
        let mut meals: Vec<MealRow> = t.meals.iter().filter(|m| m.plan_id == plan_id).cloned().collect();
        meals.sort_by_key(|m| (m.order_index.unwrap_or(0), m.id));
        let items = t
            .items
            .iter()
            .filter(|i| meals.iter().any(|m| m.id == i.meal_id))
            .cloned()
            .collect();
        Ok((meals, items))
    }

    async fn foods(&self, ids: &[Uuid]) -> anyhow::Result<Vec<FoodRow>> {
        let t = self.tables.lock().unwrap();
        Ok(t.foods
            .iter()
            .filter(|(f, _)| ids.contains(&f.id))
            .map(|(f, _)| f.clone())
            .collect())
    }

    async fn measures(&self, ids: &[Uuid]) -> anyhow::Result<Vec<FoodMeasureRow>> {
        let t = self.tables.lock().unwrap();
        Ok(t.measures.iter().filter(|m| ids.contains(&m.id)).cloned().collect())
    }

    async fn insert_plan(&self, plan: NewPlan) -> Result<MealPlan, ApiError> {
        let mut t = self.tables.lock().unwrap();
        let version = t
            .plans
            .iter()
            .filter(|p| p.tenant_id == plan.tenant_id && p.client_id == plan.client_id)
            .map(|p| p.version)
            .max()
            .unwrap_or(0)
            + 1;

        let now = OffsetDateTime::now_utc();
        let created = MealPlan {
            id: Uuid::new_v4(),
            tenant_id: plan.tenant_id,
            client_id: plan.client_id,
            version,
            is_active: false,
            status: PlanStatus::Draft,
            calorie_target: plan.calorie_target,
            protein_target_g: plan.protein_target_g,
            carb_target_g: plan.carb_target_g,
            fat_target_g: plan.fat_target_g,
            notes: plan.notes.clone(),
            created_at: now,
            updated_at: now,
            replaced_by: None,
        };
        t.plans.push(created.clone());

        for meal in plan.meals {
            let meal_id = Uuid::new_v4();
            t.meals.push(MealRow {
                id: meal_id,
                plan_id: created.id,
                name: meal.name,
                time: meal.time,
                order_index: Some(meal.order_index),
            });
            for item in meal.items {
                let food_name = t
                    .foods
                    .iter()
                    .find(|(f, _)| f.id == item.food_id)
                    .map(|(_, name)| name.clone());
                t.items.push(MealItemRow {
                    id: Uuid::new_v4(),
                    meal_id,
                    food_id: item.food_id,
                    food_name,
                    measure_id: item.measure_id,
                    quantity: item.quantity,
                    grams_total: item.grams_total,
                    kcal_total: item.totals.kcal,
                    protein_total: item.totals.protein,
                    carb_total: item.totals.carb,
                    fat_total: item.totals.fat,
                });
            }
        }

        if plan.activate {
            return Ok(activate_locked(&mut t, plan.tenant_id, created.id, None)?.activated);
        }
        Ok(created)
    }

    async fn activate(
        &self,
        tenant_id: Uuid,
        plan_id: Uuid,
        expected_active: Option<Uuid>,
    ) -> Result<Activation, ApiError> {
        let mut t = self.tables.lock().unwrap();
        activate_locked(&mut t, tenant_id, plan_id, expected_active)
    }

    async fn archive(&self, tenant_id: Uuid, plan_id: Uuid) -> Result<MealPlan, ApiError> {
        let mut t = self.tables.lock().unwrap();
        let plan = t
            .plans
            .iter_mut()
            .find(|p| p.tenant_id == tenant_id && p.id == plan_id)
            .ok_or(ApiError::PlanNotFound)?;
        if plan.is_active {
            return Err(ApiError::ArchiveActive(plan.id));
        }
        plan.status = PlanStatus::Archived;
        plan.updated_at = OffsetDateTime::now_utc();
        Ok(plan.clone())
    }
}
