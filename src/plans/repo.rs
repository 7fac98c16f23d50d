use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::repo_types::{
    Activation, FoodMeasureRow, FoodRow, MealItemRow, MealPlan, MealRow, MealSummaryRow, NewPlan,
    PlanHistoryRow,
};
use crate::error::ApiError;

/// Data access for plan versions. Every plan lookup is scoped to a tenant;
/// meal/item lookups take plan ids that were already resolved that way.
#[async_trait]
pub trait PlanStore: Send + Sync {
    /// All versions of a client's plan, newest version first.
    async fn history(&self, tenant_id: Uuid, client_id: Uuid) -> anyhow::Result<Vec<PlanHistoryRow>>;
    async fn plans_by_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<MealPlan>>;
    async fn meal_summaries(&self, plan_ids: &[Uuid]) -> anyhow::Result<Vec<MealSummaryRow>>;
    async fn plan_contents(&self, plan_id: Uuid) -> anyhow::Result<(Vec<MealRow>, Vec<MealItemRow>)>;
    async fn foods(&self, ids: &[Uuid]) -> anyhow::Result<Vec<FoodRow>>;
    async fn measures(&self, ids: &[Uuid]) -> anyhow::Result<Vec<FoodMeasureRow>>;

    /// Stores a new version (`max(version) + 1`) with its meals and items.
    async fn insert_plan(&self, plan: NewPlan) -> Result<MealPlan, ApiError>;
    /// Makes `plan_id` the client's only active plan in one transaction.
    async fn activate(
        &self,
        tenant_id: Uuid,
        plan_id: Uuid,
        expected_active: Option<Uuid>,
    ) -> Result<Activation, ApiError>;
    async fn archive(&self, tenant_id: Uuid, plan_id: Uuid) -> Result<MealPlan, ApiError>;
}

const PLAN_COLUMNS: &str = r#"
    p.id, p.tenant_id, p.client_id, p.version, p.is_active, p.status,
    p.calorie_target, p.protein_target_g, p.carb_target_g, p.fat_target_g,
    p.notes, p.created_at, p.updated_at, p.replaced_by
"#;

#[derive(Clone)]
pub struct PgPlanStore {
    db: PgPool,
}

impl PgPlanStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

async fn fetch_plan(
    conn: &mut PgConnection,
    tenant_id: Uuid,
    plan_id: Uuid,
    for_update: bool,
) -> anyhow::Result<Option<MealPlan>> {
    let sql = format!(
        "SELECT {PLAN_COLUMNS} FROM meal_plans p WHERE p.tenant_id = $1 AND p.id = $2{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    let plan = sqlx::query_as::<_, MealPlan>(&sql)
        .bind(tenant_id)
        .bind(plan_id)
        .fetch_optional(conn)
        .await
        .context("fetch plan")?;
    Ok(plan)
}

/// Serializes version allocation and activation per client until commit.
async fn lock_client(conn: &mut PgConnection, tenant_id: Uuid, client_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("meal_plans:{}:{}", tenant_id, client_id))
        .execute(conn)
        .await
        .context("lock client plans")?;
    Ok(())
}

async fn activate_tx(
    tx: &mut Transaction<'_, Postgres>,
    tenant_id: Uuid,
    plan_id: Uuid,
    expected_active: Option<Uuid>,
) -> Result<Activation, ApiError> {
    let target = fetch_plan(&mut **tx, tenant_id, plan_id, false)
        .await?
        .ok_or(ApiError::PlanNotFound)?;

    lock_client(&mut **tx, tenant_id, target.client_id).await?;

    let current: Option<Uuid> = sqlx::query_scalar(
        r#"
        SELECT id
          FROM meal_plans
         WHERE tenant_id = $1 AND client_id = $2 AND is_active
         FOR UPDATE
        "#,
    )
    .bind(tenant_id)
    .bind(target.client_id)
    .fetch_optional(&mut **tx)
    .await?;

    if current == Some(target.id) {
        return Err(ApiError::AlreadyActive(target.id));
    }
    if let Some(expected) = expected_active {
        if current != Some(expected) {
            return Err(ApiError::ActivationConflict {
                expected: Some(expected),
                actual: current,
            });
        }
    }

    if let Some(old) = current {
        sqlx::query(
            r#"
            UPDATE meal_plans
               SET is_active = FALSE, status = 'archived', replaced_by = $2, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(old)
        .bind(target.id)
        .execute(&mut **tx)
        .await?;
    }

    let sql = format!(
        r#"
        UPDATE meal_plans p
           SET is_active = TRUE, status = 'active', replaced_by = NULL, updated_at = now()
         WHERE p.id = $1
        RETURNING {PLAN_COLUMNS}
        "#
    );
    let activated = sqlx::query_as::<_, MealPlan>(&sql)
        .bind(target.id)
        .fetch_one(&mut **tx)
        .await?;

    Ok(Activation {
        activated,
        deactivated: current,
    })
}

#[async_trait]
impl PlanStore for PgPlanStore {
    async fn history(&self, tenant_id: Uuid, client_id: Uuid) -> anyhow::Result<Vec<PlanHistoryRow>> {
        let sql = format!(
            r#"
            SELECT {PLAN_COLUMNS},
                   COUNT(DISTINCT m.id) AS meal_count,
                   COUNT(i.id) AS item_count,
                   COALESCE(SUM(i.kcal_total), 0)::float8 AS composed_kcal
              FROM meal_plans p
              LEFT JOIN meal_plan_meals m ON m.plan_id = p.id
              LEFT JOIN meal_items i ON i.meal_id = m.id
             WHERE p.tenant_id = $1 AND p.client_id = $2
             GROUP BY p.id
             ORDER BY p.version DESC
            "#
        );
        let rows = sqlx::query_as::<_, PlanHistoryRow>(&sql)
            .bind(tenant_id)
            .bind(client_id)
            .fetch_all(&self.db)
            .await
            .context("list plan history")?;
        Ok(rows)
    }

    async fn plans_by_ids(&self, tenant_id: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<MealPlan>> {
        let sql = format!(
            "SELECT {PLAN_COLUMNS} FROM meal_plans p WHERE p.tenant_id = $1 AND p.id = ANY($2)"
        );
        let rows = sqlx::query_as::<_, MealPlan>(&sql)
            .bind(tenant_id)
            .bind(ids.to_vec())
            .fetch_all(&self.db)
            .await
            .context("fetch plans by id")?;
        Ok(rows)
    }

    async fn meal_summaries(&self, plan_ids: &[Uuid]) -> anyhow::Result<Vec<MealSummaryRow>> {
        let rows = sqlx::query_as::<_, MealSummaryRow>(
            r#"
            SELECT m.id, m.plan_id, m.name, m.time, m.order_index,
                   COUNT(i.id) AS item_count
              FROM meal_plan_meals m
              LEFT JOIN meal_items i ON i.meal_id = m.id
             WHERE m.plan_id = ANY($1)
             GROUP BY m.id
             ORDER BY m.plan_id, COALESCE(m.order_index, 0), m.id
            "#,
        )
        .bind(plan_ids.to_vec())
        .fetch_all(&self.db)
        .await
        .context("list meal summaries")?;
        Ok(rows)
    }

    async fn plan_contents(&self, plan_id: Uuid) -> anyhow::Result<(Vec<MealRow>, Vec<MealItemRow>)> {
        let meals = sqlx::query_as::<_, MealRow>(
            r#"
            SELECT id, plan_id, name, time, order_index
              FROM meal_plan_meals
             WHERE plan_id = $1
             ORDER BY COALESCE(order_index, 0), id
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.db)
        .await
        .context("list plan meals")?;

        let items = sqlx::query_as::<_, MealItemRow>(
            r#"
            SELECT i.id, i.meal_id, i.food_id, f.name AS food_name, i.measure_id,
                   i.quantity, i.grams_total, i.kcal_total, i.protein_total,
                   i.carb_total, i.fat_total
              FROM meal_items i
              JOIN meal_plan_meals m ON m.id = i.meal_id
              LEFT JOIN foods f ON f.id = i.food_id
             WHERE m.plan_id = $1
            "#,
        )
        .bind(plan_id)
        .fetch_all(&self.db)
        .await
        .context("list plan items")?;

        Ok((meals, items))
    }

    async fn foods(&self, ids: &[Uuid]) -> anyhow::Result<Vec<FoodRow>> {
        let rows = sqlx::query_as::<_, FoodRow>(
            r#"
            SELECT id, kcal_100g, protein_100g, carb_100g, fat_100g
              FROM foods
             WHERE id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.db)
        .await
        .context("fetch foods")?;
        Ok(rows)
    }

    async fn measures(&self, ids: &[Uuid]) -> anyhow::Result<Vec<FoodMeasureRow>> {
        let rows = sqlx::query_as::<_, FoodMeasureRow>(
            r#"
            SELECT id, food_id, label, grams
              FROM food_measures
             WHERE id = ANY($1)
            "#,
        )
        .bind(ids.to_vec())
        .fetch_all(&self.db)
        .await
        .context("fetch food measures")?;
        Ok(rows)
    }

    async fn insert_plan(&self, plan: NewPlan) -> Result<MealPlan, ApiError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        lock_client(&mut tx, plan.tenant_id, plan.client_id).await?;

        let version: i32 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(MAX(version), 0) + 1
              FROM meal_plans
             WHERE tenant_id = $1 AND client_id = $2
            "#,
        )
        .bind(plan.tenant_id)
        .bind(plan.client_id)
        .fetch_one(&mut *tx)
        .await?;

        let sql = format!(
            r#"
            INSERT INTO meal_plans AS p
                (tenant_id, client_id, version, is_active, status,
                 calorie_target, protein_target_g, carb_target_g, fat_target_g, notes)
            VALUES ($1, $2, $3, FALSE, 'draft', $4, $5, $6, $7, $8)
            RETURNING {PLAN_COLUMNS}
            "#
        );
        let mut created = sqlx::query_as::<_, MealPlan>(&sql)
            .bind(plan.tenant_id)
            .bind(plan.client_id)
            .bind(version)
            .bind(plan.calorie_target)
            .bind(plan.protein_target_g)
            .bind(plan.carb_target_g)
            .bind(plan.fat_target_g)
            .bind(&plan.notes)
            .fetch_one(&mut *tx)
            .await?;

        for meal in &plan.meals {
            let meal_id: Uuid = sqlx::query_scalar(
                r#"
                INSERT INTO meal_plan_meals (plan_id, name, time, order_index)
                VALUES ($1, $2, $3, $4)
                RETURNING id
                "#,
            )
            .bind(created.id)
            .bind(&meal.name)
            .bind(&meal.time)
            .bind(meal.order_index)
            .fetch_one(&mut *tx)
            .await?;

            for item in &meal.items {
                sqlx::query(
                    r#"
                    INSERT INTO meal_items
                        (meal_id, food_id, measure_id, quantity, grams_total,
                         kcal_total, protein_total, carb_total, fat_total)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(meal_id)
                .bind(item.food_id)
                .bind(item.measure_id)
                .bind(item.quantity)
                .bind(item.grams_total)
                .bind(item.totals.kcal)
                .bind(item.totals.protein)
                .bind(item.totals.carb)
                .bind(item.totals.fat)
                .execute(&mut *tx)
                .await?;
            }
        }

        if plan.activate {
            created = activate_tx(&mut tx, plan.tenant_id, created.id, None)
                .await?
                .activated;
        }

        tx.commit().await.context("commit tx")?;
        debug!(plan_id = %created.id, version = created.version, "meal plan stored");
        Ok(created)
    }

    async fn activate(
        &self,
        tenant_id: Uuid,
        plan_id: Uuid,
        expected_active: Option<Uuid>,
    ) -> Result<Activation, ApiError> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let activation = activate_tx(&mut tx, tenant_id, plan_id, expected_active).await?;
        tx.commit().await.context("commit tx")?;
        Ok(activation)
    }

    async fn archive(&self, tenant_id: Uuid, plan_id: Uuid) -> Result<MealPlan, ApiError> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let plan = fetch_plan(&mut tx, tenant_id, plan_id, true)
            .await?
            .ok_or(ApiError::PlanNotFound)?;
        if plan.is_active {
            return Err(ApiError::ArchiveActive(plan.id));
        }

        let sql = format!(
            r#"
            UPDATE meal_plans p
               SET status = 'archived', updated_at = now()
             WHERE p.id = $1
            RETURNING {PLAN_COLUMNS}
            "#
        );
        let archived = sqlx::query_as::<_, MealPlan>(&sql)
            .bind(plan.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await.context("commit tx")?;
        Ok(archived)
    }
}
