//! Bootstrap seeding of the canonical plan catalog
//!
//! Runs at service startup. Idempotent: existing rows are left alone unless
//! their attributes have drifted from the canonical definition, in which
//! case they are rewritten.

use crate::error::PlanResult;
use crate::models::CreatePlan;
use crate::repository::PlanRepository;

/// The canonical pricing tiers.
pub fn default_plans() -> Vec<CreatePlan> {
    vec![
        CreatePlan {
            slug: "tinkering".to_string(),
            name: "Tinkering".to_string(),
            price_cents: 500,
            query_qps_limit: 5.0,
            ingest_qps_limit: 5.0,
            project_limit: Some(3),
            vector_limit_per_project: Some(10_000),
        },
        CreatePlan {
            slug: "building".to_string(),
            name: "Building".to_string(),
            price_cents: 2_000,
            query_qps_limit: 10.0,
            ingest_qps_limit: 10.0,
            project_limit: Some(20),
            vector_limit_per_project: Some(100_000),
        },
        CreatePlan {
            slug: "scale".to_string(),
            name: "Scale".to_string(),
            price_cents: 5_000,
            query_qps_limit: 100.0,
            ingest_qps_limit: 100.0,
            project_limit: None,
            vector_limit_per_project: Some(250_000),
        },
    ]
}

/// Slugs of the canonical tiers, in price order.
pub const DEFAULT_PLANS: [&str; 3] = ["tinkering", "building", "scale"];

/// Ensure the canonical plan definitions exist, reconciling drifted rows.
///
/// Returns the number of rows created or rewritten.
pub async fn seed_plans<R: PlanRepository>(repo: &R) -> PlanResult<usize> {
    let mut changed = 0;

    for definition in default_plans() {
        match repo.get_by_slug(&definition.slug).await? {
            None => {
                repo.create(definition).await?;
                changed += 1;
            }
            Some(mut plan) if plan.differs_from(&definition) => {
                tracing::warn!(plan = %plan.slug, "Plan attributes drifted, reseeding");
                plan.apply_definition(&definition);
                repo.update(plan).await?;
                changed += 1;
            }
            Some(_) => {}
        }
    }

    if changed > 0 {
        tracing::info!(changed, "Plan catalog seeded");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryPlanRepository;

    #[tokio::test]
    async fn test_seed_creates_all_plans() {
        let repo = InMemoryPlanRepository::new();

        let changed = seed_plans(&repo).await.unwrap();
        assert_eq!(changed, 3);

        for slug in DEFAULT_PLANS {
            assert!(repo.get_by_slug(slug).await.unwrap().is_some(), "{}", slug);
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let repo = InMemoryPlanRepository::new();

        seed_plans(&repo).await.unwrap();
        let first = repo.get_by_slug("tinkering").await.unwrap().unwrap();

        let changed = seed_plans(&repo).await.unwrap();
        assert_eq!(changed, 0);

        let second = repo.get_by_slug("tinkering").await.unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_seed_reconciles_drifted_values() {
        let repo = InMemoryPlanRepository::new();
        seed_plans(&repo).await.unwrap();

        // Simulate drift (e.g. a hand-edited row)
        let mut plan = repo.get_by_slug("scale").await.unwrap().unwrap();
        plan.query_qps_limit = 9_999.0;
        repo.update(plan).await.unwrap();

        let changed = seed_plans(&repo).await.unwrap();
        assert_eq!(changed, 1);

        let plan = repo.get_by_slug("scale").await.unwrap().unwrap();
        assert_eq!(plan.query_qps_limit, 100.0);
    }

    #[tokio::test]
    async fn test_canonical_limits() {
        let repo = InMemoryPlanRepository::new();
        seed_plans(&repo).await.unwrap();

        let tinkering = repo.get_by_slug("tinkering").await.unwrap().unwrap();
        assert_eq!(tinkering.ingest_qps_limit, 5.0);
        assert_eq!(tinkering.vector_limit_per_project, Some(10_000));
        assert_eq!(tinkering.project_limit, Some(3));

        let scale = repo.get_by_slug("scale").await.unwrap().unwrap();
        assert_eq!(scale.project_limit, None);
        assert_eq!(scale.vector_limit_per_project, Some(250_000));
    }
}
