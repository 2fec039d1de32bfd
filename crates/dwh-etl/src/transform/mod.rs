//! Transform Executor: populate target tables from staging tables
//!
//! Inserts run in the catalog's dependency order, one statement per target,
//! committing after each. Cleansing happens inside the statements through the
//! rules in [`rules`]; unknown codes are coerced to sentinels, never rejected.

use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::query::{Query, QueryList, QueryRole};
use crate::warehouse::Warehouse;

pub mod plans;
pub mod rules;
mod select;

pub use plans::standard_plans;
pub use select::{Expr, InsertPlan, SelectPlan};

/// Populates target tables with one insert each
#[derive(Debug, Clone)]
pub struct TransformExecutor {
    inserts: QueryList,
}

impl TransformExecutor {
    /// Order the plans by the catalog's insert order
    ///
    /// Every target table needs exactly one plan, and a plan may only read
    /// tables its target declares as dependencies.
    pub fn new(catalog: &Catalog, mut plans: Vec<InsertPlan>) -> Result<Self> {
        let order = catalog.insert_order()?;

        if let Some(stray) = plans
            .iter()
            .find(|p| !order.iter().any(|t| t.name == p.target()))
        {
            return Err(EtlError::catalog(format!(
                "insert declared for '{}', which is not a target table",
                stray.target()
            )));
        }

        let mut ordered = Vec::with_capacity(plans.len());
        for table in order {
            let position = plans
                .iter()
                .position(|p| p.target() == table.name)
                .ok_or_else(|| EtlError::catalog(format!("no insert declared for '{}'", table.name)))?;
            let plan = plans.swap_remove(position);

            if plans.iter().any(|p| p.target() == table.name) {
                return Err(EtlError::catalog(format!(
                    "more than one insert declared for '{}'",
                    table.name
                )));
            }

            if let Some(undeclared) = plan.reads().into_iter().find(|r| !table.reads.contains(r)) {
                return Err(EtlError::catalog(format!(
                    "insert into '{}' reads '{}', which it does not declare as a dependency",
                    table.name, undeclared
                )));
            }

            ordered.push(Query::insert(plan));
        }

        Ok(Self {
            inserts: QueryList::new(QueryRole::Insert, ordered)?,
        })
    }

    pub fn queries(&self) -> &QueryList {
        &self.inserts
    }

    /// Execute every insert in dependency order, committing after each
    #[instrument(skip_all, fields(inserts = self.inserts.len()))]
    pub async fn insert_all<W>(&self, warehouse: &mut W, config: &EtlConfig) -> Result<()>
    where
        W: Warehouse + ?Sized,
    {
        self.inserts.execute_all(warehouse, config).await?;
        info!("Target tables populated");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::catalog::TableDef;

    const DDL: &str = "CREATE TABLE IF NOT EXISTS t (id int2);";

    #[test]
    fn test_standard_plans_follow_insert_order() {
        let catalog = Catalog::standard();
        let mut plans = standard_plans();
        plans.reverse();

        let executor = TransformExecutor::new(&catalog, plans).unwrap();
        assert_eq!(
            executor.queries().tables(),
            vec![
                "airport_codes",
                "i94_immigration",
                "us_city_demographics",
                "world_temperatures",
                "us_state_visitor_demographics",
            ]
        );
    }

    #[test]
    fn test_missing_plan_is_rejected() {
        let catalog = Catalog::standard();
        let mut plans = standard_plans();
        plans.retain(|p| p.target() != "world_temperatures");

        let err = TransformExecutor::new(&catalog, plans).unwrap_err();
        assert!(err.to_string().contains("no insert declared for 'world_temperatures'"));
    }

    #[test]
    fn test_undeclared_read_is_rejected() {
        let catalog = Catalog::new(vec![
            TableDef::staging("raw", DDL),
            TableDef::lookup("codes", DDL),
            TableDef::target("clean", DDL, &["raw"]),
        ])
        .unwrap();
        let plan = InsertPlan::select(
            "clean",
            SelectPlan::new("raw")
                .aliased("s")
                .item(rules::CodeLookup::new("code", "codes", "c").or(rules::Sentinel::Int(0))),
        );

        let err = TransformExecutor::new(&catalog, vec![plan]).unwrap_err();
        assert!(err.to_string().contains("reads 'codes'"));
    }

    #[test]
    fn test_plan_for_staging_table_is_rejected() {
        let catalog = Catalog::standard();
        let mut plans = standard_plans();
        plans.push(InsertPlan::from_sql("i94addrl", "INSERT INTO public.i94addrl (SELECT 1);", &[]));

        assert!(TransformExecutor::new(&catalog, plans).is_err());
    }
}
