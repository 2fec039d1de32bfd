//! Structured warehouse statements
//!
//! A [`Query`] is a role tag, a target table and the bindings needed to
//! render it. SQL text is produced only when a statement is about to run, from
//! the explicit [`EtlConfig`] of that run.

use std::fmt;
use tracing::{debug, info};

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::load::CopySpec;
use crate::transform::InsertPlan;
use crate::warehouse::Warehouse;

/// What a statement does to its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryRole {
    Drop,
    Create,
    Copy,
    Insert,
}

impl QueryRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryRole::Drop => "drop",
            QueryRole::Create => "create",
            QueryRole::Copy => "copy",
            QueryRole::Insert => "insert",
        }
    }
}

impl fmt::Display for QueryRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role-specific bindings of a statement
#[derive(Debug, Clone)]
pub enum QueryKind {
    /// `DROP TABLE IF EXISTS`
    Drop,
    /// Static DDL from the schema files
    Create { ddl: &'static str },
    /// Bulk load from object storage
    Copy(CopySpec),
    /// `INSERT INTO ... SELECT` from staging tables
    Insert(InsertPlan),
}

/// A single statement against the warehouse
#[derive(Debug, Clone)]
pub struct Query {
    table: &'static str,
    kind: QueryKind,
}

impl Query {
    pub fn drop(table: &'static str) -> Self {
        Self {
            table,
            kind: QueryKind::Drop,
        }
    }

    pub fn create(table: &'static str, ddl: &'static str) -> Self {
        Self {
            table,
            kind: QueryKind::Create { ddl },
        }
    }

    pub fn copy(spec: CopySpec) -> Self {
        Self {
            table: spec.table,
            kind: QueryKind::Copy(spec),
        }
    }

    pub fn insert(plan: InsertPlan) -> Self {
        Self {
            table: plan.target(),
            kind: QueryKind::Insert(plan),
        }
    }

    pub fn role(&self) -> QueryRole {
        match self.kind {
            QueryKind::Drop => QueryRole::Drop,
            QueryKind::Create { .. } => QueryRole::Create,
            QueryKind::Copy(_) => QueryRole::Copy,
            QueryKind::Insert(_) => QueryRole::Insert,
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Render the statement text for this run
    pub fn sql(&self, config: &EtlConfig) -> String {
        match &self.kind {
            QueryKind::Drop => format!("DROP TABLE IF EXISTS public.{};", self.table),
            QueryKind::Create { ddl } => ddl.trim().to_string(),
            QueryKind::Copy(spec) => spec.sql(config),
            QueryKind::Insert(plan) => plan.sql(),
        }
    }
}

/// Ordered statements sharing one role
#[derive(Debug, Clone)]
pub struct QueryList {
    role: QueryRole,
    queries: Vec<Query>,
}

impl QueryList {
    /// Build a list, rejecting statements of a different role
    pub fn new(role: QueryRole, queries: Vec<Query>) -> Result<Self> {
        if let Some(stray) = queries.iter().find(|q| q.role() != role) {
            return Err(EtlError::catalog(format!(
                "{} query for '{}' placed in the {} list",
                stray.role(),
                stray.table(),
                role
            )));
        }

        Ok(Self { role, queries })
    }

    /// Build a list from statements constructed with `role`
    pub(crate) fn from_trusted(role: QueryRole, queries: Vec<Query>) -> Self {
        debug_assert!(queries.iter().all(|q| q.role() == role));
        Self { role, queries }
    }

    pub fn role(&self) -> QueryRole {
        self.role
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Query> {
        self.queries.iter()
    }

    pub fn tables(&self) -> Vec<&'static str> {
        self.queries.iter().map(Query::table).collect()
    }

    /// Execute every statement in order, committing after each
    ///
    /// Stops at the first failure; statements after it are never issued.
    pub async fn execute_all<W>(&self, warehouse: &mut W, config: &EtlConfig) -> Result<()>
    where
        W: Warehouse + ?Sized,
    {
        for (position, query) in self.queries.iter().enumerate() {
            let sql = query.sql(config);
            debug!(role = %self.role, table = query.table(), sql = %sql, "Executing statement");

            let rows = warehouse
                .execute(&sql)
                .await
                .map_err(|source| EtlError::Statement {
                    role: self.role,
                    table: query.table().to_string(),
                    source,
                })?;

            info!(
                role = %self.role,
                table = query.table(),
                rows,
                step = position + 1,
                of = self.queries.len(),
                "Statement committed"
            );
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a QueryList {
    type Item = &'a Query;
    type IntoIter = std::slice::Iter<'a, Query>;

    fn into_iter(self) -> Self::IntoIter {
        self.queries.iter()
    }
}

/// Quote a value as a SQL string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_drop_renders_if_exists() {
        let query = Query::drop("i94addrl");
        assert_eq!(query.role(), QueryRole::Drop);
        assert_eq!(query.sql(&test_config()), "DROP TABLE IF EXISTS public.i94addrl;");
    }

    #[test]
    fn test_list_rejects_mixed_roles() {
        let err = QueryList::new(
            QueryRole::Drop,
            vec![Query::drop("a"), Query::create("b", "CREATE TABLE b (id int2);")],
        )
        .unwrap_err();

        assert!(err.to_string().contains("create query for 'b'"));
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("O'Hare"), "'O''Hare'");
    }
}
