//! Schema Catalog
//!
//! Static registry of every table the pipeline owns. Each table carries its
//! kind, its DDL, and (for target tables) the tables its insert reads. The
//! read edges form the dependency graph that orders the transform stage.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use tracing::{info, instrument};

use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::query::{Query, QueryList, QueryRole};
use crate::warehouse::Warehouse;

mod tables;

pub use tables::standard_tables;

/// Role of a table in the load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Loosely typed landing table filled by COPY
    Staging,
    /// Small reference table filled by COPY, joined to validate codes
    Lookup,
    /// Typed table filled by an insert
    Target,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableKind::Staging => write!(f, "staging"),
            TableKind::Lookup => write!(f, "lookup"),
            TableKind::Target => write!(f, "target"),
        }
    }
}

/// A table definition
#[derive(Debug, Clone)]
pub struct TableDef {
    pub name: &'static str,
    pub kind: TableKind,
    pub ddl: &'static str,
    /// Tables that must be populated before this one's insert runs
    pub reads: Vec<&'static str>,
}

impl TableDef {
    pub fn staging(name: &'static str, ddl: &'static str) -> Self {
        Self {
            name,
            kind: TableKind::Staging,
            ddl,
            reads: Vec::new(),
        }
    }

    pub fn lookup(name: &'static str, ddl: &'static str) -> Self {
        Self {
            name,
            kind: TableKind::Lookup,
            ddl,
            reads: Vec::new(),
        }
    }

    pub fn target(name: &'static str, ddl: &'static str, reads: &[&'static str]) -> Self {
        Self {
            name,
            kind: TableKind::Target,
            ddl,
            reads: reads.to_vec(),
        }
    }

    /// Whether a COPY fills this table
    pub fn is_loadable(&self) -> bool {
        matches!(self.kind, TableKind::Staging | TableKind::Lookup)
    }
}

/// Registry of all tables, in declaration order
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: Vec<TableDef>,
}

impl Catalog {
    /// Build and validate a catalog
    pub fn new(tables: Vec<TableDef>) -> Result<Self> {
        let catalog = Self { tables };
        catalog.validate()?;
        Ok(catalog)
    }

    /// The warehouse schema of the immigration data model
    pub fn standard() -> Self {
        Self {
            tables: standard_tables(),
        }
    }

    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    pub fn get(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn is_loadable(&self, name: &str) -> bool {
        self.get(name).is_some_and(TableDef::is_loadable)
    }

    /// Tables of the given kinds, in declaration order
    pub fn tables_of<'a>(&'a self, kinds: &'a [TableKind]) -> impl Iterator<Item = &'a TableDef> {
        self.tables.iter().filter(move |t| kinds.contains(&t.kind))
    }

    /// Check names are unique and the dependency graph is well formed
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.name) {
                return Err(EtlError::catalog(format!("table '{}' declared twice", table.name)));
            }
        }

        for table in &self.tables {
            if table.is_loadable() && !table.reads.is_empty() {
                return Err(EtlError::catalog(format!(
                    "{} table '{}' is loaded by COPY and cannot depend on other tables",
                    table.kind, table.name
                )));
            }
            for dependency in &table.reads {
                if self.get(dependency).is_none() {
                    return Err(EtlError::catalog(format!(
                        "'{}' reads unknown table '{}'",
                        table.name, dependency
                    )));
                }
                if *dependency == table.name {
                    return Err(EtlError::catalog(format!("'{}' reads itself", table.name)));
                }
            }
        }

        self.insert_order().map(|_| ())
    }

    /// Target tables in an order where every table follows the targets it reads
    ///
    /// Staging and lookup dependencies are satisfied by the load stage, which
    /// always runs first. Whenever several targets are ready, the one declared
    /// first runs next, so a dependent runs as early as its dependencies allow.
    pub fn insert_order(&self) -> Result<Vec<&TableDef>> {
        let targets: Vec<&TableDef> = self.tables_of(&[TableKind::Target]).collect();
        let position: HashMap<&str, usize> =
            targets.iter().enumerate().map(|(i, t)| (t.name, i)).collect();

        let mut pending = vec![0usize; targets.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); targets.len()];
        for (i, table) in targets.iter().enumerate() {
            for dependency in &table.reads {
                if let Some(&j) = position.get(dependency) {
                    pending[i] += 1;
                    dependents[j].push(i);
                }
            }
        }

        let mut ready: VecDeque<usize> = (0..targets.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(targets.len());

        while let Some(i) = ready.pop_front() {
            order.push(targets[i]);
            let mut unlocked = Vec::new();
            for &k in &dependents[i] {
                pending[k] -= 1;
                if pending[k] == 0 {
                    unlocked.push(k);
                }
            }
            ready.extend(unlocked);
            ready.make_contiguous().sort_unstable();
        }

        if order.len() != targets.len() {
            let cyclic: Vec<&str> = targets
                .iter()
                .enumerate()
                .filter(|(i, _)| pending[*i] > 0)
                .map(|(_, t)| t.name)
                .collect();
            return Err(EtlError::catalog(format!(
                "dependency cycle between target tables: {}",
                cyclic.join(", ")
            )));
        }

        Ok(order)
    }

    /// One `DROP TABLE IF EXISTS` per table, in declaration order
    pub fn drop_queries(&self) -> QueryList {
        let queries = self.tables.iter().map(|t| Query::drop(t.name)).collect();
        QueryList::from_trusted(QueryRole::Drop, queries)
    }

    /// One create per table, in declaration order
    pub fn create_queries(&self) -> QueryList {
        let queries = self.tables.iter().map(|t| Query::create(t.name, t.ddl)).collect();
        QueryList::from_trusted(QueryRole::Create, queries)
    }

    /// Drop every table, committing after each statement
    #[instrument(skip_all, fields(tables = self.tables.len()))]
    pub async fn drop_all<W>(&self, warehouse: &mut W, config: &EtlConfig) -> Result<()>
    where
        W: Warehouse + ?Sized,
    {
        self.drop_queries().execute_all(warehouse, config).await?;
        info!("Tables dropped");
        Ok(())
    }

    /// Create every table, committing after each statement
    #[instrument(skip_all, fields(tables = self.tables.len()))]
    pub async fn create_all<W>(&self, warehouse: &mut W, config: &EtlConfig) -> Result<()>
    where
        W: Warehouse + ?Sized,
    {
        self.create_queries().execute_all(warehouse, config).await?;
        info!("Tables created");
        Ok(())
    }
}
