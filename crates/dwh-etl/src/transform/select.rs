//! `INSERT INTO ... SELECT` plans
//!
//! A [`SelectPlan`] lists the select items of a target table in column
//! order. Joins and the tables an insert reads are derived from the items,
//! so the declared dependencies in the catalog can be checked against what the
//! statement actually touches.

use super::rules::{
    CategoryPivot, CodeLookup, EpochDate, Exclude, HemisphereCoordinate, PackedDate, RegionSuffix,
    SplitPart, SqlType,
};

const ITEM_SEPARATOR: &str = "\n         , ";
const GROUP_SEPARATOR: &str = "\n            , ";

/// One item of a select list
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column copied as is
    Column(&'static str),
    /// Column cast to another type, e.g. `cicid::int4`
    Cast(&'static str, SqlType),
    Lookup(CodeLookup),
    EpochDate(EpochDate),
    PackedDate(PackedDate),
    Hemisphere(HemisphereCoordinate),
    SplitPart(SplitPart),
    RegionSuffix(RegionSuffix),
    /// Expands to one aggregated item per category
    Pivot(CategoryPivot),
}

impl Expr {
    fn render(&self) -> Vec<String> {
        match self {
            Expr::Column(column) => vec![column.to_string()],
            Expr::Cast(column, ty) => vec![format!("{}::{}", column, ty.as_str())],
            Expr::Lookup(rule) => vec![rule.sql()],
            Expr::EpochDate(rule) => vec![rule.sql()],
            Expr::PackedDate(rule) => vec![rule.sql()],
            Expr::Hemisphere(rule) => vec![rule.sql()],
            Expr::SplitPart(rule) => vec![rule.sql()],
            Expr::RegionSuffix(rule) => vec![rule.sql()],
            Expr::Pivot(pivot) => pivot.sql(),
        }
    }

    /// Source column a grouped select must group by, `None` for aggregates
    fn group_key(&self) -> Option<&'static str> {
        match self {
            Expr::Column(column) | Expr::Cast(column, _) => Some(*column),
            Expr::Lookup(rule) => Some(rule.column),
            Expr::EpochDate(rule) => Some(rule.column),
            Expr::PackedDate(rule) => Some(rule.column),
            Expr::Hemisphere(rule) => Some(rule.column),
            Expr::SplitPart(rule) => Some(rule.column),
            Expr::RegionSuffix(rule) => Some(rule.column),
            Expr::Pivot(_) => None,
        }
    }

    /// Number of output columns
    pub fn width(&self) -> usize {
        match self {
            Expr::Pivot(pivot) => pivot.categories.len(),
            _ => 1,
        }
    }
}

macro_rules! impl_from_rule {
    ($($rule:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$rule> for Expr {
                fn from(rule: $rule) -> Self {
                    Expr::$variant(rule)
                }
            }
        )*
    };
}

impl_from_rule! {
    CodeLookup => Lookup,
    EpochDate => EpochDate,
    PackedDate => PackedDate,
    HemisphereCoordinate => Hemisphere,
    SplitPart => SplitPart,
    RegionSuffix => RegionSuffix,
    CategoryPivot => Pivot,
}

/// Select list over one staging table
#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    source: &'static str,
    alias: Option<&'static str>,
    items: Vec<Expr>,
    filter: Option<Exclude>,
}

impl SelectPlan {
    pub fn new(source: &'static str) -> Self {
        Self {
            source,
            alias: None,
            items: Vec::new(),
            filter: None,
        }
    }

    pub fn aliased(mut self, alias: &'static str) -> Self {
        self.alias = Some(alias);
        self
    }

    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        self.items.extend(columns.iter().copied().map(Expr::Column));
        self
    }

    pub fn cast(mut self, column: &'static str, ty: SqlType) -> Self {
        self.items.push(Expr::Cast(column, ty));
        self
    }

    pub fn item(mut self, item: impl Into<Expr>) -> Self {
        self.items.push(item.into());
        self
    }

    pub fn exclude(mut self, filter: Exclude) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn items(&self) -> &[Expr] {
        &self.items
    }

    /// Total number of output columns
    pub fn width(&self) -> usize {
        self.items.iter().map(Expr::width).sum()
    }

    fn lookups(&self) -> impl Iterator<Item = &CodeLookup> {
        self.items.iter().filter_map(|item| match item {
            Expr::Lookup(rule) => Some(rule),
            _ => None,
        })
    }

    fn is_grouped(&self) -> bool {
        self.items.iter().any(|item| item.group_key().is_none())
    }

    /// Staging table first, then each lookup once, in join order
    pub fn reads(&self) -> Vec<&'static str> {
        let mut reads = vec![self.source];
        for rule in self.lookups() {
            if !reads.contains(&rule.lookup) {
                reads.push(rule.lookup);
            }
        }
        reads
    }

    fn render(&self) -> String {
        let items: Vec<String> = self.items.iter().flat_map(Expr::render).collect();
        let mut sql = format!("SELECT {}", items.join(ITEM_SEPARATOR));

        sql.push_str(&format!("\n      FROM public.{}", self.source));
        if let Some(alias) = self.alias {
            sql.push_str(&format!(" {}", alias));
        }

        let source_ref = self.alias.unwrap_or(self.source);
        for rule in self.lookups() {
            sql.push_str(&format!("\n      {}", rule.join_sql(source_ref)));
        }

        if let Some(filter) = &self.filter {
            sql.push_str(&format!("\n     WHERE {}", filter.sql()));
        }

        if self.is_grouped() {
            let keys: Vec<&str> = self.items.iter().filter_map(Expr::group_key).collect();
            sql.push_str(&format!("\n     GROUP BY {}", keys.join(GROUP_SEPARATOR)));
        }

        sql
    }
}

#[derive(Debug, Clone, PartialEq)]
enum InsertBody {
    Select(SelectPlan),
    /// Hand-written select body kept as a SQL file
    Static {
        sql: &'static str,
        reads: &'static [&'static str],
    },
}

/// How one target table is populated
#[derive(Debug, Clone, PartialEq)]
pub struct InsertPlan {
    target: &'static str,
    body: InsertBody,
}

impl InsertPlan {
    pub fn select(target: &'static str, plan: SelectPlan) -> Self {
        Self {
            target,
            body: InsertBody::Select(plan),
        }
    }

    /// A complete `INSERT` statement and the tables it reads
    pub fn from_sql(target: &'static str, sql: &'static str, reads: &'static [&'static str]) -> Self {
        Self {
            target,
            body: InsertBody::Static { sql, reads },
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn reads(&self) -> Vec<&'static str> {
        match &self.body {
            InsertBody::Select(plan) => plan.reads(),
            InsertBody::Static { reads, .. } => reads.to_vec(),
        }
    }

    pub fn select_plan(&self) -> Option<&SelectPlan> {
        match &self.body {
            InsertBody::Select(plan) => Some(plan),
            InsertBody::Static { .. } => None,
        }
    }

    pub fn sql(&self) -> String {
        match &self.body {
            InsertBody::Select(plan) => format!(
                "INSERT INTO public.{} (\n    {}\n);",
                self.target,
                plan.render()
            ),
            InsertBody::Static { sql, .. } => sql.trim().to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::transform::rules::Sentinel;

    #[test]
    fn test_plain_select() {
        let plan = InsertPlan::select(
            "world_temperatures",
            SelectPlan::new("staging_world_temperatures")
                .columns(&["country", "city"])
                .item(HemisphereCoordinate::latitude("latitude"))
                .columns(&["dt"]),
        );

        let sql = plan.sql();
        assert!(sql.starts_with("INSERT INTO public.world_temperatures (\n    SELECT country\n         , city\n         , CASE WHEN"));
        assert!(sql.ends_with("         , dt\n      FROM public.staging_world_temperatures\n);"));
        assert_eq!(plan.reads(), vec!["staging_world_temperatures"]);
    }

    #[test]
    fn test_lookups_add_joins_and_reads() {
        let plan = SelectPlan::new("staging_i94_immigration")
            .aliased("i")
            .item(CodeLookup::new("i94cit", "i94cntyl", "c").or(Sentinel::Int(999)))
            .item(CodeLookup::new("i94res", "i94cntyl", "r").or(Sentinel::Int(999)));

        let sql = plan.render();
        assert!(sql.contains("FROM public.staging_i94_immigration i\n      LEFT JOIN public.i94cntyl c\n             ON i.i94cit = c.id"));
        assert!(sql.contains("LEFT JOIN public.i94cntyl r\n             ON i.i94res = r.id"));
        assert_eq!(plan.reads(), vec!["staging_i94_immigration", "i94cntyl"]);
    }

    #[test]
    fn test_pivot_groups_by_plain_columns() {
        let plan = SelectPlan::new("staging_us_city_demographics")
            .columns(&["state_code", "city"])
            .item(CategoryPivot::new("race", "count", &[("Asian", "asian")]))
            .columns(&["foreign_born"]);

        let sql = plan.render();
        assert!(sql.ends_with("GROUP BY state_code\n            , city\n            , foreign_born"));
        assert_eq!(plan.width(), 4);
    }

    #[test]
    fn test_static_body_is_trimmed() {
        let plan = InsertPlan::from_sql("t", "\n  INSERT INTO public.t (SELECT 1);\n", &["s"]);
        assert_eq!(plan.sql(), "INSERT INTO public.t (SELECT 1);");
        assert!(plan.select_plan().is_none());
    }
}
