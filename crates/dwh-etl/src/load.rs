//! Load Executor: bulk COPY from object storage into staging tables
//!
//! One COPY per staging or lookup table. Format options are bound when the
//! [`CopySpec`] is declared; authorization uses the configured IAM role.

use tracing::{info, instrument};

use crate::catalog::{Catalog, TableKind};
use crate::config::EtlConfig;
use crate::error::{EtlError, Result};
use crate::query::{quote_literal, Query, QueryList, QueryRole};
use crate::warehouse::Warehouse;

/// Top-level folder of a source object in the bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePrefix {
    /// `raw/`: the four datasets
    Raw,
    /// `lookup/`: reference code lists
    Lookup,
}

impl SourcePrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcePrefix::Raw => "raw",
            SourcePrefix::Lookup => "lookup",
        }
    }
}

/// File format options of a COPY statement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyFormat {
    /// `FORMAT AS CSV`, optionally skipping header lines
    Csv { ignore_header: u32 },
    /// Character-delimited text without CSV quoting rules
    Delimited { delimiter: char, ignore_header: u32 },
    /// `FORMAT AS PARQUET`; the source is a prefix holding a file set
    Parquet,
}

/// One object (or object prefix) loaded into one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySpec {
    pub table: &'static str,
    pub prefix: SourcePrefix,
    /// Path under the prefix, e.g. `airport_code_data/airport-codes_csv.csv`
    pub path: &'static str,
    pub format: CopyFormat,
}

impl CopySpec {
    pub const fn new(
        table: &'static str,
        prefix: SourcePrefix,
        path: &'static str,
        format: CopyFormat,
    ) -> Self {
        Self {
            table,
            prefix,
            path,
            format,
        }
    }

    /// Object key relative to the bucket root
    pub fn object_key(&self) -> String {
        format!("{}/{}", self.prefix.as_str(), self.path)
    }

    /// Full `s3://` location of the source
    pub fn source_uri(&self, config: &EtlConfig) -> String {
        let base = match self.prefix {
            SourcePrefix::Raw => config.raw_data_uri(),
            SourcePrefix::Lookup => config.lookup_data_uri(),
        };
        format!("{}/{}", base, self.path)
    }

    /// Whether the source is a set of objects under a prefix
    pub fn is_file_set(&self) -> bool {
        matches!(self.format, CopyFormat::Parquet)
    }

    pub fn sql(&self, config: &EtlConfig) -> String {
        let mut sql = format!(
            "COPY public.{}\nFROM {}\nIAM_ROLE {}",
            self.table,
            quote_literal(&self.source_uri(config)),
            quote_literal(config.iam_role_arn())
        );

        match self.format {
            CopyFormat::Csv { ignore_header } => {
                sql.push_str("\nFORMAT AS CSV");
                push_ignore_header(&mut sql, ignore_header);
            },
            CopyFormat::Delimited {
                delimiter,
                ignore_header,
            } => {
                sql.push_str(&format!("\nDELIMITER {}", quote_literal(&delimiter.to_string())));
                push_ignore_header(&mut sql, ignore_header);
            },
            CopyFormat::Parquet => sql.push_str("\nFORMAT AS PARQUET"),
        }

        sql.push(';');
        sql
    }
}

fn push_ignore_header(sql: &mut String, lines: u32) {
    if lines > 0 {
        sql.push_str(&format!("\nIGNOREHEADER {}", lines));
    }
}

/// Every source the pipeline loads, in load order
pub fn standard_copies() -> Vec<CopySpec> {
    use CopyFormat::*;
    use SourcePrefix::*;

    vec![
        CopySpec::new(
            "staging_airport_codes",
            Raw,
            "airport_code_data/airport-codes_csv.csv",
            Csv { ignore_header: 1 },
        ),
        CopySpec::new("staging_i94_immigration", Raw, "i94_immigration_data", Parquet),
        CopySpec::new(
            "staging_us_city_demographics",
            Raw,
            "us_city_demographic_data/us-cities-demographics.csv",
            Delimited {
                delimiter: ';',
                ignore_header: 1,
            },
        ),
        CopySpec::new(
            "staging_world_temperatures",
            Raw,
            "world_temperature_data/GlobalLandTemperaturesByCity.csv",
            Csv { ignore_header: 1 },
        ),
        CopySpec::new("i94addrl", Lookup, "i94addrl.csv", Csv { ignore_header: 0 }),
        CopySpec::new("i94cntyl", Lookup, "i94cntyl.csv", Csv { ignore_header: 0 }),
        CopySpec::new("i94model", Lookup, "i94model.csv", Csv { ignore_header: 0 }),
        CopySpec::new("i94prtl", Lookup, "i94prtl_enriched.csv", Csv { ignore_header: 1 }),
        CopySpec::new("i94visal", Lookup, "i94visal.csv", Csv { ignore_header: 0 }),
    ]
}

/// Populates staging and lookup tables from object storage
#[derive(Debug, Clone)]
pub struct LoadExecutor {
    copies: QueryList,
}

impl LoadExecutor {
    /// Order the copies by the catalog and check every loadable table has exactly one
    pub fn new(catalog: &Catalog, copies: Vec<CopySpec>) -> Result<Self> {
        let mut ordered = Vec::with_capacity(copies.len());

        for table in catalog.tables_of(&[TableKind::Staging, TableKind::Lookup]) {
            let mut matching = copies.iter().filter(|c| c.table == table.name);
            let spec = matching.next().ok_or_else(|| {
                EtlError::catalog(format!("no COPY source declared for '{}'", table.name))
            })?;
            if matching.next().is_some() {
                return Err(EtlError::catalog(format!(
                    "more than one COPY source declared for '{}'",
                    table.name
                )));
            }
            ordered.push(Query::copy(spec.clone()));
        }

        if let Some(stray) = copies.iter().find(|c| !catalog.is_loadable(c.table)) {
            return Err(EtlError::catalog(format!(
                "COPY source declared for '{}', which is not a staging or lookup table",
                stray.table
            )));
        }

        Ok(Self {
            copies: QueryList::new(QueryRole::Copy, ordered)?,
        })
    }

    pub fn queries(&self) -> &QueryList {
        &self.copies
    }

    /// Sources in load order
    pub fn specs(&self) -> impl Iterator<Item = &CopySpec> {
        self.copies.iter().filter_map(|q| match q.kind() {
            crate::query::QueryKind::Copy(spec) => Some(spec),
            _ => None,
        })
    }

    /// Execute every COPY in order, committing after each
    #[instrument(skip_all, fields(copies = self.copies.len()))]
    pub async fn stage_all<W>(&self, warehouse: &mut W, config: &EtlConfig) -> Result<()>
    where
        W: Warehouse + ?Sized,
    {
        self.copies.execute_all(warehouse, config).await?;
        info!("Staging tables loaded");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn test_csv_copy_sql() {
        let spec = &standard_copies()[0];
        assert_eq!(
            spec.sql(&test_config()),
            "COPY public.staging_airport_codes\n\
             FROM 's3://capstone/raw/airport_code_data/airport-codes_csv.csv'\n\
             IAM_ROLE 'arn:aws:iam::123456789012:role/dwhRole'\n\
             FORMAT AS CSV\n\
             IGNOREHEADER 1;"
        );
    }

    #[test]
    fn test_parquet_and_delimited_copy_sql() {
        let config = test_config();
        let copies = standard_copies();

        let parquet = copies[1].sql(&config);
        assert!(parquet.contains("FROM 's3://capstone/raw/i94_immigration_data'"));
        assert!(parquet.ends_with("FORMAT AS PARQUET;"));
        assert!(!parquet.contains("IGNOREHEADER"));

        let delimited = copies[2].sql(&config);
        assert!(delimited.contains("DELIMITER ';'\nIGNOREHEADER 1;"));
        assert!(!delimited.contains("FORMAT AS CSV"));
    }

    #[test]
    fn test_lookup_without_header() {
        let sql = standard_copies()[4].sql(&test_config());
        assert!(sql.contains("FROM 's3://capstone/lookup/i94addrl.csv'"));
        assert!(sql.ends_with("FORMAT AS CSV;"));
    }

    #[test]
    fn test_executor_follows_catalog_order() {
        let catalog = Catalog::standard();
        let mut copies = standard_copies();
        copies.reverse();

        let executor = LoadExecutor::new(&catalog, copies).unwrap();
        assert_eq!(executor.queries().tables()[0], "staging_airport_codes");
        assert_eq!(executor.queries().len(), 9);
    }

    #[test]
    fn test_executor_requires_every_source() {
        let catalog = Catalog::standard();
        let mut copies = standard_copies();
        copies.retain(|c| c.table != "i94visal");

        let err = LoadExecutor::new(&catalog, copies).unwrap_err();
        assert!(err.to_string().contains("no COPY source declared for 'i94visal'"));
    }

    #[test]
    fn test_executor_rejects_copy_into_target() {
        let catalog = Catalog::standard();
        let mut copies = standard_copies();
        copies.push(CopySpec::new(
            "airport_codes",
            SourcePrefix::Raw,
            "airport.csv",
            CopyFormat::Csv { ignore_header: 1 },
        ));

        assert!(LoadExecutor::new(&catalog, copies).is_err());
    }
}
