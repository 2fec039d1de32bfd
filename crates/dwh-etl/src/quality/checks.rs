use super::QualityCheck;

/// Row counts of the staging and lookup tables after the load
pub fn staging_checks() -> Vec<QualityCheck> {
    vec![
        QualityCheck::row_count("staging_airport_codes", 55_075),
        QualityCheck::row_count("staging_i94_immigration", 40_790_529),
        QualityCheck::row_count("staging_us_city_demographics", 2_891),
        QualityCheck::row_count("staging_world_temperatures", 8_599_212),
        QualityCheck::row_count("i94addrl", 55),
        QualityCheck::row_count("i94cntyl", 289),
        QualityCheck::row_count("i94model", 4),
        QualityCheck::row_count("i94prtl", 697),
        QualityCheck::row_count("i94visal", 3),
    ]
}

/// Key completeness and row counts of the target tables after the inserts
pub fn final_checks() -> Vec<QualityCheck> {
    vec![
        QualityCheck::no_nulls("airport_codes", "ident"),
        QualityCheck::row_count("i94_immigration", 40_790_529),
        QualityCheck::no_nulls("us_city_demographics", "state_code"),
        QualityCheck::row_count("world_temperatures", 8_599_212),
        QualityCheck::no_nulls("us_state_visitor_demographics", "state_code"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, TableKind};

    fn probed_table(check: &QualityCheck) -> &str {
        check
            .probe
            .trim_start_matches("SELECT COUNT(*) FROM public.")
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }

    #[test]
    fn test_staging_checks_cover_every_loaded_table() {
        let catalog = Catalog::standard();
        let checks = staging_checks();
        let probed: Vec<&str> = checks.iter().map(probed_table).collect();
        let loaded: Vec<&str> = catalog
            .tables_of(&[TableKind::Staging, TableKind::Lookup])
            .map(|t| t.name)
            .collect();

        assert_eq!(probed, loaded);
    }

    #[test]
    fn test_final_checks_only_probe_targets() {
        let catalog = Catalog::standard();
        for check in final_checks() {
            let table = catalog.get(probed_table(&check)).map(|t| t.kind);
            assert_eq!(table, Some(TableKind::Target), "{}", check.probe);
        }
    }
}
