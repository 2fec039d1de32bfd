use super::TableDef;

macro_rules! ddl {
    ($table:literal) => {
        include_str!(concat!("../../sql/create/", $table, ".sql"))
    };
}

const IMMIGRATION_READS: &[&str] = &[
    "staging_i94_immigration",
    "i94cntyl",
    "i94prtl",
    "i94model",
    "i94addrl",
    "i94visal",
];

/// Every table of the warehouse, in drop and create order
pub fn standard_tables() -> Vec<TableDef> {
    vec![
        TableDef::staging("staging_airport_codes", ddl!("staging_airport_codes")),
        TableDef::target("airport_codes", ddl!("airport_codes"), &["staging_airport_codes"]),
        TableDef::staging("staging_i94_immigration", ddl!("staging_i94_immigration")),
        TableDef::target("i94_immigration", ddl!("i94_immigration"), IMMIGRATION_READS),
        TableDef::staging("staging_us_city_demographics", ddl!("staging_us_city_demographics")),
        TableDef::target(
            "us_city_demographics",
            ddl!("us_city_demographics"),
            &["staging_us_city_demographics"],
        ),
        TableDef::staging("staging_world_temperatures", ddl!("staging_world_temperatures")),
        TableDef::target(
            "world_temperatures",
            ddl!("world_temperatures"),
            &["staging_world_temperatures"],
        ),
        TableDef::lookup("i94addrl", ddl!("i94addrl")),
        TableDef::lookup("i94cntyl", ddl!("i94cntyl")),
        TableDef::lookup("i94model", ddl!("i94model")),
        TableDef::lookup("i94prtl", ddl!("i94prtl")),
        TableDef::lookup("i94visal", ddl!("i94visal")),
        TableDef::target(
            "us_state_visitor_demographics",
            ddl!("us_state_visitor_demographics"),
            &["us_city_demographics", "i94_immigration"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ddl_matches_table_names() {
        for table in standard_tables() {
            assert!(
                table.ddl.contains(&format!("public.{} (", table.name)),
                "DDL of {} does not create it",
                table.name
            );
        }
    }

    #[test]
    fn test_unguarded_creates() {
        let tables = standard_tables();
        let without_guard: Vec<&str> = tables
            .iter()
            .filter(|t| !t.ddl.contains("IF NOT EXISTS"))
            .map(|t| t.name)
            .collect();

        assert_eq!(without_guard, vec!["i94_immigration", "us_state_visitor_demographics"]);
    }

    #[test]
    fn test_state_visitor_columns_nullable_for_unvisited_states() {
        let tables = standard_tables();
        let ddl = tables
            .iter()
            .find(|t| t.name == "us_state_visitor_demographics")
            .map(|t| t.ddl)
            .unwrap();

        let lines: Vec<&str> = ddl.lines().map(str::trim).collect();
        let visit: Vec<&&str> = lines.iter().filter(|l| l.starts_with("visit_")).collect();
        assert_eq!(visit.len(), 5);
        assert!(visit.iter().all(|l| !l.contains("NOT NULL")));
        assert!(lines.iter().any(|l| l.starts_with("state_code") && l.contains("NOT NULL")));
    }
}
