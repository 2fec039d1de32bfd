use super::rules::{
    CategoryPivot, CodeLookup, DateLayout, EpochDate, Exclude, HemisphereCoordinate, PackedDate,
    RegionSuffix, Sentinel, SplitPart, SqlType,
};
use super::select::{InsertPlan, SelectPlan};

/// `dtaddto` placeholders meaning "no admitted-until date"
pub const ADMITTED_UNTIL_PLACEHOLDERS: &[&str] = &["00000000", "12319999"];

/// Race categories of the city census, with their output columns
pub const RACE_CATEGORIES: &[(&str, &str)] = &[
    (
        "American Indian and Alaska Native",
        "american_indian_and_alaska_native",
    ),
    ("Asian", "asian"),
    ("Black or African-American", "black_or_african_american"),
    ("Hispanic or Latino", "hispanic_or_latino"),
    ("White", "white"),
];

const STATE_VISITOR_READS: &[&str] = &["us_city_demographics", "i94_immigration"];

/// Every insert of the pipeline
pub fn standard_plans() -> Vec<InsertPlan> {
    vec![
        airport_codes(),
        i94_immigration(),
        us_city_demographics(),
        world_temperatures(),
        InsertPlan::from_sql(
            "us_state_visitor_demographics",
            include_str!("../../sql/insert/us_state_visitor_demographics.sql"),
            STATE_VISITOR_READS,
        ),
    ]
}

fn airport_codes() -> InsertPlan {
    InsertPlan::select(
        "airport_codes",
        SelectPlan::new("staging_airport_codes")
            .columns(&[
                "ident",
                "type",
                "name",
                "elevation_ft",
                "continent",
                "iso_country",
                "iso_region",
            ])
            .item(RegionSuffix::new("iso_region", 3, "state_code"))
            .columns(&["municipality", "gps_code", "iata_code", "local_code"])
            .item(SplitPart::new("coordinates", ',', 2, "latitude"))
            .item(SplitPart::new("coordinates", ',', 1, "longitude"))
            .exclude(Exclude::new("iso_region", "US-U-A")),
    )
}

/// Sentinels for codes missing from the lookups:
/// countries 999, port `XXX`, mode 9, state `99`, visa 2
fn i94_immigration() -> InsertPlan {
    use SqlType::*;

    InsertPlan::select(
        "i94_immigration",
        SelectPlan::new("staging_i94_immigration")
            .aliased("i")
            .cast("cicid", Int4)
            .cast("i94yr", Int2)
            .cast("i94mon", Int2)
            .item(
                CodeLookup::new("i94cit", "i94cntyl", "c")
                    .cast(Int2)
                    .or(Sentinel::Int(999)),
            )
            .item(
                CodeLookup::new("i94res", "i94cntyl", "r")
                    .cast(Int2)
                    .or(Sentinel::Int(999)),
            )
            .item(CodeLookup::new("i94port", "i94prtl", "p").or(Sentinel::Text("XXX")))
            .item(EpochDate::new("arrdate", Int2))
            .item(
                CodeLookup::new("i94mode", "i94model", "m")
                    .cast(Int2)
                    .or(Sentinel::Int(9)),
            )
            .item(CodeLookup::new("i94addr", "i94addrl", "a").or(Sentinel::Text("99")))
            .item(EpochDate::new("depdate", Int4))
            .cast("i94bir", Int2)
            .item(
                CodeLookup::new("i94visa", "i94visal", "v")
                    .cast(Int2)
                    .or(Sentinel::Int(2)),
            )
            .cast("count", Int2)
            .item(PackedDate::new("dtadfile", DateLayout::YearMonthDay))
            .columns(&[
                "visapost", "occup", "entdepa", "entdepd", "entdepu", "matflag",
            ])
            .cast("biryear", Int2)
            .item(PackedDate::guarded(
                "dtaddto",
                DateLayout::MonthDayYear,
                ADMITTED_UNTIL_PLACEHOLDERS,
            ))
            .columns(&["gender", "insnum", "airline"])
            .cast("admnum", Int8)
            .columns(&["fltno", "visatype"]),
    )
}

fn us_city_demographics() -> InsertPlan {
    InsertPlan::select(
        "us_city_demographics",
        SelectPlan::new("staging_us_city_demographics")
            .columns(&[
                "state_code",
                "city",
                "state",
                "median_age",
                "male_population",
                "female_population",
                "total_population",
            ])
            .item(CategoryPivot::new("race", "count", RACE_CATEGORIES))
            .columns(&["number_of_veterans", "foreign_born", "average_household_size"]),
    )
}

fn world_temperatures() -> InsertPlan {
    InsertPlan::select(
        "world_temperatures",
        SelectPlan::new("staging_world_temperatures")
            .columns(&["country", "city"])
            .item(HemisphereCoordinate::latitude("latitude"))
            .item(HemisphereCoordinate::longitude("longitude"))
            .columns(&[
                "dt",
                "average_temperature",
                "average_temperature_uncertainty",
            ]),
    )
}
