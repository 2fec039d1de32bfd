//! Property tests for the cleansing rules
//!
//! The rules render SQL for the warehouse and also evaluate a single value
//! in memory; these tests pin the in-memory behavior across generated input.

use chrono::NaiveDate;
use dwh_etl::transform::rules::{
    CategoryPivot, CodeLookup, DateLayout, EpochDate, Exclude, HemisphereCoordinate, PackedDate,
    RegionSuffix, Sentinel, SplitPart, SqlType,
};
use dwh_etl::Scalar;
use proptest::prelude::*;

const PLACEHOLDERS: &[&str] = &["00000000", "12319999"];

fn admitted_until() -> PackedDate {
    PackedDate::guarded("dtaddto", DateLayout::MonthDayYear, PLACEHOLDERS)
}

proptest! {
    #[test]
    fn hemisphere_suffix_sets_the_sign(magnitude in 0.01f64..180.0) {
        let rendered = format!("{:.2}", magnitude);
        let expected: f64 = rendered.parse().unwrap();

        let latitude = HemisphereCoordinate::latitude("latitude");
        prop_assert_eq!(latitude.apply(&format!("{}N", rendered)), Some(expected));
        prop_assert_eq!(latitude.apply(&format!("{}S", rendered)), Some(-expected));

        let longitude = HemisphereCoordinate::longitude("longitude");
        prop_assert_eq!(longitude.apply(&format!("{}E", rendered)), Some(expected));
        prop_assert_eq!(longitude.apply(&format!("{}W", rendered)), Some(-expected));
    }

    #[test]
    fn region_suffix_drops_the_country_prefix(state in "[A-Z]{2}") {
        let rule = RegionSuffix::new("iso_region", 3, "state_code");
        prop_assert_eq!(rule.apply(&format!("US-{}", state)), state);
    }

    #[test]
    fn split_part_reads_the_requested_coordinate(lon in -180.0f64..180.0, lat in -90.0f64..90.0) {
        let raw = format!("{}, {}", lon, lat);
        prop_assert_eq!(SplitPart::new("coordinates", ',', 1, "longitude").apply(&raw), Some(lon));
        prop_assert_eq!(SplitPart::new("coordinates", ',', 2, "latitude").apply(&raw), Some(lat));
        prop_assert_eq!(SplitPart::new("coordinates", ',', 3, "altitude").apply(&raw), None);
    }

    #[test]
    fn guarded_date_rejects_anything_but_eight_digits(raw in "[0-9]{0,7}|[0-9]{9,12}|[A-Za-z/ -]{8}") {
        prop_assume!(raw.trim().len() != 8 || !raw.trim().chars().all(|c| c.is_ascii_digit()));
        prop_assert_eq!(admitted_until().apply(Some(raw.as_str())), None);
    }

    #[test]
    fn guarded_date_converts_calendar_dates(
        year in 1900i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
        padding in 0usize..3,
    ) {
        let raw = format!("{}{:02}{:02}{:04}{}", " ".repeat(padding), month, day, year, " ".repeat(padding));
        prop_assert_eq!(
            admitted_until().apply(Some(raw.as_str())),
            NaiveDate::from_ymd_opt(year, month, day)
        );
    }

    #[test]
    fn epoch_offset_round_trips_through_days(days in -20_000i64..40_000) {
        let epoch = NaiveDate::from_ymd_opt(1960, 1, 1).unwrap();
        let date = EpochDate::new("arrdate", SqlType::Int2).apply(Some(days as f64)).unwrap();
        prop_assert_eq!((date - epoch).num_days(), days);
    }

    #[test]
    fn unknown_codes_become_the_sentinel(code in 1i64..1000, known in prop::collection::vec(1i64..1000, 0..20)) {
        let rule = CodeLookup::new("i94cit", "i94cntyl", "c")
            .cast(SqlType::Int2)
            .or(Sentinel::Int(999));
        let codes: Vec<Scalar> = known.iter().copied().map(Scalar::Int).collect();

        let coerced = rule.apply(&Scalar::Float(code as f64), &codes);
        if known.contains(&code) {
            prop_assert_eq!(coerced, Scalar::Int(code));
        } else {
            prop_assert_eq!(coerced, Scalar::Int(999));
        }
    }

    #[test]
    fn exclusion_keeps_every_other_region(region in "[A-Z]{2}-[A-Z0-9]{1,3}") {
        let rule = Exclude::new("iso_region", "US-U-A");
        prop_assert_eq!(rule.keeps(Some(region.as_str())), region != "US-U-A");
    }

    #[test]
    fn pivot_preserves_the_total(rows in prop::collection::vec((0usize..3, 0i64..100_000), 0..30)) {
        const CATEGORIES: &[(&str, &str)] = &[("Asian", "asian"), ("White", "white"), ("Other", "other")];
        let pivot = CategoryPivot::new("race", "count", CATEGORIES);

        let sums = pivot.apply(rows.iter().map(|(i, count)| (CATEGORIES[*i].0, Some(*count))));
        let total: i64 = rows.iter().map(|(_, count)| count).sum();

        prop_assert_eq!(sums.iter().flatten().sum::<i64>(), total);
        for (i, sum) in sums.iter().enumerate() {
            prop_assert_eq!(sum.is_some(), rows.iter().any(|(c, _)| *c == i));
        }
    }
}

#[test]
fn placeholder_dates_are_null() {
    for placeholder in PLACEHOLDERS {
        assert_eq!(admitted_until().apply(Some(*placeholder)), None);
    }
    assert_eq!(admitted_until().apply(None), None);
}
