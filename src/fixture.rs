//! Fixtures for tests

use crate::commodity::{Commodity, CommodityMap, MarketKind};
use crate::model_time::ModelTime;
use crate::region::Region;
use crate::settings::SolverSettings;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn commodities() -> CommodityMap {
    [
        Commodity {
            id: "ELC".into(),
            description: "electricity".into(),
            kind: MarketKind::Solved,
        },
        Commodity {
            id: "GAS".into(),
            description: "natural gas".into(),
            kind: MarketKind::FixedPrice,
        },
    ]
    .into_iter()
    .map(|commodity| (commodity.id.clone(), commodity))
    .collect()
}

/// One region, one sector, one market: linear supply `s(p) = p` against linear final demand
/// `d(p) = 100 - p`, clearing at a price of 50.
#[fixture]
pub fn linear_region() -> Region {
    toml::from_str(
        r#"
        id = "GBR"
        description = "United Kingdom"

        [[sectors]]
        id = "power"
        commodity_id = "ELC"

        [[sectors.subsectors]]
        id = "generation"
        weighting = {kind = "fixed"}

        [[sectors.subsectors.technologies]]
        id = "plant"
        production = {kind = "linear", intercept = 0.0, slope = 1.0}

        [[final_demands]]
        commodity_id = "ELC"
        function = {kind = "linear", base = 100.0, slope = 1.0}
        "#,
    )
    .unwrap()
}

#[fixture]
pub fn model_time() -> ModelTime {
    ModelTime::new(vec![2020, 2025, 2030]).unwrap()
}

#[fixture]
pub fn solver_settings() -> SolverSettings {
    SolverSettings::default()
}
