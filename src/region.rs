//! Regions are the top level of the aggregation hierarchy.
//!
//! A region owns its sectors, holds the region's final demand curves, and may impose
//! region-level supply caps per commodity before its contributions are posted to the
//! marketplace.
use crate::commodity::CommodityID;
use crate::id::define_id_type;
use crate::market::MarketKey;
use crate::marketplace::{Marketplace, StructuralError};
use crate::model_time::{ModelTime, Period};
use crate::sector::Sector;
use crate::technology::{add_demand, ContributionMap};
use indexmap::IndexMap;
use serde::Deserialize;

define_id_type! {RegionID}

/// A map of [`Region`]s, keyed by region ID
pub type RegionMap = IndexMap<RegionID, Region>;

/// A final demand curve, selected at construction.
///
/// Demand is a pure function of the commodity's price, scaled by the period's exogenous
/// driver.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DemandFunction {
    /// `demand = base - slope * price`, clamped at zero
    Linear {
        /// Demand at zero price
        base: f64,
        /// Reduction in demand per unit price
        slope: f64,
    },
    /// `demand = base * price ^ elasticity`
    ConstantElasticity {
        /// Demand at unit price
        base: f64,
        /// Price elasticity of demand (negative for ordinary goods)
        elasticity: f64,
    },
    /// Perfectly inelastic demand
    Fixed {
        /// Demand at any price
        level: f64,
    },
}

impl DemandFunction {
    /// Demand at the given price
    pub fn demand(&self, price: f64) -> f64 {
        match *self {
            DemandFunction::Linear { base, slope } => (base - slope * price).max(0.0),
            DemandFunction::ConstantElasticity { base, elasticity } => {
                if price > 0.0 {
                    base * price.powf(elasticity)
                } else if elasticity >= 0.0 {
                    0.0
                } else {
                    // Unbounded demand at a non-positive price; handled as a numeric
                    // degeneracy by the solver
                    f64::INFINITY
                }
            }
            DemandFunction::Fixed { level } => level,
        }
    }
}

fn default_scale() -> f64 {
    1.0
}

/// A region's final demand for one commodity
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FinalDemand {
    /// The commodity demanded
    pub commodity_id: CommodityID,
    /// The demand curve
    pub function: DemandFunction,
    /// Annual fractional growth of the demand scale (exogenous driver)
    #[serde(default)]
    pub growth_rate: f64,

    /// Demand scale for the period currently being solved
    #[serde(skip, default = "default_scale")]
    scale: f64,
    /// Demand recorded for each period, overwritten on every evaluation
    #[serde(skip)]
    demands: Vec<f64>,
}

impl FinalDemand {
    /// The demand recorded for `period` by the most recent evaluation
    pub fn demand_for(&self, period: usize) -> f64 {
        self.demands[period]
    }
}

/// A geographical region and its aggregation subtree
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Region {
    /// A unique identifier for a region (e.g. "GBR")
    pub id: RegionID,
    /// A text description of the region (e.g. "United Kingdom")
    #[serde(default)]
    pub description: String,
    /// The sectors active in this region
    pub sectors: Vec<Sector>,
    /// The region's final demands
    #[serde(default)]
    pub final_demands: Vec<FinalDemand>,
    /// Region-level caps on total supply per commodity (e.g. resource or policy caps)
    #[serde(default)]
    pub supply_caps: IndexMap<CommodityID, f64>,
}

impl Region {
    /// Size the per-period records throughout the subtree. Called once during setup.
    pub(crate) fn initialise(&mut self, num_periods: usize) {
        for sector in &mut self.sectors {
            sector.initialise(num_periods);
        }
        for final_demand in &mut self.final_demands {
            final_demand.demands = vec![0.0; num_periods];
        }
    }

    /// Every commodity this region trades, with duplicates.
    ///
    /// Used during setup to register markets and validate commodity references.
    pub fn commodity_references(&self) -> impl Iterator<Item = &CommodityID> {
        let from_sectors = self.sectors.iter().flat_map(|sector| {
            std::iter::once(&sector.commodity_id).chain(
                sector
                    .subsectors
                    .iter()
                    .flat_map(|subsector| &subsector.technologies)
                    .filter_map(|technology| {
                        technology.input.as_ref().map(|input| &input.commodity_id)
                    }),
            )
        });
        let from_demands = self.final_demands.iter().map(|fd| &fd.commodity_id);
        let from_caps = self.supply_caps.keys();

        from_sectors.chain(from_demands).chain(from_caps)
    }

    /// Every market key this region needs
    pub fn market_keys(&self) -> impl Iterator<Item = MarketKey> + '_ {
        self.commodity_references()
            .map(|commodity_id| (self.id.clone(), commodity_id.clone()))
    }

    /// Derive this period's exogenous demand drivers from the calendar.
    ///
    /// The demand scale grows at each final demand's annual growth rate for the calendar
    /// years elapsed since the base year.
    pub(crate) fn init_period(&mut self, period: Period, model_time: &ModelTime) {
        let elapsed = model_time.year(period) - model_time.base_year();
        for final_demand in &mut self.final_demands {
            final_demand.scale = (1.0 + final_demand.growth_rate).powi(elapsed as i32);
        }
    }

    /// Evaluate the region against the currently posted prices, returning its net
    /// contributions per commodity.
    ///
    /// Sectors are evaluated at full scale first; if a supply cap binds, the affected
    /// sectors are re-evaluated with a uniform scale factor so that recorded outputs and
    /// derived input demands stay consistent with the capped supply.
    pub(crate) fn evaluate(
        &mut self,
        period: Period,
        marketplace: &Marketplace,
    ) -> Result<ContributionMap, StructuralError> {
        let prices = marketplace.region_prices(&self.id, period.0);

        let mut sector_contributions: Vec<ContributionMap> = Vec::with_capacity(self.sectors.len());
        for sector in &mut self.sectors {
            let mut contributions = ContributionMap::new();
            sector.evaluate(period.0, &prices, 1.0, &mut contributions)?;
            sector_contributions.push(contributions);
        }

        for (commodity_id, cap) in &self.supply_caps {
            let supplied: f64 = sector_contributions
                .iter()
                .filter_map(|contributions| contributions.get(commodity_id))
                .map(|flows| flows.supply)
                .sum();
            if supplied > *cap && supplied > 0.0 {
                let factor = cap / supplied;
                for (sector, contributions) in
                    self.sectors.iter_mut().zip(&mut sector_contributions)
                {
                    if &sector.commodity_id == commodity_id {
                        contributions.clear();
                        sector.evaluate(period.0, &prices, factor, contributions)?;
                    }
                }
            }
        }

        let mut contributions = ContributionMap::new();
        for sector_map in sector_contributions {
            for (commodity_id, flows) in sector_map {
                let entry = contributions.entry(commodity_id).or_default();
                entry.supply += flows.supply;
                entry.demand += flows.demand;
            }
        }

        for final_demand in &mut self.final_demands {
            let price = prices.price(&final_demand.commodity_id)?;
            let quantity = final_demand.scale * final_demand.function.demand(price);
            final_demand.demands[period.0] = quantity;
            add_demand(&mut contributions, &final_demand.commodity_id, quantity);
        }

        Ok(contributions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::assert_approx_eq;

    #[test]
    fn test_linear_demand_clamped() {
        let linear = DemandFunction::Linear {
            base: 100.0,
            slope: 1.0,
        };
        assert_eq!(linear.demand(30.0), 70.0);
        assert_eq!(linear.demand(150.0), 0.0);
    }

    #[test]
    fn test_constant_elasticity_demand() {
        let ces = DemandFunction::ConstantElasticity {
            base: 10.0,
            elasticity: -1.0,
        };
        assert_approx_eq!(f64, ces.demand(2.0), 5.0, epsilon = 1e-12);
        assert!(ces.demand(0.0).is_infinite());
    }

    #[test]
    fn test_init_period_growth_scaling() {
        let mut region: Region = toml::from_str(
            r#"
            id = "GBR"
            sectors = []

            [[final_demands]]
            commodity_id = "ELC"
            growth_rate = 0.1

            [final_demands.function]
            kind = "fixed"
            level = 100.0
            "#,
        )
        .unwrap();
        region.initialise(2);

        let time = ModelTime::new(vec![2020, 2022]).unwrap();
        region.init_period(Period(1), &time);
        assert_approx_eq!(f64, region.final_demands[0].scale, 1.21, epsilon = 1e-12);
    }
}
