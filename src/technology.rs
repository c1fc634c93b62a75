//! Technologies are the leaves of the aggregation hierarchy.
//!
//! A technology holds a production function for its sector's commodity, an optional input
//! commodity it consumes in proportion to its output, and the cost parameters its subsector
//! uses to share output between competing technologies.
use crate::commodity::CommodityID;
use crate::id::define_id_type;
use crate::marketplace::{RegionPrices, StructuralError};
use indexmap::IndexMap;
use serde::Deserialize;

define_id_type! {TechnologyID}

/// Net quantities flowing into one market from one evaluation pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Flows {
    /// Quantity supplied (may be negative, representing net consumption)
    pub supply: f64,
    /// Quantity demanded (may be negative, representing net production)
    pub demand: f64,
}

/// Contributions to markets keyed by commodity, in deterministic insertion order
pub type ContributionMap = IndexMap<CommodityID, Flows>;

/// Add a supply contribution to the map
pub(crate) fn add_supply(contributions: &mut ContributionMap, commodity_id: &CommodityID, amount: f64) {
    contributions
        .entry(commodity_id.clone())
        .or_default()
        .supply += amount;
}

/// Add a demand contribution to the map
pub(crate) fn add_demand(contributions: &mut ContributionMap, commodity_id: &CommodityID, amount: f64) {
    contributions
        .entry(commodity_id.clone())
        .or_default()
        .demand += amount;
}

/// The production function of a technology, selected at construction.
///
/// Output is a pure function of the price of the produced commodity and is never negative.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProductionFunction {
    /// `output = intercept + slope * price`, clamped at zero
    Linear {
        /// Output at zero price
        intercept: f64,
        /// Change in output per unit price
        slope: f64,
    },
    /// `output = scale * price ^ elasticity`
    ConstantElasticity {
        /// Output at unit price
        scale: f64,
        /// Price elasticity of supply
        elasticity: f64,
    },
    /// Perfectly inelastic output
    Fixed {
        /// Output at any price
        level: f64,
    },
}

impl ProductionFunction {
    /// Output at the given price
    pub fn output(&self, price: f64) -> f64 {
        match *self {
            ProductionFunction::Linear { intercept, slope } => {
                (intercept + slope * price).max(0.0)
            }
            ProductionFunction::ConstantElasticity { scale, elasticity } => {
                if price > 0.0 {
                    scale * price.powf(elasticity)
                } else {
                    0.0
                }
            }
            ProductionFunction::Fixed { level } => level,
        }
    }
}

/// An input commodity consumed in proportion to output
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TechnologyInput {
    /// The commodity consumed
    pub commodity_id: CommodityID,
    /// Units of input demanded per unit of output
    pub intensity: f64,
}

/// A production technology
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Technology {
    /// Unique identifier for the technology
    pub id: TechnologyID,
    /// Text description of the technology
    #[serde(default)]
    pub description: String,
    /// The production function for the sector's commodity
    pub production: ProductionFunction,
    /// Weight used by the subsector's share-weighting strategy
    #[serde(default = "default_share_weight")]
    pub share_weight: f64,
    /// Cost per unit output excluding input costs
    #[serde(default)]
    pub non_energy_cost: f64,
    /// Input commodity consumed per unit output, if any
    #[serde(default)]
    pub input: Option<TechnologyInput>,

    /// Output recorded for each period, overwritten on every evaluation
    #[serde(skip)]
    outputs: Vec<f64>,
}

fn default_share_weight() -> f64 {
    1.0
}

impl Technology {
    /// Size the per-period output record. Called once during setup.
    pub(crate) fn initialise(&mut self, num_periods: usize) {
        self.outputs = vec![0.0; num_periods];
    }

    /// Cost per unit output at the current prices
    pub fn cost(&self, prices: &RegionPrices) -> Result<f64, StructuralError> {
        let input_cost = match &self.input {
            Some(input) => input.intensity * prices.price(&input.commodity_id)?,
            None => 0.0,
        };
        Ok(self.non_energy_cost + input_cost)
    }

    /// Output before share weighting, at the given price of the produced commodity
    pub fn potential_output(&self, output_price: f64) -> f64 {
        self.production.output(output_price)
    }

    /// Record the output assigned to this technology for `period`
    pub(crate) fn record_output(&mut self, period: usize, amount: f64) {
        self.outputs[period] = amount;
    }

    /// The output recorded for `period` by the most recent evaluation
    pub fn output(&self, period: usize) -> f64 {
        self.outputs[period]
    }
}
