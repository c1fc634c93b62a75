//! Subsectors share output between competing technologies.
//!
//! Each subsector holds a share-weighting strategy, selected at construction, which turns the
//! technologies' costs and share weights into a set of shares summing to one.
use crate::commodity::CommodityID;
use crate::id::define_id_type;
use crate::marketplace::{RegionPrices, StructuralError};
use crate::technology::{add_demand, add_supply, ContributionMap, Technology};
use itertools::izip;
use serde::Deserialize;

define_id_type! {SubsectorID}

/// Costs at or below this are clamped before exponentiation in the logit numerator
const MIN_LOGIT_COST: f64 = 1e-9;

/// How a subsector shares output between its technologies
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShareWeighting {
    /// Share proportional to `weight * cost ^ (-exponent)`: cheaper technologies win more share
    Logit {
        /// Cost sensitivity; larger values concentrate share on the cheapest technology
        exponent: f64,
    },
    /// Shares are the normalised share weights, independent of cost
    Fixed,
}

impl ShareWeighting {
    /// Compute shares for technologies with the given weights and costs.
    ///
    /// The shares sum to one. If every numerator is zero (e.g. all weights zero), the
    /// technologies share equally rather than dividing by zero.
    pub fn shares(&self, weights: &[f64], costs: &[f64]) -> Vec<f64> {
        assert_eq!(weights.len(), costs.len());

        let numerators: Vec<f64> = match *self {
            ShareWeighting::Logit { exponent } => izip!(weights, costs)
                .map(|(weight, cost)| weight * cost.max(MIN_LOGIT_COST).powf(-exponent))
                .collect(),
            ShareWeighting::Fixed => weights.to_vec(),
        };

        let total: f64 = numerators.iter().sum();
        if total > 0.0 {
            numerators.iter().map(|n| n / total).collect()
        } else {
            let equal = 1.0 / numerators.len() as f64;
            vec![equal; numerators.len()]
        }
    }
}

/// A group of technologies competing to supply the sector's commodity
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Subsector {
    /// Unique identifier for the subsector
    pub id: SubsectorID,
    /// Text description of the subsector
    #[serde(default)]
    pub description: String,
    /// The share-weighting strategy
    pub weighting: ShareWeighting,
    /// The competing technologies
    pub technologies: Vec<Technology>,

    /// Output recorded for each period, overwritten on every evaluation
    #[serde(skip)]
    outputs: Vec<f64>,
}

impl Subsector {
    /// Size the per-period output records. Called once during setup.
    pub(crate) fn initialise(&mut self, num_periods: usize) {
        self.outputs = vec![0.0; num_periods];
        for technology in &mut self.technologies {
            technology.initialise(num_periods);
        }
    }

    /// Evaluate the subsector against the currently posted prices.
    ///
    /// Computes technology costs and shares, assigns each technology its share of its
    /// potential output (scaled by `scale`), and adds the resulting supply of
    /// `output_commodity` and demand for input commodities to `contributions`.
    pub(crate) fn evaluate(
        &mut self,
        period: usize,
        output_commodity: &CommodityID,
        prices: &RegionPrices,
        scale: f64,
        contributions: &mut ContributionMap,
    ) -> Result<(), StructuralError> {
        let costs: Vec<f64> = self
            .technologies
            .iter()
            .map(|technology| technology.cost(prices))
            .collect::<Result<_, _>>()?;
        let weights: Vec<f64> = self
            .technologies
            .iter()
            .map(|technology| technology.share_weight)
            .collect();
        let shares = self.weighting.shares(&weights, &costs);

        let output_price = prices.price(output_commodity)?;
        let mut total = 0.0;
        for (technology, share) in self.technologies.iter_mut().zip(&shares) {
            let output = scale * share * technology.potential_output(output_price);
            technology.record_output(period, output);
            total += output;

            add_supply(contributions, output_commodity, output);
            if let Some(input) = &technology.input {
                add_demand(contributions, &input.commodity_id, output * input.intensity);
            }
        }
        self.outputs[period] = total;

        Ok(())
    }

    /// The output recorded for `period` by the most recent evaluation
    pub fn output(&self, period: usize) -> f64 {
        self.outputs[period]
    }
}
