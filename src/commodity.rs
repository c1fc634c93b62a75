//! Commodities are the goods traded in markets (e.g. electricity, crude oil).
use crate::id::define_id_type;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_string_enum::DeserializeLabeledStringEnum;

define_id_type! {CommodityID}

/// A map of [`Commodity`]s, keyed by commodity ID
pub type CommodityMap = IndexMap<CommodityID, Commodity>;

/// A commodity within the simulation
#[derive(Debug, Deserialize, PartialEq)]
pub struct Commodity {
    /// Unique identifier for the commodity (e.g. "ELC")
    pub id: CommodityID,
    /// Text description of commodity (e.g. "electricity")
    pub description: String,
    /// How this commodity's markets behave
    pub kind: MarketKind,
}

/// How the market for a commodity behaves.
///
/// Solved markets have their price adjusted by the solver until supply equals demand.
/// Fixed-price markets have an exogenous price; quantities are still accumulated and reported,
/// but the solver never adjusts the price and the market never blocks convergence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum)]
pub enum MarketKind {
    /// The solver adjusts the price until supply equals demand
    #[string = "solved"]
    Solved,
    /// The price is exogenous; the solver never adjusts it
    #[string = "fixed"]
    FixedPrice,
}
