//! Technologies are the producers, converters, storers and consumers of carriers in a region.
use crate::carrier::CarrierID;
use crate::id::define_id_type;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

define_id_type! {TechnologyID}

/// The category of a technology, which determines which variables and rules apply to it
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, EnumString, Serialize,
)]
pub enum TechCategory {
    /// Produces a carrier from outside the system (extraction, imports)
    Supply,
    /// Converts one carrier into another
    Conversion,
    /// Converts several input carriers into several output carriers in fixed ratios
    #[strum(serialize = "Conversion_plus")]
    #[serde(rename = "Conversion_plus")]
    ConversionPlus,
    /// Moves a carrier within a region
    Transmission,
    /// Stores a carrier for later use
    Storage,
    /// Exogenous demand for a carrier
    Demand,
}

impl TechCategory {
    /// Iterate over all categories in their canonical order
    pub fn iter_all() -> impl Iterator<Item = TechCategory> {
        Self::iter()
    }

    /// Whether technologies of this category have a production variable
    pub fn has_production(self) -> bool {
        self != TechCategory::Demand
    }

    /// Whether technologies of this category have a use (consumption) variable
    pub fn has_use(self) -> bool {
        !matches!(self, TechCategory::Demand | TechCategory::Supply)
    }

    /// Whether technologies of this category have capacity
    pub fn has_capacity(self) -> bool {
        self != TechCategory::Demand
    }

    /// Whether production of this category is linked directly to emissions
    pub fn emits(self) -> bool {
        matches!(
            self,
            TechCategory::Supply | TechCategory::Conversion | TechCategory::ConversionPlus
        )
    }

    /// Whether an efficiency links production to use for this category
    pub fn has_efficiency(self) -> bool {
        matches!(
            self,
            TechCategory::Conversion | TechCategory::ConversionPlus | TechCategory::Transmission
        )
    }
}

/// Whether an entry of a tax/subsidy table is a tax or a subsidy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
pub enum TaxOrSub {
    /// Increases cost
    Tax,
    /// Decreases cost
    Sub,
}

/// A technology within a particular region.
///
/// Technologies with the same name in different regions are distinct entities.
#[derive(Clone, Debug, PartialEq)]
pub struct Technology {
    /// The technology's name, unique within its region
    pub id: TechnologyID,
    /// The technology's category
    pub category: TechCategory,
    /// Unit in which capacity is measured
    pub capacity_unit: String,
    /// Unit in which production is measured
    pub production_unit: String,
    /// The carriers consumed by the technology, in order of declaration
    pub inputs: Vec<CarrierID>,
    /// The carriers produced by the technology, in order of declaration
    pub outputs: Vec<CarrierID>,
}

/// A lookup key for a technology's column in a parameter table
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TechKey(pub TechCategory, pub TechnologyID);

impl Technology {
    /// The key used to look up this technology in parameter tables
    pub fn key(&self) -> TechKey {
        TechKey(self.category, self.id.clone())
    }

    /// The single input carrier of a technology which is not Conversion_plus
    pub fn input(&self) -> Option<&CarrierID> {
        self.inputs.first()
    }

    /// The single output carrier of a technology which is not Conversion_plus
    pub fn output(&self) -> Option<&CarrierID> {
        self.outputs.first()
    }
}
