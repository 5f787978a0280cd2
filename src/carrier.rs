//! Carriers are the energy and material flows exchanged between technologies.
use crate::id::define_id_type;
use strum::{Display, EnumString};

define_id_type! {CarrierID}
define_id_type! {EmissionID}

/// The role a carrier plays in the energy system
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumString)]
pub enum CarrierType {
    /// A primary resource (e.g. crude natural gas)
    Resource,
    /// An intermediate product (e.g. refined natural gas)
    Intermediate,
    /// A final carrier consumed by demand technologies (e.g. electricity)
    Demand,
}

/// A carrier in the model's carrier catalog
#[derive(Clone, Debug, PartialEq)]
pub struct Carrier {
    /// The carrier's name
    pub id: CarrierID,
    /// The carrier's type
    pub kind: CarrierType,
    /// The unit in which the carrier is measured
    pub unit: String,
}
