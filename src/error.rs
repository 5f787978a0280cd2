//! Typed errors raised while building a model.
//!
//! Schema errors are raised while constructing the model structure or model data and indicate a
//! problem with the user's input. Precondition errors indicate that the model was built in the
//! wrong order and should never be seen by users.
use std::error::Error;
use std::fmt;

/// An input table or structural definition does not have the expected shape or contents
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A required parameter table is missing (or an unknown table was supplied)
    WrongTableName {
        /// The group the table belongs to (e.g. "global", "trade" or a region ID)
        group: String,
        /// The name of the table
        table: String,
    },
    /// A table's index or columns don't exactly match the declared ones
    WrongIndex {
        /// The name of the table
        table: String,
        /// A description of the mismatch
        detail: String,
    },
    /// A table contains missing values
    NanValues {
        /// The name of the table
        table: String,
    },
    /// A table which is used as a divisor contains zero or negative values
    NonPositiveValues {
        /// The name of the table
        table: String,
    },
    /// An unknown technology category was given
    WrongTechCategory {
        /// The offending category name
        category: String,
    },
    /// An unknown carrier type was given
    WrongCarrierType {
        /// The carrier
        carrier: String,
        /// The offending type name
        kind: String,
    },
    /// A carrier mapping refers to a carrier which isn't in the carrier catalog
    WrongMappingData {
        /// The technology
        technology: String,
        /// The unknown carrier
        carrier: String,
    },
    /// A carrier mapping refers to an unknown technology or one of the wrong category
    WrongMappingTech {
        /// The technology
        technology: String,
        /// Why the mapping is invalid
        reason: String,
    },
    /// The number of years is invalid for the model mode
    WrongNumberOfYears {
        /// The number of years provided
        count: usize,
    },
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaError::WrongTableName { group, table } => {
                write!(f, "Missing or unexpected table '{table}' for {group}")
            }
            SchemaError::WrongIndex { table, detail } => {
                write!(f, "Table '{table}' has the wrong index or columns: {detail}")
            }
            SchemaError::NanValues { table } => {
                write!(f, "Table '{table}' contains missing values")
            }
            SchemaError::NonPositiveValues { table } => {
                write!(f, "Table '{table}' must only contain positive values")
            }
            SchemaError::WrongTechCategory { category } => {
                write!(f, "Invalid technology category: {category}")
            }
            SchemaError::WrongCarrierType { carrier, kind } => {
                write!(f, "Invalid type '{kind}' for carrier {carrier}")
            }
            SchemaError::WrongMappingData {
                technology,
                carrier,
            } => write!(
                f,
                "Technology {technology} refers to carrier {carrier}, which is not defined"
            ),
            SchemaError::WrongMappingTech { technology, reason } => {
                write!(f, "Invalid carrier mapping for technology {technology}: {reason}")
            }
            SchemaError::WrongNumberOfYears { count } => write!(
                f,
                "Operation mode requires exactly one year, but {count} were provided"
            ),
        }
    }
}

impl Error for SchemaError {}

/// A constraint was asked for its rules before the quantities it depends on were computed
#[derive(Debug, Clone, PartialEq)]
pub struct PreconditionError {
    /// The name of the constraint
    pub constraint: &'static str,
    /// The name of the missing quantity
    pub missing: &'static str,
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Constraint {} requires {}, which has not been computed",
            self.constraint, self.missing
        )
    }
}

impl Error for PreconditionError {}
