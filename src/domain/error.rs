use thiserror::Error;

use super::types::Commodity;

/// Construction-time validation failures.
///
/// Raised while a scenario is being built into a world; always fatal to that
/// build. Numeric domains are never silently clamped.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} must be finite and non-negative, got {value}")]
    NegativeQuantity { what: String, value: f64 },

    #[error("efficiency must be within [0, 1], got {value} for facility '{name}'")]
    EfficiencyOutOfRange { name: String, value: f64 },

    #[error("initial level {level} exceeds maximum {max} for facility '{name}'")]
    InitialLevelExceedsMax { name: String, level: f64, max: f64 },

    #[error("origin and destination of distribution facility '{name}' must differ")]
    SelfLoop { name: String },

    #[error("unknown city '{city}' referenced by facility '{name}'")]
    UnknownCity { name: String, city: String },

    #[error("'{place}' referenced by facility '{name}' is not a city")]
    NotACity { name: String, place: String },

    #[error("unknown parent node '{parent}' for node '{node}'")]
    UnknownParent { node: String, parent: String },

    #[error("country '{0}' cannot declare a parent")]
    CountryWithParent(String),

    #[error("node '{node}' of kind '{kind}' must declare a parent")]
    MissingParent { node: String, kind: String },

    #[error("city '{0}' cannot have child nodes")]
    CityWithChildren(String),

    #[error("node '{0}' is part of a parent cycle")]
    ParentCycle(String),

    #[error("duplicate node name '{0}'")]
    DuplicateNode(String),

    #[error("duplicate facility name '{0}'")]
    DuplicateFacility(String),

    #[error("externally-fed node '{node}' cannot own facility '{facility}'")]
    ExternallyFedOwner { node: String, facility: String },

    #[error("missing domestic price for commodity '{0}'")]
    MissingPrice(Commodity),

    #[error("scenario defines no top-level country node")]
    NoCountry,
}
