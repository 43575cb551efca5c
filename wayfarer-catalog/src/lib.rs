pub mod itinerary;
pub mod pricing;

pub use itinerary::{parse_days, parse_group_size, ParsedCount};
pub use pricing::{
    estimate, PricedField, PricingBreakdown, PricingCalculator, PricingConfig, PricingError,
    PricingFallback,
};
