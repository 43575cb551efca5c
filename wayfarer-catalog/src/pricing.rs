use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use wayfarer_shared::CurrencyCode;

use crate::itinerary::{parse_days, parse_group_size, ParsedCount};

/// Rates used when estimating a trip price.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingConfig {
    /// Per traveler, per day.
    #[serde(default = "default_base_price")]
    pub base_price_per_day: Decimal,

    /// Per day, regardless of group size.
    #[serde(default = "default_guide_price")]
    pub guide_price_per_day: Decimal,

    #[serde(default)]
    pub currency: CurrencyCode,
}

fn default_base_price() -> Decimal {
    Decimal::from(150)
}

fn default_guide_price() -> Decimal {
    Decimal::from(50)
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_price_per_day: default_base_price(),
            guide_price_per_day: default_guide_price(),
            currency: CurrencyCode::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PricingError {
    #[error("Rate {name} must not be negative, got {value}")]
    NegativeRate { name: &'static str, value: Decimal },
}

/// Which input fell back to the default count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PricedField {
    Days,
    GroupSize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricingFallback {
    pub field: PricedField,
    pub original: String,
    pub used: u32,
}

/// Itemized estimate shown to the admin console before confirmation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingBreakdown {
    pub days: u32,
    pub group_size: u32,
    pub base_price_per_day: Decimal,
    pub guide_price_per_day: Decimal,
    pub base_price_total: Decimal,
    pub guide_price_total: Decimal,
    pub grand_total: Decimal,
    /// Inputs that could not be read and were priced as 1.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fallbacks: Vec<PricingFallback>,
}

impl PricingBreakdown {
    pub fn used_fallback(&self) -> bool {
        !self.fallbacks.is_empty()
    }
}

fn record_fallback(field: PricedField, parsed: &ParsedCount, fallbacks: &mut Vec<PricingFallback>) {
    if let ParsedCount::FallbackUsed { value, original } = parsed {
        tracing::warn!(
            ?field,
            original = %original,
            used = value,
            "Unreadable pricing input, falling back to default count"
        );
        fallbacks.push(PricingFallback {
            field,
            original: original.clone(),
            used: *value,
        });
    }
}

/// Deterministic trip estimate.
///
/// `base = days * group_size * base_price_per_day`,
/// `guide = days * guide_price_per_day` (the guide fee does not scale with the group),
/// `grand_total = base + guide`.
pub fn estimate(
    duration: &str,
    group_size: &str,
    base_price_per_day: Decimal,
    guide_price_per_day: Decimal,
) -> PricingBreakdown {
    let parsed_days = parse_days(duration);
    let parsed_group = parse_group_size(group_size);

    let mut fallbacks = Vec::new();
    record_fallback(PricedField::Days, &parsed_days, &mut fallbacks);
    record_fallback(PricedField::GroupSize, &parsed_group, &mut fallbacks);

    let days = parsed_days.value();
    let group = parsed_group.value();

    let base_price_total = Decimal::from(days) * Decimal::from(group) * base_price_per_day;
    let guide_price_total = Decimal::from(days) * guide_price_per_day;

    PricingBreakdown {
        days,
        group_size: group,
        base_price_per_day,
        guide_price_per_day,
        base_price_total,
        guide_price_total,
        grand_total: base_price_total + guide_price_total,
        fallbacks,
    }
}

/// Estimates with configured rates.
#[derive(Debug, Clone)]
pub struct PricingCalculator {
    config: PricingConfig,
}

impl PricingCalculator {
    pub fn new(config: PricingConfig) -> Result<Self, PricingError> {
        if config.base_price_per_day.is_sign_negative() {
            return Err(PricingError::NegativeRate {
                name: "base_price_per_day",
                value: config.base_price_per_day,
            });
        }
        if config.guide_price_per_day.is_sign_negative() {
            return Err(PricingError::NegativeRate {
                name: "guide_price_per_day",
                value: config.guide_price_per_day,
            });
        }
        Ok(Self { config })
    }

    pub fn estimate(&self, duration: &str, group_size: &str) -> PricingBreakdown {
        estimate(
            duration,
            group_size,
            self.config.base_price_per_day,
            self.config.guide_price_per_day,
        )
    }

    pub fn currency(&self) -> &CurrencyCode {
        &self.config.currency
    }
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self {
            config: PricingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_estimate_five_days_three_travelers() {
        let breakdown = estimate("5 days", "3", dec!(150), dec!(50));

        assert_eq!(breakdown.days, 5);
        assert_eq!(breakdown.group_size, 3);
        assert_eq!(breakdown.base_price_total, dec!(2250));
        assert_eq!(breakdown.guide_price_total, dec!(250));
        assert_eq!(breakdown.grand_total, dec!(2500));
        assert!(!breakdown.used_fallback());
    }

    #[test]
    fn test_estimate_unreadable_duration_prices_one_day() {
        let breakdown = estimate("", "2", dec!(150), dec!(50));

        assert_eq!(breakdown.days, 1);
        assert_eq!(breakdown.grand_total, dec!(350));
        assert_eq!(
            breakdown.fallbacks,
            vec![PricingFallback {
                field: PricedField::Days,
                original: String::new(),
                used: 1,
            }]
        );
    }

    #[test]
    fn test_guide_fee_does_not_scale_with_group() {
        let solo = estimate("4 days", "1", dec!(100), dec!(40));
        let group = estimate("4 days", "6", dec!(100), dec!(40));
        assert_eq!(solo.guide_price_total, group.guide_price_total);
        assert_eq!(group.base_price_total, dec!(2400));
    }

    #[test]
    fn test_calculator_uses_configured_rates() {
        let calculator = PricingCalculator::new(PricingConfig {
            base_price_per_day: dec!(99.50),
            guide_price_per_day: dec!(0),
            currency: CurrencyCode::new("EUR").unwrap(),
        })
        .unwrap();

        let breakdown = calculator.estimate("2 days", "2");
        assert_eq!(breakdown.grand_total, dec!(398.00));
        assert_eq!(calculator.currency().as_str(), "EUR");
    }

    #[test]
    fn test_calculator_rejects_negative_rates() {
        let result = PricingCalculator::new(PricingConfig {
            guide_price_per_day: dec!(-1),
            ..PricingConfig::default()
        });
        assert!(matches!(
            result,
            Err(PricingError::NegativeRate { name: "guide_price_per_day", .. })
        ));
    }

    #[test]
    fn test_config_defaults_from_partial_input() {
        let config: PricingConfig = serde_json::from_str(r#"{"base_price_per_day": "200"}"#).unwrap();
        assert_eq!(config.base_price_per_day, dec!(200));
        assert_eq!(config.guide_price_per_day, dec!(50));
        assert_eq!(config.currency.as_str(), "USD");
    }
}
