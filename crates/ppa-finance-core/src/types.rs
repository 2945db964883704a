use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Energy quantities in kWh
pub type Kwh = Decimal;

/// First and last year covered by the FX table and the tenor search.
pub const FIRST_MODEL_YEAR: u32 = 1;
pub const LAST_MODEL_YEAR: u32 = 25;

/// ISO currency code of a policy jurisdiction
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    COP,
    PEN,
    CLP,
    MXN,
    #[default]
    USD,
    CRC,
    HNL,
    GTQ,
    Other(String),
}

impl Currency {
    pub fn code(&self) -> &str {
        match self {
            Currency::COP => "COP",
            Currency::PEN => "PEN",
            Currency::CLP => "CLP",
            Currency::MXN => "MXN",
            Currency::USD => "USD",
            Currency::CRC => "CRC",
            Currency::HNL => "HNL",
            Currency::GTQ => "GTQ",
            Currency::Other(code) => code,
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_codes() {
        assert_eq!(Currency::COP.code(), "COP");
        assert_eq!(Currency::Other("BRL".into()).to_string(), "BRL");
    }

    #[test]
    fn test_envelope_carries_version() {
        let out = with_metadata("test", &serde_json::json!({}), vec![], 5, 1u32);
        assert_eq!(out.metadata.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(out.metadata.computation_time_us, 5);
        assert_eq!(out.result, 1);
    }
}
