use {
    super::error::PipelineError,
    rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive},
    serde::{Deserialize, Serialize},
    std::fmt,
    std::ops::{Add, Sub},
    std::str::FromStr,
};

/// Decimal places of a minor unit (kopecks, cents).
const MINOR_SCALE: u32 = 2;
/// Decimal places of a commission rate (basis points).
const RATE_SCALE: u32 = 4;

/// Amount in minor currency units (kopecks, cents). Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);

    pub fn new(minor: i64) -> Result<Self, PipelineError> {
        if minor < 0 {
            return Err(PipelineError::Validation(format!(
                "MoneyAmount cannot be negative, got: {minor}"
            )));
        }
        Ok(Self(minor))
    }

    pub fn minor(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn checked_sub(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0
            .checked_sub(other.0)
            .filter(|&v| v >= 0)
            .map(MoneyAmount)
    }

    pub fn checked_mul(self, quantity: u32) -> Option<MoneyAmount> {
        self.0.checked_mul(i64::from(quantity)).map(MoneyAmount)
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, MINOR_SCALE)
    }

    /// Provider wire format: `"15.00"`.
    pub fn to_decimal_string(&self) -> String {
        self.to_decimal().to_string()
    }

    /// Major units with at most two decimal places, e.g. `15.5` → 1550.
    pub fn from_decimal(value: Decimal) -> Result<Self, PipelineError> {
        if value.is_sign_negative() || value.normalize().scale() > MINOR_SCALE {
            return Err(PipelineError::Validation(format!(
                "amount must be non-negative with at most {MINOR_SCALE} decimal places, got {value}"
            )));
        }
        let mut minor = value;
        minor.rescale(MINOR_SCALE);
        i64::try_from(minor.mantissa())
            .map(Self)
            .map_err(|_| PipelineError::Validation(format!("amount out of range: {value}")))
    }

    /// Parses `"15"`, `"15.5"` or `"15.00"` into minor units.
    pub fn from_decimal_str(value: &str) -> Result<Self, PipelineError> {
        let decimal = Decimal::from_str(value.trim())
            .map_err(|e| PipelineError::Validation(format!("invalid decimal amount {value}: {e}")))?;
        Self::from_decimal(decimal)
    }
}

impl TryFrom<i64> for MoneyAmount {
    type Error = PipelineError;

    fn try_from(minor: i64) -> Result<Self, Self::Error> {
        Self::new(minor)
    }
}

impl Add for MoneyAmount {
    type Output = MoneyAmount;

    fn add(self, rhs: MoneyAmount) -> MoneyAmount {
        self.checked_add(rhs).expect("MoneyAmount overflow")
    }
}

impl Sub for MoneyAmount {
    type Output = MoneyAmount;

    fn sub(self, rhs: MoneyAmount) -> MoneyAmount {
        self.checked_sub(rhs).expect("MoneyAmount underflow")
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Rub,
    Usd,
    Eur,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rub => "RUB",
            Self::Usd => "USD",
            Self::Eur => "EUR",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for Currency {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_ascii_uppercase().as_str() {
            "RUB" => Ok(Self::Rub),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            other => Err(PipelineError::Validation(format!(
                "unknown currency: {other}"
            ))),
        }
    }
}

/// Commission rate in basis points, `0..=10_000` (0% to 100%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommissionRate(u32);

impl CommissionRate {
    pub const MAX_BPS: u32 = 10_000;

    pub fn from_bps(bps: u32) -> Result<Self, PipelineError> {
        if bps > Self::MAX_BPS {
            return Err(PipelineError::Validation(format!(
                "commission rate must be within [0, 1], got {bps} bps"
            )));
        }
        Ok(Self(bps))
    }

    /// Fraction in `[0, 1]` with at most four decimal places.
    pub fn from_decimal(value: Decimal) -> Result<Self, PipelineError> {
        if value.is_sign_negative() || value > Decimal::ONE || value.normalize().scale() > RATE_SCALE {
            return Err(PipelineError::Validation(format!(
                "commission rate must be within [0, 1] with at most {RATE_SCALE} decimal places, got {value}"
            )));
        }
        let bps = (value * Decimal::from(Self::MAX_BPS))
            .to_u32()
            .ok_or_else(|| PipelineError::Validation(format!("invalid commission rate: {value}")))?;
        Self::from_bps(bps)
    }

    /// Parses a decimal fraction such as `"0.10"` or `"0.0725"`.
    pub fn from_decimal_str(value: &str) -> Result<Self, PipelineError> {
        let decimal = Decimal::from_str(value.trim()).map_err(|e| {
            PipelineError::Validation(format!("invalid commission rate {value}: {e}"))
        })?;
        Self::from_decimal(decimal)
    }

    pub fn bps(&self) -> u32 {
        self.0
    }

    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(i64::from(self.0), RATE_SCALE)
    }

    /// `amount × rate` rounded half-up to a whole minor unit.
    pub fn fee_for(&self, amount: MoneyAmount) -> MoneyAmount {
        let fee = (Decimal::from(amount.minor()) * self.to_decimal())
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        // rate <= 1, so the fee never exceeds the amount and fits in i64.
        MoneyAmount(fee.to_i64().unwrap_or(amount.minor()))
    }
}

impl fmt::Display for CommissionRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}
