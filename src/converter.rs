// src/converter.rs
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::{Blockchain, RawBalance};

/// Fixed unit scale and illustrative USD price for a ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Denomination {
    pub decimals: u32, // raw units per main unit = 10^decimals
    pub usd_price: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertedBalance {
    pub main_unit_amount: Decimal,
    pub estimated_value_usd: Decimal,
}

impl Blockchain {
    /// `None` for unsupported ledgers
    pub fn denomination(&self) -> Option<Denomination> {
        let (decimals, usd_price) = match self {
            Blockchain::Bitcoin => (8, Decimal::from(45_000)),
            Blockchain::Ethereum => (18, Decimal::from(3_000)),
            Blockchain::Dogecoin => (8, Decimal::new(8, 2)),
            Blockchain::Litecoin => (8, Decimal::from(100)),
            Blockchain::BitcoinCash => (8, Decimal::from(400)),
            Blockchain::Unsupported(_) => return None,
        };
        Some(Denomination { decimals, usd_price })
    }
}

/// Convert a raw balance to main units and a USD estimate.
///
/// Unsupported ledgers keep the raw amount and are valued at zero.
pub fn convert(blockchain: &Blockchain, raw: RawBalance) -> ConvertedBalance {
    let Some(denom) = blockchain.denomination() else {
        return ConvertedBalance {
            main_unit_amount: saturating_decimal(raw, 0),
            estimated_value_usd: Decimal::ZERO,
        };
    };

    let main_unit_amount = saturating_decimal(raw, denom.decimals);
    let estimated_value_usd = main_unit_amount
        .checked_mul(denom.usd_price)
        .unwrap_or(Decimal::MAX);

    ConvertedBalance {
        main_unit_amount,
        estimated_value_usd,
    }
}

/// Round a USD figure to cents, halves away from zero
pub fn round_usd(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// raw / 10^scale without going through floats; clamps past Decimal's 96-bit range
fn saturating_decimal(raw: RawBalance, scale: u32) -> Decimal {
    if let Ok(value) = i128::try_from(raw) {
        if let Ok(exact) = Decimal::try_from_i128_with_scale(value, scale) {
            return exact.normalize();
        }
    }

    let divisor = 10u128.pow(scale);
    let whole = Decimal::from_u128(raw / divisor);
    let frac = Decimal::try_from_i128_with_scale((raw % divisor) as i128, scale).ok();
    match (whole, frac) {
        (Some(whole), Some(frac)) => whole
            .checked_add(frac)
            .map(|sum| sum.normalize())
            .unwrap_or(Decimal::MAX),
        _ => Decimal::MAX,
    }
}
