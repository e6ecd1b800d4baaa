use std::collections::HashMap;

use anchor_lang::prelude::Pubkey;
use fixed::types::I80F48;
use serde::{Deserialize, Serialize};

use super::{BankConfig, OracleSetup};
use crate::error::{LendpoolError, Result};

/// One view of an oracle price: the midpoint and the confidence band around it.
///
/// All values are USD per whole token (not per native unit).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceWithConfidence {
    pub price: I80F48,
    pub confidence: I80F48,
    pub lowest_price: I80F48,
    pub highest_price: I80F48,
}

impl PriceWithConfidence {
    /// Band of `price ± confidence`.
    pub fn new(price: I80F48, confidence: I80F48) -> Self {
        Self {
            price,
            confidence,
            lowest_price: price - confidence,
            highest_price: price + confidence,
        }
    }
}

/// Price information for a bank's token, as aggregated by the price service.
///
/// `price_weighted` is the time-weighted variant, used for margin requirements
/// that want a price that is harder to move.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OraclePrice {
    pub price_realtime: PriceWithConfidence,
    pub price_weighted: PriceWithConfidence,
}

impl OraclePrice {
    // intended for tests
    pub fn new_single_price(price: I80F48) -> Self {
        let p = PriceWithConfidence::new(price, I80F48::ZERO);
        Self {
            price_realtime: p,
            price_weighted: p,
        }
    }

    pub fn with_confidence(&self, weighted: bool) -> &PriceWithConfidence {
        if weighted {
            &self.price_weighted
        } else {
            &self.price_realtime
        }
    }
}

/// Which end of the confidence band to value at.
///
/// Assets are usually valued at `Lowest` and liabilities at `Highest`, so the
/// uncertainty always works against the account and for the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceBias {
    Lowest,
    Highest,
    None,
}

/// Finds the account that carries a bank's price.
///
/// How keys are derived depends on the oracle setup and on data that lives
/// outside the bank, so it is left to the caller.
pub trait OracleKeyResolver {
    fn oracle_key(&self, config: &BankConfig) -> Result<Pubkey>;
}

/// Uses the first configured oracle key as is.
pub struct FirstOracleKey;

impl OracleKeyResolver for FirstOracleKey {
    fn oracle_key(&self, config: &BankConfig) -> Result<Pubkey> {
        Ok(config.oracle_keys.first().copied().unwrap_or_default())
    }
}

/// Pyth push banks store a feed id instead of a price account.
///
/// This maps feed ids (as stored in `oracle_keys[0]`) to price accounts. Other
/// oracle setups use their first key directly.
#[derive(Clone, Debug, Default)]
pub struct PythPushFeedIdMap {
    pub feeds: HashMap<Pubkey, Pubkey>,
}

impl OracleKeyResolver for PythPushFeedIdMap {
    fn oracle_key(&self, config: &BankConfig) -> Result<Pubkey> {
        let first = config.oracle_keys.first().copied().unwrap_or_default();
        match config.oracle_setup {
            OracleSetup::PythPushOracle | OracleSetup::StakedWithPythPush => self
                .feeds
                .get(&first)
                .copied()
                .ok_or(LendpoolError::UnknownOracleFeed(first)),
            OracleSetup::None
            | OracleSetup::PythLegacy
            | OracleSetup::SwitchboardV2
            | OracleSetup::SwitchboardPull => Ok(first),
        }
    }
}
