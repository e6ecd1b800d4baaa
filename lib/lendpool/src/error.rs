use anchor_lang::prelude::Pubkey;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LendpoolError {
    #[error("invalid risk tier tag {0}")]
    InvalidRiskTier(u8),
    #[error("invalid operational state tag {0}")]
    InvalidOperationalState(u8),
    #[error("invalid margin requirement type tag {0}")]
    InvalidMarginRequirementType(u8),
    #[error("target leverage {target} needs to be greater than 1")]
    LeverageBelowOne { target: f64 },
    #[error("target leverage {target} exceeds max leverage for banks {max}")]
    LeverageExceedsMax { target: f64, max: f64 },
    #[error("no oracle feed registered for {0}")]
    UnknownOracleFeed(Pubkey),
    #[error("{0} oracle keys given, a bank holds at most {}", crate::constants::MAX_ORACLE_KEYS)]
    TooManyOracleKeys(usize),
    #[error("bank config opt encoding: {0}")]
    ConfigOptEncoding(String),
    #[error("math error: {0}")]
    MathError(&'static str),
}

pub type Result<T> = std::result::Result<T, LendpoolError>;

/// Turns the `None` of a checked fixed-point operation into a `MathError`.
pub trait CheckedOrErr<T> {
    fn or_math_err(self, what: &'static str) -> Result<T>;
}

impl<T> CheckedOrErr<T> for Option<T> {
    #[inline(always)]
    fn or_math_err(self, what: &'static str) -> Result<T> {
        self.ok_or(LendpoolError::MathError(what))
    }
}
