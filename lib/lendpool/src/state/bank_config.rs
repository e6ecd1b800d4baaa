use anchor_lang::prelude::Pubkey;
use fixed::types::I80F48;
use tracing::warn;

use crate::constants::*;
use crate::error::{CheckedOrErr, LendpoolError, Result};
use crate::i80f48::WrappedI80F48;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RiskTier {
    Collateral = 0,
    /// Can't be used as collateral for borrows in other banks.
    Isolated = 1,
}

impl TryFrom<u8> for RiskTier {
    type Error = LendpoolError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(RiskTier::Collateral),
            1 => Ok(RiskTier::Isolated),
            _ => Err(LendpoolError::InvalidRiskTier(tag)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OperationalState {
    Paused = 0,
    Operational = 1,
    ReduceOnly = 2,
}

impl TryFrom<u8> for OperationalState {
    type Error = LendpoolError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(OperationalState::Paused),
            1 => Ok(OperationalState::Operational),
            2 => Ok(OperationalState::ReduceOnly),
            _ => Err(LendpoolError::InvalidOperationalState(tag)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OracleSetup {
    None = 0,
    PythLegacy = 1,
    SwitchboardV2 = 2,
    PythPushOracle = 3,
    SwitchboardPull = 4,
    StakedWithPythPush = 5,
}

impl OracleSetup {
    /// Unknown tags map to `None`: new oracle kinds get added on-chain before
    /// clients learn about them, and such a bank should still load.
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            0 => OracleSetup::None,
            1 => OracleSetup::PythLegacy,
            2 => OracleSetup::SwitchboardV2,
            3 => OracleSetup::PythPushOracle,
            4 => OracleSetup::SwitchboardPull,
            5 => OracleSetup::StakedWithPythPush,
            _ => {
                warn!(tag, "unknown oracle setup, treating as none");
                OracleSetup::None
            }
        }
    }
}

/// Decides which oracle binding strategy and which other assets a bank's token
/// may be mixed with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetTag {
    Default,
    Sol,
    Staked,
    /// A tag added on-chain after this client was built. Kept as is so the
    /// bank still loads and re-encodes unchanged.
    Unknown(u8),
}

impl AssetTag {
    pub fn from_tag(tag: u8) -> Self {
        match tag {
            ASSET_TAG_DEFAULT => AssetTag::Default,
            ASSET_TAG_SOL => AssetTag::Sol,
            ASSET_TAG_STAKED => AssetTag::Staked,
            _ => {
                warn!(tag, "unknown asset tag");
                AssetTag::Unknown(tag)
            }
        }
    }

    pub fn tag(self) -> u8 {
        match self {
            AssetTag::Default => ASSET_TAG_DEFAULT,
            AssetTag::Sol => ASSET_TAG_SOL,
            AssetTag::Staked => ASSET_TAG_STAKED,
            AssetTag::Unknown(tag) => tag,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterestRateConfigRaw {
    // curve
    pub optimal_utilization_rate: WrappedI80F48,
    pub plateau_interest_rate: WrappedI80F48,
    pub max_interest_rate: WrappedI80F48,

    // fees
    pub insurance_fee_fixed_apr: WrappedI80F48,
    pub insurance_ir_fee: WrappedI80F48,
    pub protocol_fixed_fee_apr: WrappedI80F48,
    pub protocol_ir_fee: WrappedI80F48,
    pub protocol_origination_fee: WrappedI80F48,
}

/// Parameters of the kinked utilization curve and the fees stacked on top.
///
/// All rates are APRs, e.g. 0.1 for 10% per year.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InterestRateConfig {
    pub optimal_utilization_rate: I80F48,
    pub plateau_interest_rate: I80F48,
    pub max_interest_rate: I80F48,

    pub insurance_fee_fixed_apr: I80F48,
    pub insurance_ir_fee: I80F48,
    pub protocol_fixed_fee_apr: I80F48,
    pub protocol_ir_fee: I80F48,
    /// Charged once on new borrows. Not part of the rate curve.
    pub protocol_origination_fee: I80F48,
}

impl From<&InterestRateConfigRaw> for InterestRateConfig {
    fn from(raw: &InterestRateConfigRaw) -> Self {
        Self {
            optimal_utilization_rate: raw.optimal_utilization_rate.into(),
            plateau_interest_rate: raw.plateau_interest_rate.into(),
            max_interest_rate: raw.max_interest_rate.into(),
            insurance_fee_fixed_apr: raw.insurance_fee_fixed_apr.into(),
            insurance_ir_fee: raw.insurance_ir_fee.into(),
            protocol_fixed_fee_apr: raw.protocol_fixed_fee_apr.into(),
            protocol_ir_fee: raw.protocol_ir_fee.into(),
            protocol_origination_fee: raw.protocol_origination_fee.into(),
        }
    }
}

impl InterestRateConfig {
    /// Sum of the fees proportional to the base rate.
    pub fn ir_fees(&self) -> I80F48 {
        self.insurance_ir_fee + self.protocol_ir_fee
    }

    /// Sum of the fees added as flat APR.
    pub fn fixed_fees(&self) -> I80F48 {
        self.insurance_fee_fixed_apr + self.protocol_fixed_fee_apr
    }

    /// Rate before fees, from the two-segment utilization curve.
    ///
    /// Linear from 0 to `plateau_interest_rate` at optimal utilization, then
    /// linear up to `max_interest_rate` at full utilization.
    pub fn base_rate(&self, utilization: I80F48) -> Result<I80F48> {
        if utilization <= self.optimal_utilization_rate {
            self.base_rate_below_optimal(utilization)
        } else {
            self.base_rate_above_optimal(utilization)
        }
    }

    fn base_rate_below_optimal(&self, utilization: I80F48) -> Result<I80F48> {
        if utilization.is_zero() {
            return Ok(I80F48::ZERO);
        }
        utilization
            .checked_mul(self.plateau_interest_rate)
            .and_then(|v| v.checked_div(self.optimal_utilization_rate))
            .or_math_err("base rate below optimal")
    }

    fn base_rate_above_optimal(&self, utilization: I80F48) -> Result<I80F48> {
        let optimal = self.optimal_utilization_rate;
        let span = self.max_interest_rate - self.plateau_interest_rate;
        (utilization - optimal)
            .checked_div(I80F48::ONE - optimal)
            .and_then(|v| v.checked_mul(span))
            .and_then(|v| v.checked_add(self.plateau_interest_rate))
            .or_math_err("base rate above optimal")
    }
}

/// Bank config as decoded from the account, enums still as tags.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BankConfigRaw {
    pub asset_weight_init: WrappedI80F48,
    pub asset_weight_maint: WrappedI80F48,

    pub liability_weight_init: WrappedI80F48,
    pub liability_weight_maint: WrappedI80F48,

    pub deposit_limit: u64,
    pub borrow_limit: u64,
    pub risk_tier: u8,
    /// In ui USD, e.g. 100 for $100. Zero disables the limit.
    pub total_asset_value_init_limit: u64,
    pub oracle_max_age: u16,
    pub asset_tag: u8,

    pub interest_rate_config: InterestRateConfigRaw,
    pub operational_state: u8,

    pub oracle_setup: u8,
    pub oracle_keys: [Pubkey; MAX_ORACLE_KEYS],

    pub permissionless_bad_debt_settlement: bool,
    pub freeze_settings: bool,
}

/// Risk and operational parameters of a bank.
///
/// Built once from a `BankConfigRaw` and never edited; a config change
/// on-chain means building a new `Bank`.
#[derive(Clone, Debug, PartialEq)]
pub struct BankConfig {
    pub asset_weight_init: I80F48,
    pub asset_weight_maint: I80F48,

    pub liability_weight_init: I80F48,
    pub liability_weight_maint: I80F48,

    /// native
    pub deposit_limit: I80F48,
    /// native
    pub borrow_limit: I80F48,

    pub risk_tier: RiskTier,
    /// ui USD, zero means no soft limit
    pub total_asset_value_init_limit: I80F48,
    pub asset_tag: AssetTag,

    pub interest_rate_config: InterestRateConfig,
    pub operational_state: OperationalState,

    pub oracle_setup: OracleSetup,
    pub oracle_keys: Vec<Pubkey>,
    /// seconds
    pub oracle_max_age: u16,

    pub permissionless_bad_debt_settlement: bool,
    pub freeze_settings: bool,
}

impl BankConfig {
    pub fn from_raw(raw: &BankConfigRaw) -> Result<Self> {
        let oracle_max_age = if raw.oracle_max_age == 0 {
            DEFAULT_ORACLE_MAX_AGE
        } else {
            raw.oracle_max_age
        };

        Ok(Self {
            asset_weight_init: raw.asset_weight_init.into(),
            asset_weight_maint: raw.asset_weight_maint.into(),
            liability_weight_init: raw.liability_weight_init.into(),
            liability_weight_maint: raw.liability_weight_maint.into(),
            deposit_limit: I80F48::from(raw.deposit_limit),
            borrow_limit: I80F48::from(raw.borrow_limit),
            risk_tier: RiskTier::try_from(raw.risk_tier)?,
            total_asset_value_init_limit: I80F48::from(raw.total_asset_value_init_limit),
            asset_tag: AssetTag::from_tag(raw.asset_tag),
            interest_rate_config: (&raw.interest_rate_config).into(),
            operational_state: OperationalState::try_from(raw.operational_state)?,
            oracle_setup: OracleSetup::from_tag(raw.oracle_setup),
            oracle_keys: raw.oracle_keys.to_vec(),
            oracle_max_age,
            permissionless_bad_debt_settlement: raw.permissionless_bad_debt_settlement,
            freeze_settings: raw.freeze_settings,
        })
    }

    pub fn is_soft_limit_disabled(&self) -> bool {
        self.total_asset_value_init_limit.is_zero()
    }
}
