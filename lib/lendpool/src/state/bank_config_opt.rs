use anchor_lang::prelude::*;
use fixed::types::I80F48;

use super::{AssetTag, OperationalState, OracleSetup, RiskTier};
use crate::constants::{ASSET_TAG_DEFAULT, MAX_ORACLE_KEYS};
use crate::error::{LendpoolError, Result};
use crate::i80f48::WrappedI80F48;

/// A partial bank config update. `None` leaves the field unchanged.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BankConfigOpt {
    pub asset_weight_init: Option<I80F48>,
    pub asset_weight_maint: Option<I80F48>,

    pub liability_weight_init: Option<I80F48>,
    pub liability_weight_maint: Option<I80F48>,

    pub deposit_limit: Option<u64>,
    pub borrow_limit: Option<u64>,
    pub risk_tier: Option<RiskTier>,
    pub total_asset_value_init_limit: Option<u64>,
    /// `Some(AssetTag::Default)` and `None` encode the same way
    pub asset_tag: Option<AssetTag>,

    pub interest_rate_config: Option<InterestRateConfigOpt>,
    pub operational_state: Option<OperationalState>,

    pub oracle: Option<OracleConfigOpt>,

    pub oracle_max_age: Option<u16>,
    pub permissionless_bad_debt_settlement: Option<bool>,
    pub freeze_settings: Option<bool>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InterestRateConfigOpt {
    pub optimal_utilization_rate: Option<I80F48>,
    pub plateau_interest_rate: Option<I80F48>,
    pub max_interest_rate: Option<I80F48>,

    pub insurance_fee_fixed_apr: Option<I80F48>,
    pub insurance_ir_fee: Option<I80F48>,
    pub protocol_fixed_fee_apr: Option<I80F48>,
    pub protocol_ir_fee: Option<I80F48>,
    pub protocol_origination_fee: Option<I80F48>,
}

/// Replaces the oracle setup and all its keys at once.
#[derive(Clone, Debug, PartialEq)]
pub struct OracleConfigOpt {
    pub setup: OracleSetup,
    pub keys: Vec<Pubkey>,
}

/// Instruction argument layout of `BankConfigOpt`.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct BankConfigOptRaw {
    pub asset_weight_init: Option<WrappedI80F48>,
    pub asset_weight_maint: Option<WrappedI80F48>,

    pub liability_weight_init: Option<WrappedI80F48>,
    pub liability_weight_maint: Option<WrappedI80F48>,

    pub deposit_limit: Option<u64>,
    pub borrow_limit: Option<u64>,
    pub risk_tier: Option<u8>,
    pub asset_tag: Option<u8>,
    pub total_asset_value_init_limit: Option<u64>,

    pub interest_rate_config: Option<InterestRateConfigOptRaw>,
    pub operational_state: Option<u8>,

    pub oracle: Option<OracleConfigOptRaw>,

    pub oracle_max_age: Option<u16>,
    pub permissionless_bad_debt_settlement: Option<bool>,
    pub freeze_settings: Option<bool>,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterestRateConfigOptRaw {
    pub optimal_utilization_rate: Option<WrappedI80F48>,
    pub plateau_interest_rate: Option<WrappedI80F48>,
    pub max_interest_rate: Option<WrappedI80F48>,

    pub insurance_fee_fixed_apr: Option<WrappedI80F48>,
    pub insurance_ir_fee: Option<WrappedI80F48>,
    pub protocol_fixed_fee_apr: Option<WrappedI80F48>,
    pub protocol_ir_fee: Option<WrappedI80F48>,
    /// Part of the instruction layout, though most tooling leaves it unset
    /// and sends `None`.
    pub protocol_origination_fee: Option<WrappedI80F48>,
}

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct OracleConfigOptRaw {
    pub setup: u8,
    pub keys: Vec<Pubkey>,
}

fn to_wrapped(v: Option<I80F48>) -> Option<WrappedI80F48> {
    v.map(WrappedI80F48::from)
}

fn from_wrapped(v: Option<WrappedI80F48>) -> Option<I80F48> {
    v.map(I80F48::from)
}

impl InterestRateConfigOpt {
    pub fn to_raw(&self) -> InterestRateConfigOptRaw {
        InterestRateConfigOptRaw {
            optimal_utilization_rate: to_wrapped(self.optimal_utilization_rate),
            plateau_interest_rate: to_wrapped(self.plateau_interest_rate),
            max_interest_rate: to_wrapped(self.max_interest_rate),
            insurance_fee_fixed_apr: to_wrapped(self.insurance_fee_fixed_apr),
            insurance_ir_fee: to_wrapped(self.insurance_ir_fee),
            protocol_fixed_fee_apr: to_wrapped(self.protocol_fixed_fee_apr),
            protocol_ir_fee: to_wrapped(self.protocol_ir_fee),
            protocol_origination_fee: to_wrapped(self.protocol_origination_fee),
        }
    }

    pub fn from_raw(raw: &InterestRateConfigOptRaw) -> Self {
        Self {
            optimal_utilization_rate: from_wrapped(raw.optimal_utilization_rate),
            plateau_interest_rate: from_wrapped(raw.plateau_interest_rate),
            max_interest_rate: from_wrapped(raw.max_interest_rate),
            insurance_fee_fixed_apr: from_wrapped(raw.insurance_fee_fixed_apr),
            insurance_ir_fee: from_wrapped(raw.insurance_ir_fee),
            protocol_fixed_fee_apr: from_wrapped(raw.protocol_fixed_fee_apr),
            protocol_ir_fee: from_wrapped(raw.protocol_ir_fee),
            protocol_origination_fee: from_wrapped(raw.protocol_origination_fee),
        }
    }
}

impl BankConfigOpt {
    pub fn to_raw(&self) -> Result<BankConfigOptRaw> {
        let oracle = match &self.oracle {
            Some(oracle) => {
                if oracle.keys.len() > MAX_ORACLE_KEYS {
                    return Err(LendpoolError::TooManyOracleKeys(oracle.keys.len()));
                }
                Some(OracleConfigOptRaw {
                    setup: oracle.setup as u8,
                    keys: oracle.keys.clone(),
                })
            }
            None => None,
        };

        Ok(BankConfigOptRaw {
            asset_weight_init: to_wrapped(self.asset_weight_init),
            asset_weight_maint: to_wrapped(self.asset_weight_maint),
            liability_weight_init: to_wrapped(self.liability_weight_init),
            liability_weight_maint: to_wrapped(self.liability_weight_maint),
            deposit_limit: self.deposit_limit,
            borrow_limit: self.borrow_limit,
            risk_tier: self.risk_tier.map(|t| t as u8),
            // absent is written as the default tag
            asset_tag: Some(self.asset_tag.map_or(ASSET_TAG_DEFAULT, AssetTag::tag)),
            total_asset_value_init_limit: self.total_asset_value_init_limit,
            interest_rate_config: self.interest_rate_config.as_ref().map(|irc| irc.to_raw()),
            operational_state: self.operational_state.map(|s| s as u8),
            oracle,
            oracle_max_age: self.oracle_max_age,
            permissionless_bad_debt_settlement: self.permissionless_bad_debt_settlement,
            freeze_settings: self.freeze_settings,
        })
    }

    pub fn from_raw(raw: &BankConfigOptRaw) -> Result<Self> {
        let asset_tag = match raw.asset_tag {
            None | Some(ASSET_TAG_DEFAULT) => None,
            Some(tag) => Some(AssetTag::from_tag(tag)),
        };
        let oracle = match &raw.oracle {
            Some(oracle) => {
                if oracle.keys.len() > MAX_ORACLE_KEYS {
                    return Err(LendpoolError::TooManyOracleKeys(oracle.keys.len()));
                }
                Some(OracleConfigOpt {
                    setup: OracleSetup::from_tag(oracle.setup),
                    keys: oracle.keys.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            asset_weight_init: from_wrapped(raw.asset_weight_init),
            asset_weight_maint: from_wrapped(raw.asset_weight_maint),
            liability_weight_init: from_wrapped(raw.liability_weight_init),
            liability_weight_maint: from_wrapped(raw.liability_weight_maint),
            deposit_limit: raw.deposit_limit,
            borrow_limit: raw.borrow_limit,
            risk_tier: raw.risk_tier.map(RiskTier::try_from).transpose()?,
            total_asset_value_init_limit: raw.total_asset_value_init_limit,
            asset_tag,
            interest_rate_config: raw
                .interest_rate_config
                .as_ref()
                .map(InterestRateConfigOpt::from_raw),
            operational_state: raw
                .operational_state
                .map(OperationalState::try_from)
                .transpose()?,
            oracle,
            oracle_max_age: raw.oracle_max_age,
            permissionless_bad_debt_settlement: raw.permissionless_bad_debt_settlement,
            freeze_settings: raw.freeze_settings,
        })
    }

    /// Borsh encoding of the raw layout, as passed to the config instruction.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let raw = self.to_raw()?;
        raw.try_to_vec()
            .map_err(|e| LendpoolError::ConfigOptEncoding(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw = BankConfigOptRaw::try_from_slice(bytes)
            .map_err(|e| LendpoolError::ConfigOptEncoding(e.to_string()))?;
        Self::from_raw(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposit_limit_only() {
        let opt = BankConfigOpt {
            deposit_limit: Some(1_000),
            ..BankConfigOpt::default()
        };
        let raw = opt.to_raw().unwrap();
        assert_eq!(raw.deposit_limit, Some(1_000));
        assert_eq!(raw.borrow_limit, None);
        assert_eq!(raw.asset_weight_init, None);
        assert_eq!(raw.interest_rate_config, None);
        assert_eq!(raw.oracle, None);

        let decoded = BankConfigOpt::from_bytes(&opt.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, opt);
    }

    #[test]
    fn zero_is_not_absent() {
        let opt = BankConfigOpt {
            asset_weight_init: Some(I80F48::ZERO),
            borrow_limit: Some(0),
            total_asset_value_init_limit: Some(0),
            oracle_max_age: Some(0),
            freeze_settings: Some(false),
            interest_rate_config: Some(InterestRateConfigOpt {
                protocol_ir_fee: Some(I80F48::ZERO),
                ..InterestRateConfigOpt::default()
            }),
            ..BankConfigOpt::default()
        };
        let raw = opt.to_raw().unwrap();
        assert_eq!(raw.asset_weight_init, Some(WrappedI80F48::default()));
        assert_eq!(raw.borrow_limit, Some(0));
        assert_eq!(raw.oracle_max_age, Some(0));
        assert_eq!(raw.freeze_settings, Some(false));

        let decoded = BankConfigOpt::from_bytes(&opt.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, opt);
    }

    #[test]
    fn asset_tag_default_collapses_to_absent() {
        let absent = BankConfigOpt::default();
        let explicit = BankConfigOpt {
            asset_tag: Some(AssetTag::Default),
            ..BankConfigOpt::default()
        };
        assert_eq!(absent.to_raw().unwrap().asset_tag, Some(ASSET_TAG_DEFAULT));
        assert_eq!(absent.to_bytes().unwrap(), explicit.to_bytes().unwrap());

        let decoded = BankConfigOpt::from_bytes(&explicit.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.asset_tag, None);

        let staked = BankConfigOpt {
            asset_tag: Some(AssetTag::Staked),
            ..BankConfigOpt::default()
        };
        let decoded = BankConfigOpt::from_bytes(&staked.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.asset_tag, Some(AssetTag::Staked));
    }

    #[test]
    fn enums_and_oracle() {
        let keys = vec![Pubkey::new_unique(), Pubkey::new_unique()];
        let opt = BankConfigOpt {
            risk_tier: Some(RiskTier::Isolated),
            operational_state: Some(OperationalState::ReduceOnly),
            oracle: Some(OracleConfigOpt {
                setup: OracleSetup::SwitchboardPull,
                keys: keys.clone(),
            }),
            ..BankConfigOpt::default()
        };
        let raw = opt.to_raw().unwrap();
        assert_eq!(raw.risk_tier, Some(1));
        assert_eq!(raw.operational_state, Some(2));
        assert_eq!(
            raw.oracle,
            Some(OracleConfigOptRaw {
                setup: 4,
                keys: keys.clone()
            })
        );
        assert_eq!(BankConfigOpt::from_raw(&raw).unwrap(), opt);
    }

    #[test]
    fn invalid_raw() {
        let raw = BankConfigOptRaw {
            risk_tier: Some(5),
            ..BankConfigOptRaw::default()
        };
        assert_eq!(
            BankConfigOpt::from_raw(&raw),
            Err(LendpoolError::InvalidRiskTier(5))
        );

        let raw = BankConfigOptRaw {
            asset_tag: Some(9),
            ..BankConfigOptRaw::default()
        };
        let opt = BankConfigOpt::from_raw(&raw).unwrap();
        assert_eq!(opt.asset_tag, Some(AssetTag::Unknown(9)));
        assert_eq!(opt.to_raw().unwrap(), raw);

        let raw = BankConfigOptRaw {
            oracle: Some(OracleConfigOptRaw {
                setup: 42,
                keys: vec![],
            }),
            ..BankConfigOptRaw::default()
        };
        let opt = BankConfigOpt::from_raw(&raw).unwrap();
        assert_eq!(opt.oracle.unwrap().setup, OracleSetup::None);

        let opt = BankConfigOpt {
            oracle: Some(OracleConfigOpt {
                setup: OracleSetup::PythLegacy,
                keys: vec![Pubkey::default(); MAX_ORACLE_KEYS + 1],
            }),
            ..BankConfigOpt::default()
        };
        assert_eq!(
            opt.to_raw(),
            Err(LendpoolError::TooManyOracleKeys(MAX_ORACLE_KEYS + 1))
        );
    }
}
