use std::collections::HashMap;
use std::fs;
use std::str::FromStr;

use anchor_lang::prelude::Pubkey;
use anyhow::Context;
use fixed::types::I80F48;
use serde_derive::Deserialize;

use lendpool::constants::MAX_ORACLE_KEYS;
use lendpool::state::*;

/// A bank as stored in a snapshot file, together with the price to value it at.
///
/// Decimal values are strings so they reach I80F48 without a float detour.
#[derive(Clone, Debug, Deserialize)]
pub struct BankSnapshot {
    pub address: String,
    pub symbol: Option<String>,
    pub group: Option<String>,
    pub mint: String,
    pub mint_decimals: u8,

    pub asset_share_value: String,
    pub liability_share_value: String,
    pub total_asset_shares: String,
    pub total_liability_shares: String,
    #[serde(default)]
    pub collected_insurance_fees_outstanding: Option<String>,
    #[serde(default)]
    pub collected_group_fees_outstanding: Option<String>,

    pub last_update: i64,
    #[serde(default)]
    pub flags: u64,
    #[serde(default)]
    pub emissions_rate: u64,

    pub config: BankConfigSnapshot,
    pub price: PriceSnapshot,

    /// Pyth push feed id -> price account
    #[serde(default)]
    pub oracle_feeds: HashMap<String, String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BankConfigSnapshot {
    pub asset_weight_init: String,
    pub asset_weight_maint: String,
    pub liability_weight_init: String,
    pub liability_weight_maint: String,

    pub deposit_limit: u64,
    pub borrow_limit: u64,
    #[serde(default)]
    pub risk_tier: u8,
    #[serde(default)]
    pub total_asset_value_init_limit: u64,
    #[serde(default)]
    pub oracle_max_age: u16,
    #[serde(default)]
    pub asset_tag: u8,
    pub operational_state: u8,
    pub oracle_setup: u8,
    pub oracle_keys: Vec<String>,
    #[serde(default)]
    pub permissionless_bad_debt_settlement: bool,
    #[serde(default)]
    pub freeze_settings: bool,

    pub interest_rate_config: InterestRateConfigSnapshot,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InterestRateConfigSnapshot {
    pub optimal_utilization_rate: String,
    pub plateau_interest_rate: String,
    pub max_interest_rate: String,
    #[serde(default)]
    pub insurance_fee_fixed_apr: Option<String>,
    #[serde(default)]
    pub insurance_ir_fee: Option<String>,
    #[serde(default)]
    pub protocol_fixed_fee_apr: Option<String>,
    #[serde(default)]
    pub protocol_ir_fee: Option<String>,
    #[serde(default)]
    pub protocol_origination_fee: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct PriceSnapshot {
    pub realtime: String,
    #[serde(default)]
    pub realtime_confidence: Option<String>,
    pub weighted: String,
    #[serde(default)]
    pub weighted_confidence: Option<String>,
}

/// A config delta file. Missing fields stay unchanged.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct BankConfigDelta {
    pub asset_weight_init: Option<String>,
    pub asset_weight_maint: Option<String>,
    pub liability_weight_init: Option<String>,
    pub liability_weight_maint: Option<String>,
    pub deposit_limit: Option<u64>,
    pub borrow_limit: Option<u64>,
    pub risk_tier: Option<u8>,
    pub total_asset_value_init_limit: Option<u64>,
    pub asset_tag: Option<u8>,
    pub interest_rate_config: Option<InterestRateConfigDelta>,
    pub operational_state: Option<u8>,
    pub oracle: Option<OracleDelta>,
    pub oracle_max_age: Option<u16>,
    pub permissionless_bad_debt_settlement: Option<bool>,
    pub freeze_settings: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InterestRateConfigDelta {
    pub optimal_utilization_rate: Option<String>,
    pub plateau_interest_rate: Option<String>,
    pub max_interest_rate: Option<String>,
    pub insurance_fee_fixed_apr: Option<String>,
    pub insurance_ir_fee: Option<String>,
    pub protocol_fixed_fee_apr: Option<String>,
    pub protocol_ir_fee: Option<String>,
    pub protocol_origination_fee: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OracleDelta {
    pub setup: u8,
    pub keys: Vec<String>,
}

pub fn load_toml<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let contents = fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    toml::from_str(&contents).with_context(|| format!("parsing {path}"))
}

fn parse_fixed(v: &str, what: &str) -> anyhow::Result<I80F48> {
    I80F48::from_str(v.trim()).map_err(|e| anyhow::anyhow!("{what}: bad decimal {v:?}: {e}"))
}

fn parse_fixed_opt(v: &Option<String>, what: &str) -> anyhow::Result<Option<I80F48>> {
    v.as_deref().map(|v| parse_fixed(v, what)).transpose()
}

fn parse_fixed_or_zero(v: &Option<String>, what: &str) -> anyhow::Result<I80F48> {
    Ok(parse_fixed_opt(v, what)?.unwrap_or(I80F48::ZERO))
}

fn parse_pubkey(v: &str, what: &str) -> anyhow::Result<Pubkey> {
    Pubkey::from_str(v.trim()).with_context(|| format!("{what}: bad pubkey {v:?}"))
}

fn oracle_keys(keys: &[String]) -> anyhow::Result<Vec<Pubkey>> {
    if keys.len() > MAX_ORACLE_KEYS {
        anyhow::bail!(
            "{} oracle keys given, a bank holds at most {MAX_ORACLE_KEYS}",
            keys.len()
        );
    }
    keys.iter().map(|k| parse_pubkey(k, "oracle key")).collect()
}

impl BankSnapshot {
    pub fn to_raw(&self) -> anyhow::Result<BankRaw> {
        let c = &self.config;
        let irc = &c.interest_rate_config;

        let mut keys = [Pubkey::default(); MAX_ORACLE_KEYS];
        for (slot, key) in keys.iter_mut().zip(oracle_keys(&c.oracle_keys)?) {
            *slot = key;
        }

        let config = BankConfigRaw {
            asset_weight_init: parse_fixed(&c.asset_weight_init, "asset_weight_init")?.into(),
            asset_weight_maint: parse_fixed(&c.asset_weight_maint, "asset_weight_maint")?.into(),
            liability_weight_init: parse_fixed(&c.liability_weight_init, "liability_weight_init")?
                .into(),
            liability_weight_maint: parse_fixed(&c.liability_weight_maint, "liability_weight_maint")?
                .into(),
            deposit_limit: c.deposit_limit,
            borrow_limit: c.borrow_limit,
            risk_tier: c.risk_tier,
            total_asset_value_init_limit: c.total_asset_value_init_limit,
            oracle_max_age: c.oracle_max_age,
            asset_tag: c.asset_tag,
            interest_rate_config: InterestRateConfigRaw {
                optimal_utilization_rate: parse_fixed(
                    &irc.optimal_utilization_rate,
                    "optimal_utilization_rate",
                )?
                .into(),
                plateau_interest_rate: parse_fixed(&irc.plateau_interest_rate, "plateau_interest_rate")?
                    .into(),
                max_interest_rate: parse_fixed(&irc.max_interest_rate, "max_interest_rate")?.into(),
                insurance_fee_fixed_apr: parse_fixed_or_zero(
                    &irc.insurance_fee_fixed_apr,
                    "insurance_fee_fixed_apr",
                )?
                .into(),
                insurance_ir_fee: parse_fixed_or_zero(&irc.insurance_ir_fee, "insurance_ir_fee")?.into(),
                protocol_fixed_fee_apr: parse_fixed_or_zero(
                    &irc.protocol_fixed_fee_apr,
                    "protocol_fixed_fee_apr",
                )?
                .into(),
                protocol_ir_fee: parse_fixed_or_zero(&irc.protocol_ir_fee, "protocol_ir_fee")?.into(),
                protocol_origination_fee: parse_fixed_or_zero(
                    &irc.protocol_origination_fee,
                    "protocol_origination_fee",
                )?
                .into(),
            },
            operational_state: c.operational_state,
            oracle_setup: c.oracle_setup,
            oracle_keys: keys,
            permissionless_bad_debt_settlement: c.permissionless_bad_debt_settlement,
            freeze_settings: c.freeze_settings,
        };

        Ok(BankRaw {
            mint: parse_pubkey(&self.mint, "mint")?,
            mint_decimals: self.mint_decimals,
            group: self
                .group
                .as_deref()
                .map(|g| parse_pubkey(g, "group"))
                .transpose()?
                .unwrap_or_default(),
            asset_share_value: parse_fixed(&self.asset_share_value, "asset_share_value")?.into(),
            liability_share_value: parse_fixed(&self.liability_share_value, "liability_share_value")?
                .into(),
            collected_insurance_fees_outstanding: parse_fixed_or_zero(
                &self.collected_insurance_fees_outstanding,
                "collected_insurance_fees_outstanding",
            )?
            .into(),
            collected_group_fees_outstanding: parse_fixed_or_zero(
                &self.collected_group_fees_outstanding,
                "collected_group_fees_outstanding",
            )?
            .into(),
            total_asset_shares: parse_fixed(&self.total_asset_shares, "total_asset_shares")?.into(),
            total_liability_shares: parse_fixed(&self.total_liability_shares, "total_liability_shares")?
                .into(),
            last_update: self.last_update,
            config,
            flags: self.flags,
            emissions_rate: self.emissions_rate,
            ..BankRaw::default()
        })
    }

    pub fn to_bank(&self) -> anyhow::Result<Bank> {
        let address = parse_pubkey(&self.address, "address")?;
        let raw = self.to_raw()?;
        let bank = if self.oracle_feeds.is_empty() {
            Bank::from_raw(address, &raw, &FirstOracleKey, self.symbol.clone())
        } else {
            let feeds = self
                .oracle_feeds
                .iter()
                .map(|(feed, account)| {
                    Ok((parse_pubkey(feed, "oracle feed")?, parse_pubkey(account, "oracle account")?))
                })
                .collect::<anyhow::Result<HashMap<_, _>>>()?;
            Bank::from_raw(
                address,
                &raw,
                &PythPushFeedIdMap { feeds },
                self.symbol.clone(),
            )
        };
        bank.with_context(|| format!("loading bank {}", self.address))
    }

    pub fn to_price(&self) -> anyhow::Result<OraclePrice> {
        let p = &self.price;
        Ok(OraclePrice {
            price_realtime: PriceWithConfidence::new(
                parse_fixed(&p.realtime, "realtime price")?,
                parse_fixed_or_zero(&p.realtime_confidence, "realtime confidence")?,
            ),
            price_weighted: PriceWithConfidence::new(
                parse_fixed(&p.weighted, "weighted price")?,
                parse_fixed_or_zero(&p.weighted_confidence, "weighted confidence")?,
            ),
        })
    }
}

impl BankConfigDelta {
    pub fn to_opt(&self) -> anyhow::Result<BankConfigOpt> {
        let interest_rate_config = match &self.interest_rate_config {
            Some(irc) => Some(InterestRateConfigOpt {
                optimal_utilization_rate: parse_fixed_opt(
                    &irc.optimal_utilization_rate,
                    "optimal_utilization_rate",
                )?,
                plateau_interest_rate: parse_fixed_opt(
                    &irc.plateau_interest_rate,
                    "plateau_interest_rate",
                )?,
                max_interest_rate: parse_fixed_opt(&irc.max_interest_rate, "max_interest_rate")?,
                insurance_fee_fixed_apr: parse_fixed_opt(
                    &irc.insurance_fee_fixed_apr,
                    "insurance_fee_fixed_apr",
                )?,
                insurance_ir_fee: parse_fixed_opt(&irc.insurance_ir_fee, "insurance_ir_fee")?,
                protocol_fixed_fee_apr: parse_fixed_opt(
                    &irc.protocol_fixed_fee_apr,
                    "protocol_fixed_fee_apr",
                )?,
                protocol_ir_fee: parse_fixed_opt(&irc.protocol_ir_fee, "protocol_ir_fee")?,
                protocol_origination_fee: parse_fixed_opt(
                    &irc.protocol_origination_fee,
                    "protocol_origination_fee",
                )?,
            }),
            None => None,
        };
        let oracle = match &self.oracle {
            Some(oracle) => Some(OracleConfigOpt {
                setup: OracleSetup::from_tag(oracle.setup),
                keys: oracle_keys(&oracle.keys)?,
            }),
            None => None,
        };

        Ok(BankConfigOpt {
            asset_weight_init: parse_fixed_opt(&self.asset_weight_init, "asset_weight_init")?,
            asset_weight_maint: parse_fixed_opt(&self.asset_weight_maint, "asset_weight_maint")?,
            liability_weight_init: parse_fixed_opt(&self.liability_weight_init, "liability_weight_init")?,
            liability_weight_maint: parse_fixed_opt(
                &self.liability_weight_maint,
                "liability_weight_maint",
            )?,
            deposit_limit: self.deposit_limit,
            borrow_limit: self.borrow_limit,
            risk_tier: self.risk_tier.map(RiskTier::try_from).transpose()?,
            total_asset_value_init_limit: self.total_asset_value_init_limit,
            asset_tag: self.asset_tag.map(AssetTag::from_tag),
            interest_rate_config,
            operational_state: self
                .operational_state
                .map(OperationalState::try_from)
                .transpose()?,
            oracle,
            oracle_max_age: self.oracle_max_age,
            permissionless_bad_debt_settlement: self.permissionless_bad_debt_settlement,
            freeze_settings: self.freeze_settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lendpool::LendpoolError;

    const SNAPSHOT: &str = r#"
address = "11111111111111111111111111111112"
symbol = "USDC"
mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
mint_decimals = 6
asset_share_value = "1.05"
liability_share_value = "1.1"
total_asset_shares = "100000000"
total_liability_shares = "50000000"
last_update = 1700000000

[config]
asset_weight_init = "0.9"
asset_weight_maint = "0.95"
liability_weight_init = "1.1"
liability_weight_maint = "1.05"
deposit_limit = 1000000000
borrow_limit = 800000000
operational_state = 1
oracle_setup = 4
oracle_keys = ["EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"]

[config.interest_rate_config]
optimal_utilization_rate = "0.8"
plateau_interest_rate = "0.1"
max_interest_rate = "1"
protocol_ir_fee = "0.05"

[price]
realtime = "1.0"
realtime_confidence = "0.001"
weighted = "0.999"
"#;

    #[test]
    fn snapshot_to_bank() {
        let snapshot: BankSnapshot = toml::from_str(SNAPSHOT).unwrap();
        let bank = snapshot.to_bank().unwrap();
        assert_eq!(bank.name(), "USDC");
        assert_eq!(bank.mint_decimals, 6);
        assert_eq!(
            bank.total_asset_quantity().unwrap(),
            I80F48::from(100_000_000) * I80F48::from_str("1.05").unwrap()
        );
        assert_eq!(bank.config.oracle_setup, OracleSetup::SwitchboardPull);
        assert_eq!(bank.oracle_key, parse_pubkey(&snapshot.mint, "").unwrap());
        assert_eq!(
            bank.config.oracle_max_age,
            lendpool::constants::DEFAULT_ORACLE_MAX_AGE
        );

        let price = snapshot.to_price().unwrap();
        assert_eq!(price.price_weighted.confidence, I80F48::ZERO);
        assert_eq!(price.price_realtime.highest_price, I80F48::from_str("1.001").unwrap());
    }

    #[test]
    fn snapshot_errors_carry_context() {
        let mut snapshot: BankSnapshot = toml::from_str(SNAPSHOT).unwrap();
        snapshot.config.risk_tier = 4;
        let err = snapshot.to_bank().unwrap_err();
        assert!(format!("{err:#}").contains("loading bank"));
        assert_eq!(
            err.downcast_ref::<LendpoolError>(),
            Some(&LendpoolError::InvalidRiskTier(4))
        );

        let mut snapshot: BankSnapshot = toml::from_str(SNAPSHOT).unwrap();
        snapshot.asset_share_value = "one".into();
        assert!(snapshot.to_raw().is_err());
    }

    #[test]
    fn delta_to_opt() {
        let delta: BankConfigDelta = toml::from_str(
            r#"
deposit_limit = 5000
asset_tag = 2

[interest_rate_config]
max_interest_rate = "1.5"
"#,
        )
        .unwrap();
        let opt = delta.to_opt().unwrap();
        assert_eq!(opt.deposit_limit, Some(5000));
        assert_eq!(opt.asset_tag, Some(AssetTag::Staked));
        assert_eq!(opt.borrow_limit, None);
        let irc = opt.interest_rate_config.unwrap();
        assert_eq!(irc.max_interest_rate, Some(I80F48::from_num(1.5)));
        assert_eq!(irc.plateau_interest_rate, None);
    }

    #[test]
    fn sample_snapshots_load() {
        let sol: BankSnapshot = load_toml("snapshots/sol.toml").unwrap();
        let usdc: BankSnapshot = load_toml("snapshots/usdc.toml").unwrap();
        let sol_bank = sol.to_bank().unwrap();
        let usdc_bank = usdc.to_bank().unwrap();

        // pyth push feed id resolved through oracle_feeds
        assert_eq!(
            sol_bank.oracle_key,
            parse_pubkey("7UVimffxr9ow1uXYxsr4LHAcV58mLzhmwaeKvJ1pjLiE", "").unwrap()
        );
        assert!(sol_bank.emissions_active_lending);

        let params = lendpool::health::compute_looping_params(
            I80F48::from(10),
            2.0,
            &sol_bank,
            &usdc_bank,
            &sol.to_price().unwrap(),
            &usdc.to_price().unwrap(),
        )
        .unwrap();
        assert_eq!(params.total_deposit_amount, I80F48::from(20));
        assert!(params.borrow_amount > I80F48::from(1400));

        let delta: BankConfigDelta = load_toml("snapshots/delta.toml").unwrap();
        let opt = delta.to_opt().unwrap();
        assert_eq!(opt.total_asset_value_init_limit, Some(200_000_000));
        assert!(!opt.to_bytes().unwrap().is_empty());
    }
}
