use anchor_lang::prelude::Pubkey;
use fixed::types::I80F48;
use fixed_macro::types::I80F48;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{BankConfig, BankConfigRaw, OracleKeyResolver, OraclePrice, PriceBias};
use crate::constants::*;
use crate::error::{CheckedOrErr, Result};
use crate::health::MarginRequirementType;
use crate::i80f48::{native_to_ui, WrappedI80F48};

/// Bank account as decoded from chain, before any interpretation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BankRaw {
    pub mint: Pubkey,
    pub mint_decimals: u8,

    pub group: Pubkey,

    pub asset_share_value: WrappedI80F48,
    pub liability_share_value: WrappedI80F48,

    pub liquidity_vault: Pubkey,
    pub liquidity_vault_bump: u8,
    pub liquidity_vault_authority_bump: u8,

    pub insurance_vault: Pubkey,
    pub insurance_vault_bump: u8,
    pub insurance_vault_authority_bump: u8,
    pub collected_insurance_fees_outstanding: WrappedI80F48,

    pub fee_vault: Pubkey,
    pub fee_vault_bump: u8,
    pub fee_vault_authority_bump: u8,
    pub collected_group_fees_outstanding: WrappedI80F48,

    pub total_liability_shares: WrappedI80F48,
    pub total_asset_shares: WrappedI80F48,

    pub last_update: i64,

    pub config: BankConfigRaw,

    pub flags: u64,
    pub emissions_rate: u64,
    pub emissions_remaining: WrappedI80F48,
    pub emissions_mint: Pubkey,
}

/// One lending pool: a single mint, the shares issued against it and the
/// config that decides how much those shares are worth as collateral.
#[derive(Clone, Debug, PartialEq)]
pub struct Bank {
    pub address: Pubkey,
    pub token_symbol: Option<String>,

    pub group: Pubkey,
    pub mint: Pubkey,
    pub mint_decimals: u8,

    /// native tokens per asset share, grows as lenders earn interest
    pub asset_share_value: I80F48,
    /// native tokens per liability share, grows as borrowers pay interest
    pub liability_share_value: I80F48,

    pub liquidity_vault: Pubkey,
    pub liquidity_vault_bump: u8,
    pub liquidity_vault_authority_bump: u8,

    pub insurance_vault: Pubkey,
    pub insurance_vault_bump: u8,
    pub insurance_vault_authority_bump: u8,
    pub collected_insurance_fees_outstanding: I80F48,

    pub fee_vault: Pubkey,
    pub fee_vault_bump: u8,
    pub fee_vault_authority_bump: u8,
    pub collected_group_fees_outstanding: I80F48,

    pub total_liability_shares: I80F48,
    pub total_asset_shares: I80F48,

    /// unix seconds of the last interest accrual
    pub last_update: i64,

    pub config: BankConfig,

    pub emissions_active_borrowing: bool,
    pub emissions_active_lending: bool,
    pub emissions_rate: u64,
    pub emissions_mint: Pubkey,
    pub emissions_remaining: I80F48,

    pub oracle_key: Pubkey,
}

/// Annualized rates at the current utilization. No compounding.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterestRates {
    pub lending_rate: I80F48,
    pub borrowing_rate: I80F48,
}

/// Native amounts that can still be deposited or borrowed before hitting the
/// bank limits. Can be negative when a limit is already exceeded.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RemainingCapacity {
    pub deposit_capacity: I80F48,
    pub borrow_capacity: I80F48,
}

impl Bank {
    pub fn from_raw(
        address: Pubkey,
        raw: &BankRaw,
        resolver: &impl OracleKeyResolver,
        token_symbol: Option<String>,
    ) -> Result<Self> {
        let config = BankConfig::from_raw(&raw.config)?;
        let oracle_key = resolver.oracle_key(&config)?;
        debug!(
            bank = %address,
            mint = %raw.mint,
            oracle = %oracle_key,
            "loaded bank"
        );

        Ok(Self {
            address,
            token_symbol,
            group: raw.group,
            mint: raw.mint,
            mint_decimals: raw.mint_decimals,
            asset_share_value: raw.asset_share_value.into(),
            liability_share_value: raw.liability_share_value.into(),
            liquidity_vault: raw.liquidity_vault,
            liquidity_vault_bump: raw.liquidity_vault_bump,
            liquidity_vault_authority_bump: raw.liquidity_vault_authority_bump,
            insurance_vault: raw.insurance_vault,
            insurance_vault_bump: raw.insurance_vault_bump,
            insurance_vault_authority_bump: raw.insurance_vault_authority_bump,
            collected_insurance_fees_outstanding: raw.collected_insurance_fees_outstanding.into(),
            fee_vault: raw.fee_vault,
            fee_vault_bump: raw.fee_vault_bump,
            fee_vault_authority_bump: raw.fee_vault_authority_bump,
            collected_group_fees_outstanding: raw.collected_group_fees_outstanding.into(),
            total_liability_shares: raw.total_liability_shares.into(),
            total_asset_shares: raw.total_asset_shares.into(),
            last_update: raw.last_update,
            config,
            emissions_active_borrowing: raw.flags & EMISSIONS_FLAG_BORROW_ACTIVE != 0,
            emissions_active_lending: raw.flags & EMISSIONS_FLAG_LENDING_ACTIVE != 0,
            emissions_rate: raw.emissions_rate,
            emissions_mint: raw.emissions_mint,
            emissions_remaining: raw.emissions_remaining.into(),
            oracle_key,
        })
    }

    pub fn name(&self) -> String {
        self.token_symbol
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }

    //
    // shares
    //

    pub fn total_asset_quantity(&self) -> Result<I80F48> {
        self.asset_quantity(self.total_asset_shares)
    }

    pub fn total_liability_quantity(&self) -> Result<I80F48> {
        self.liability_quantity(self.total_liability_shares)
    }

    pub fn asset_quantity(&self, shares: I80F48) -> Result<I80F48> {
        shares
            .checked_mul(self.asset_share_value)
            .or_math_err("asset quantity")
    }

    pub fn liability_quantity(&self, shares: I80F48) -> Result<I80F48> {
        shares
            .checked_mul(self.liability_share_value)
            .or_math_err("liability quantity")
    }

    /// Multiplies by the share value, same as `asset_quantity`.
    ///
    /// Existing integrations rely on this returning `quantity * share_value`.
    /// Use `quantity / asset_share_value` to get the actual share count.
    pub fn asset_shares(&self, quantity: I80F48) -> Result<I80F48> {
        quantity
            .checked_mul(self.asset_share_value)
            .or_math_err("asset shares")
    }

    /// Multiplies by the share value, see `asset_shares`.
    pub fn liability_shares(&self, quantity: I80F48) -> Result<I80F48> {
        quantity
            .checked_mul(self.liability_share_value)
            .or_math_err("liability shares")
    }

    //
    // valuation
    //

    pub fn get_price(&self, price: &OraclePrice, bias: PriceBias, weighted: bool) -> I80F48 {
        let p = price.with_confidence(weighted);
        match bias {
            PriceBias::Lowest => p.lowest_price,
            PriceBias::Highest => p.highest_price,
            PriceBias::None => p.price,
        }
    }

    /// USD value of a native (or ui, if `scale_to_base` is false) quantity.
    pub fn compute_usd_value(
        &self,
        price: &OraclePrice,
        quantity: I80F48,
        bias: PriceBias,
        weighted: bool,
        weight: Option<I80F48>,
        scale_to_base: bool,
    ) -> Result<I80F48> {
        let price = self.get_price(price, bias, weighted);
        let value = quantity
            .checked_mul(price)
            .and_then(|v| v.checked_mul(weight.unwrap_or(I80F48::ONE)))
            .or_math_err("usd value")?;
        if scale_to_base {
            native_to_ui(value, self.mint_decimals)
        } else {
            Ok(value)
        }
    }

    pub fn compute_asset_usd_value(
        &self,
        price: &OraclePrice,
        asset_shares: I80F48,
        margin_type: MarginRequirementType,
        bias: PriceBias,
    ) -> Result<I80F48> {
        let quantity = self.asset_quantity(asset_shares)?;
        let weight = self.get_asset_weight(margin_type, price, false)?;
        self.compute_usd_value(
            price,
            quantity,
            bias,
            margin_type.is_weighted_price(),
            Some(weight),
            true,
        )
    }

    pub fn compute_liability_usd_value(
        &self,
        price: &OraclePrice,
        liability_shares: I80F48,
        margin_type: MarginRequirementType,
        bias: PriceBias,
    ) -> Result<I80F48> {
        let quantity = self.liability_quantity(liability_shares)?;
        let weight = self.get_liability_weight(margin_type);
        self.compute_usd_value(
            price,
            quantity,
            bias,
            margin_type.is_weighted_price(),
            Some(weight),
            true,
        )
    }

    /// Inverse of an unweighted, unscaled `compute_usd_value`: ui token amount
    /// worth `usd_value` at the selected price.
    pub fn compute_quantity_from_usd_value(
        &self,
        price: &OraclePrice,
        usd_value: I80F48,
        bias: PriceBias,
        weighted: bool,
    ) -> Result<I80F48> {
        let price = self.get_price(price, bias, weighted);
        usd_value
            .checked_div(price)
            .or_math_err("quantity from usd value")
    }

    /// Total value locked: deposits minus borrows, in USD at the midpoint price.
    pub fn compute_tvl(&self, price: &OraclePrice) -> Result<I80F48> {
        let assets = self.compute_asset_usd_value(
            price,
            self.total_asset_shares,
            MarginRequirementType::Equity,
            PriceBias::None,
        )?;
        let liabs = self.compute_liability_usd_value(
            price,
            self.total_liability_shares,
            MarginRequirementType::Equity,
            PriceBias::None,
        )?;
        assets.checked_sub(liabs).or_math_err("tvl")
    }

    //
    // weights
    //

    /// Asset weight for the margin requirement.
    ///
    /// For Initial, once the bank's total deposits are worth more than
    /// `total_asset_value_init_limit`, the weight shrinks proportionally so
    /// that the bank as a whole never provides more than the limit in
    /// collateral value.
    pub fn get_asset_weight(
        &self,
        margin_type: MarginRequirementType,
        price: &OraclePrice,
        ignore_soft_limits: bool,
    ) -> Result<I80F48> {
        match margin_type {
            MarginRequirementType::Initial => {
                let init_weight = self.config.asset_weight_init;
                if ignore_soft_limits || self.config.is_soft_limit_disabled() {
                    return Ok(init_weight);
                }

                let limit = self.config.total_asset_value_init_limit;
                let total = self.compute_asset_usd_value(
                    price,
                    self.total_asset_shares,
                    MarginRequirementType::Equity,
                    PriceBias::Lowest,
                )?;
                if total <= limit {
                    return Ok(init_weight);
                }

                let scaled = limit
                    .checked_div(total)
                    .and_then(|r| r.checked_mul(init_weight))
                    .or_math_err("soft limit asset weight")?;
                debug!(
                    bank = %self.address,
                    %total,
                    %limit,
                    weight = %scaled,
                    "asset weight dampened by soft limit"
                );
                Ok(scaled)
            }
            MarginRequirementType::Maintenance => Ok(self.config.asset_weight_maint),
            MarginRequirementType::Equity => Ok(I80F48::ONE),
        }
    }

    pub fn get_liability_weight(&self, margin_type: MarginRequirementType) -> I80F48 {
        match margin_type {
            MarginRequirementType::Initial => self.config.liability_weight_init,
            MarginRequirementType::Maintenance => self.config.liability_weight_maint,
            MarginRequirementType::Equity => I80F48::ONE,
        }
    }

    //
    // interest
    //

    pub fn compute_utilization_rate(&self) -> Result<I80F48> {
        let assets = self.total_asset_quantity()?;
        if assets.is_zero() {
            return Ok(I80F48::ZERO);
        }
        self.total_liability_quantity()?
            .checked_div(assets)
            .or_math_err("utilization rate")
    }

    /// Rate before fees at the current utilization, see `InterestRateConfig::base_rate`.
    pub fn compute_base_interest_rate(&self) -> Result<I80F48> {
        let u = self.compute_utilization_rate()?;
        self.config.interest_rate_config.base_rate(u)
    }

    pub fn compute_interest_rates(&self) -> Result<InterestRates> {
        let irc = &self.config.interest_rate_config;
        let base = self.compute_base_interest_rate()?;
        let u = self.compute_utilization_rate()?;

        let lending_rate = base.checked_mul(u).or_math_err("lending rate")?;
        let borrowing_rate = I80F48::ONE
            .checked_add(irc.ir_fees())
            .and_then(|fee_factor| base.checked_mul(fee_factor))
            .and_then(|v| v.checked_add(irc.fixed_fees()))
            .or_math_err("borrowing rate")?;

        Ok(InterestRates {
            lending_rate,
            borrowing_rate,
        })
    }

    //
    // limits
    //

    /// Room left under the deposit and borrow limits as of `now_ts`.
    ///
    /// Interest accrued since `last_update` has not been applied to the share
    /// values yet, so twice the projected interest is held back from both
    /// sides.
    pub fn compute_remaining_capacity(&self, now_ts: i64) -> Result<RemainingCapacity> {
        let InterestRates {
            lending_rate,
            borrowing_rate,
        } = self.compute_interest_rates()?;

        let elapsed = I80F48::from(now_ts) - I80F48::from(self.last_update);
        let year_fraction = elapsed
            .checked_div(SECONDS_PER_YEAR)
            .or_math_err("year fraction")?;

        let total_assets = self.total_asset_quantity()?;
        let total_liabs = self.total_liability_quantity()?;

        let outstanding_lending = I80F48!(2)
            .checked_mul(lending_rate)
            .and_then(|v| v.checked_mul(year_fraction))
            .and_then(|v| v.checked_mul(total_assets))
            .or_math_err("outstanding lending interest")?;
        let outstanding_borrowing = I80F48!(2)
            .checked_mul(borrowing_rate)
            .and_then(|v| v.checked_mul(year_fraction))
            .and_then(|v| v.checked_mul(total_liabs))
            .or_math_err("outstanding borrowing interest")?;

        let deposit_room = self
            .config
            .deposit_limit
            .checked_sub(total_assets)
            .or_math_err("deposit room")?
            .max(I80F48::ZERO);
        let borrow_room = self
            .config
            .borrow_limit
            .checked_sub(total_liabs)
            .or_math_err("borrow room")?
            .max(I80F48::ZERO);

        Ok(RemainingCapacity {
            deposit_capacity: deposit_room
                .checked_sub(outstanding_lending)
                .or_math_err("deposit capacity")?,
            borrow_capacity: borrow_room
                .checked_sub(outstanding_borrowing)
                .or_math_err("borrow capacity")?,
        })
    }

    /// Human readable summary of the bank.
    pub fn describe(&self, price: &OraclePrice) -> Result<String> {
        let total_assets_usd = self.compute_asset_usd_value(
            price,
            self.total_asset_shares,
            MarginRequirementType::Equity,
            PriceBias::None,
        )?;
        let total_liabs_usd = self.compute_liability_usd_value(
            price,
            self.total_liability_shares,
            MarginRequirementType::Equity,
            PriceBias::None,
        )?;
        // a zero liability weight leaves the ltv unbounded
        let ltv_pct = |weight: I80F48| match I80F48::ONE.checked_div(weight) {
            Some(ltv) => format!("{:.2}", ltv.to_num::<f64>() * 100.0),
            None => "Infinity".to_string(),
        };
        let c = &self.config;

        Ok(format!(
            "Bank address: {}
Mint: {}, decimals: {}

Total deposits: {}
Total borrows: {}

Total assets (USD value): {}
Total liabilities (USD value): {}

Asset price (USD): {}
Asset price Weighted (USD): {}

Config:
- Asset weight init: {:.2}
- Asset weight maint: {:.2}
- Liability weight init: {:.2}
- Liability weight maint: {:.2}

- Deposit limit: {}
- Borrow limit: {}

LTVs:
- Initial: {}%
- Maintenance: {}%
",
            self.address,
            self.mint,
            self.mint_decimals,
            native_to_ui(self.total_asset_quantity()?, self.mint_decimals)?,
            native_to_ui(self.total_liability_quantity()?, self.mint_decimals)?,
            total_assets_usd,
            total_liabs_usd,
            self.get_price(price, PriceBias::None, false),
            self.get_price(price, PriceBias::None, true),
            c.asset_weight_init.to_num::<f64>(),
            c.asset_weight_maint.to_num::<f64>(),
            c.liability_weight_init.to_num::<f64>(),
            c.liability_weight_maint.to_num::<f64>(),
            c.deposit_limit,
            c.borrow_limit,
            ltv_pct(c.liability_weight_init),
            ltv_pct(c.liability_weight_maint),
        ))
    }
}
