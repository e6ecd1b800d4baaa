use fixed::types::I80F48;
use serde::{Deserialize, Serialize};

use crate::error::{CheckedOrErr, LendpoolError, Result};
use crate::state::{Bank, OraclePrice};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaxLeverage {
    /// init asset weight of the deposit bank over init liability weight of the borrow bank
    pub ltv: f64,
    /// 1 / (1 - ltv), the limit of looping the deposit forever
    pub max_leverage: f64,
}

impl MaxLeverage {
    /// False for configs where looping makes no sense, like an ltv of 1 or more.
    pub fn is_sane(&self) -> bool {
        self.max_leverage.is_finite() && self.max_leverage >= 1.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoopingParams {
    /// in borrow bank ui units
    pub borrow_amount: I80F48,
    /// in deposit bank ui units, principal included
    pub total_deposit_amount: I80F48,
}

/// Highest leverage reachable by depositing in `deposit_bank`, borrowing from
/// `borrow_bank` and depositing the proceeds again, repeatedly.
///
/// The result is not validated, see `MaxLeverage::is_sane`.
pub fn compute_max_leverage(deposit_bank: &Bank, borrow_bank: &Bank) -> MaxLeverage {
    let asset_weight = deposit_bank.config.asset_weight_init;
    let liab_weight = borrow_bank.config.liability_weight_init;

    let ltv = match asset_weight.checked_div(liab_weight) {
        Some(ltv) => ltv.to_num::<f64>(),
        None => asset_weight.to_num::<f64>() / liab_weight.to_num::<f64>(),
    };
    let max_leverage = 1.0 / (1.0 - ltv);

    MaxLeverage { ltv, max_leverage }
}

/// Amounts needed to turn `principal` of the deposit token into a position
/// with `target_leverage`, in one step.
///
/// The borrow is sized with the weighted prices at the ends of their
/// confidence bands that make it smallest.
pub fn compute_looping_params(
    principal: I80F48,
    target_leverage: f64,
    deposit_bank: &Bank,
    borrow_bank: &Bank,
    deposit_price: &OraclePrice,
    borrow_price: &OraclePrice,
) -> Result<LoopingParams> {
    let MaxLeverage { max_leverage, .. } = compute_max_leverage(deposit_bank, borrow_bank);

    if target_leverage.is_nan() || target_leverage < 1.0 {
        return Err(LendpoolError::LeverageBelowOne {
            target: target_leverage,
        });
    }
    if max_leverage.is_nan() || target_leverage.is_infinite() || target_leverage > max_leverage
    {
        return Err(LendpoolError::LeverageExceedsMax {
            target: target_leverage,
            max: max_leverage,
        });
    }

    let leverage = I80F48::checked_from_num(target_leverage).or_math_err("target leverage")?;
    let total_deposit_amount = principal
        .checked_mul(leverage)
        .or_math_err("total deposit")?;
    let additional_deposit_amount = total_deposit_amount - principal;

    let borrow_amount = additional_deposit_amount
        .checked_mul(deposit_price.price_weighted.lowest_price)
        .and_then(|v| v.checked_div(borrow_price.price_weighted.highest_price))
        .or_math_err("borrow amount")?;

    Ok(LoopingParams {
        borrow_amount,
        total_deposit_amount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::*;

    fn banks(asset_weight_init: f64, liab_weight_init: f64) -> (Bank, Bank) {
        let mut deposit = mock_bank(1.0, 0.2, 0.1, 6);
        deposit.config.asset_weight_init = I80F48::from_num(asset_weight_init);
        let mut borrow = mock_bank(1.0, 0.2, 0.1, 9);
        borrow.config.liability_weight_init = I80F48::from_num(liab_weight_init);
        (deposit, borrow)
    }

    #[test]
    fn max_leverage() {
        let (deposit, borrow) = banks(0.8, 1.25);
        let max = compute_max_leverage(&deposit, &borrow);
        assert!((max.ltv - 0.64).abs() < 1e-9);
        assert!((max.max_leverage - 2.7778).abs() < 1e-4);
        assert!(max.is_sane());
    }

    #[test]
    fn max_leverage_insane_configs() {
        let cases = vec![(1.0, 1.0), (1.2, 1.0), (0.5, 0.0)];
        for (i, (aw, lw)) in cases.into_iter().enumerate() {
            println!("checking testcase {}", i);
            let (deposit, borrow) = banks(aw, lw);
            assert!(!compute_max_leverage(&deposit, &borrow).is_sane());
        }
    }

    #[test]
    fn looping_rejects_out_of_range_leverage() {
        let (deposit, borrow) = banks(0.8, 1.25);
        let (deposit_before, borrow_before) = (deposit.clone(), borrow.clone());
        let price = mock_price(1.0, 0.0, 1.0, 0.0);
        let principal = I80F48::from(1000);

        let r = compute_looping_params(principal, 0.5, &deposit, &borrow, &price, &price);
        assert_eq!(r, Err(LendpoolError::LeverageBelowOne { target: 0.5 }));

        let r = compute_looping_params(principal, f64::NAN, &deposit, &borrow, &price, &price);
        assert!(matches!(r, Err(LendpoolError::LeverageBelowOne { .. })));

        let r = compute_looping_params(
            principal,
            f64::NEG_INFINITY,
            &deposit,
            &borrow,
            &price,
            &price,
        );
        assert!(matches!(r, Err(LendpoolError::LeverageBelowOne { .. })));

        let r = compute_looping_params(principal, 3.0, &deposit, &borrow, &price, &price);
        assert!(matches!(
            r,
            Err(LendpoolError::LeverageExceedsMax { target, .. }) if target == 3.0
        ));

        let r = compute_looping_params(
            principal,
            f64::INFINITY,
            &deposit,
            &borrow,
            &price,
            &price,
        );
        assert!(matches!(
            r,
            Err(LendpoolError::LeverageExceedsMax { target, .. }) if target == f64::INFINITY
        ));

        // ltv of exactly 1 gives an unbounded max, an infinite target still exceeds it
        let (deposit_one, borrow_one) = banks(1.0, 1.0);
        let r = compute_looping_params(
            principal,
            f64::INFINITY,
            &deposit_one,
            &borrow_one,
            &price,
            &price,
        );
        assert!(matches!(r, Err(LendpoolError::LeverageExceedsMax { .. })));

        assert_eq!(deposit, deposit_before);
        assert_eq!(borrow, borrow_before);
    }

    #[test]
    fn looping_params() {
        let (deposit, borrow) = banks(0.8, 1.25);
        let cases = vec![
            // principal, leverage, deposit price/conf, borrow price/conf, total deposit, borrow
            (1000.0, 2.0, (1.0, 0.0), (1.0, 0.0), 2000.0, 1000.0),
            (1000.0, 1.0, (1.0, 0.0), (1.0, 0.0), 1000.0, 0.0),
            (10.0, 2.5, (150.0, 1.0), (1.0, 0.01), 25.0, 15.0 * 149.0 / 1.01),
        ];
        for (i, (principal, leverage, (dp, dc), (bp, bc), total, borrowed)) in
            cases.into_iter().enumerate()
        {
            println!("checking testcase {}", i);
            let params = compute_looping_params(
                I80F48::from_num(principal),
                leverage,
                &deposit,
                &borrow,
                &mock_price(dp, dc, dp, dc),
                &mock_price(bp, bc, bp, bc),
            )
            .unwrap();
            assert!(value_eq(params.total_deposit_amount, total));
            assert!(value_eq(params.borrow_amount, borrowed));
        }
    }

    #[test]
    fn looping_uses_weighted_prices() {
        let (deposit, borrow) = banks(0.8, 1.25);
        // realtime prices are ignored
        let deposit_price = mock_price(100.0, 0.0, 2.0, 0.5);
        let borrow_price = mock_price(100.0, 0.0, 1.0, 0.5);
        let params = compute_looping_params(
            I80F48::from(10),
            2.0,
            &deposit,
            &borrow,
            &deposit_price,
            &borrow_price,
        )
        .unwrap();
        assert!(value_eq(params.borrow_amount, 10.0 * 1.5 / 1.5));
    }
}
