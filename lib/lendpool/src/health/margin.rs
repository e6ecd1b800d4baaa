use crate::error::{LendpoolError, Result};

/// There are three risk postures a position can be valued under:
/// - initial ("init"): opening new positions requires init assets >= init liabs
/// - maintenance ("maint"): accounts get liquidated if maint assets < maint liabs
/// - equity: the plain, unweighted value of a position
///
/// The ordering is
///   init value <= maint value <= equity value
///
/// The different types are realized by using different weights and prices:
/// - init: init weights, soft-limit scaled asset weights, weighted prices
/// - maint: maint weights, weighted prices
/// - equity: weight 1, realtime prices
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MarginRequirementType {
    Initial = 0,
    Maintenance = 1,
    Equity = 2,
}

impl MarginRequirementType {
    #[inline(always)]
    pub fn is_weighted_price(self) -> bool {
        match self {
            MarginRequirementType::Initial | MarginRequirementType::Maintenance => true,
            MarginRequirementType::Equity => false,
        }
    }
}

impl TryFrom<u8> for MarginRequirementType {
    type Error = LendpoolError;

    fn try_from(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(MarginRequirementType::Initial),
            1 => Ok(MarginRequirementType::Maintenance),
            2 => Ok(MarginRequirementType::Equity),
            _ => Err(LendpoolError::InvalidMarginRequirementType(tag)),
        }
    }
}
