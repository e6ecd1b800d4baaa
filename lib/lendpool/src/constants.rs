use fixed::types::I80F48;
use fixed_macro::types::I80F48;

pub const SECONDS_PER_DAY: I80F48 = I80F48!(86_400);
/// 365.25 days
pub const SECONDS_PER_YEAR: I80F48 = I80F48!(31_557_600);

/// Used when a bank's config carries an oracle max age of zero.
pub const DEFAULT_ORACLE_MAX_AGE: u16 = 60;

pub const MAX_ORACLE_KEYS: usize = 5;

pub const EMISSIONS_FLAG_BORROW_ACTIVE: u64 = 1 << 0;
pub const EMISSIONS_FLAG_LENDING_ACTIVE: u64 = 1 << 1;

pub const ASSET_TAG_DEFAULT: u8 = 0;
pub const ASSET_TAG_SOL: u8 = 1;
pub const ASSET_TAG_STAKED: u8 = 2;
