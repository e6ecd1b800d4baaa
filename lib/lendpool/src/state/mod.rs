pub use bank::*;
pub use bank_config::*;
pub use bank_config_opt::*;
pub use oracle::*;

mod bank;
mod bank_config;
mod bank_config_opt;
mod oracle;
