pub use leverage::*;
pub use margin::*;

mod leverage;
mod margin;
