pub mod nifty;
pub mod util;
