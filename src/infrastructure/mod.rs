pub mod display;
pub mod ticker;

pub use display::{DisplayControl, TerminalDisplay};
pub use ticker::Ticker;
