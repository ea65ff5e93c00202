pub mod error;
pub mod mac;
pub mod sim;
pub mod ui;
pub mod utils;

pub use error::SimError;
pub use mac::{Delivery, FrameKind, MacStation, MacStrategy, StationLink};
