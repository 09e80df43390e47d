//! Sensor drivers written against `embedded-hal` traits

pub mod dht;
pub mod ina219;

pub use dht::{Dht, DhtKind};
pub use ina219::Ina219;
