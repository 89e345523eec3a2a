pub mod flight;
pub mod ring;

pub use flight::FlightGroup;
pub use ring::{HashRing, DEFAULT_REPLICAS};
