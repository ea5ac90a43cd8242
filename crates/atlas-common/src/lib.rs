//! Common types shared across the heat atlas crates.

pub mod bbox;
pub mod error;
pub mod granule;
pub mod quantity;
pub mod time;

pub use bbox::{BboxParseError, BoundingBox};
pub use error::{AtlasError, AtlasResult};
pub use granule::{GranuleDescriptor, GranuleList};
pub use quantity::{PhysicalQuantity, ValidityRange};
pub use time::{parse_timestamp, TimeParseError, TimeWindow};
