//! Dashboard back-end.
//!
//! Ties the heat composite, KOSTRA scenarios, CatRaRE events and flood-risk
//! tiles to a single map overlay:
//!
//! ```text
//! region / method ──► CompositeChannel (heat) ───┐
//! scenario ─────────► CompositeChannel (kostra) ─┤
//! catalogue ────────► catrare::event_layer ──────┼──► DashboardController ──► OverlayManager
//! archive url ──────► flood::flood_layer ────────┘
//! ```

pub mod catrare;
pub mod controller;
pub mod error;
pub mod flood;
pub mod kostra;

pub use catrare::{event_layer, filter_recent, load_events, parse_events, RainEvent};
pub use controller::{
    Applied, CompositeChannel, DashboardController, CATRARE_LAYER, FLOOD_LAYER, HEAT_LAYER,
    KOSTRA_LAYER,
};
pub use error::{DashboardError, Result};
pub use flood::{flood_layer, flood_source, FloodScenario};
pub use kostra::{Duration, KostraScenario, ReturnPeriod};
