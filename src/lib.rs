//! ==============================================================================
//! fridge-host - refrigeration monitor and control host
//! ==============================================================================
//!
//! purpose:
//!     samples a fridge's temperature sensors and controller settings on a
//!     fixed cadence, keeps a week of daily history on disk, serves that
//!     history to the chart page and streams every sample live.
//!
//! architecture:
//!
//! ```text
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                         fridge host                          │
//!     │  ┌─────────────┐   ┌──────────────┐   ┌──────────────────┐   │
//!     │  │  sampler    │   │  web server  │   │ retention sweep  │   │
//!     │  │ (1s ticks)  │   │ (port 3000)  │   │ (every 24h)      │   │
//!     │  └──┬───┬───┬──┘   └──┬────┬───┬──┘   └────────┬─────────┘   │
//!     │     │   │   │         │    │   │               │             │
//!     │     │   │   └──> live channel <──┘ /ws         │             │
//!     │     │   │              │    │                  │             │
//!     │     │   └──> recorder ─┼────┼──> day logs <────┘             │
//!     │     │                  │    └──< history (/chart/:day)       │
//!     │     └──> settings <────┘ (/temperature, /api/config)         │
//!     │     └──> sensors (1-wire probes | controller context | mock) │
//!     └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ==============================================================================

pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod history;
pub mod live;
pub mod logging;
pub mod recorder;
pub mod sampler;
pub mod sensors;
pub mod server;
pub mod settings;

pub use domain::{Configuration, PartialConfiguration, Status, StatusRecord};
pub use error::{FridgeError, Result};
