//! hydronode - hydroponics node controller.
//!
//! EC and water-level sensing with on-device two-point calibration
//! wizards, driven from three buttons and a 20x4 character LCD, with
//! optional MQTT publishing.
//!
//! The crate is split along the host/target seam: everything here is
//! `no_std`-portable controller logic behind small traits
//! ([`sensors::SensorSource`], [`ui::DisplayLines`],
//! [`scheduler::ButtonInput`], [`net::NetworkLink`],
//! [`store::KvStore`]), and the ESP32-C3 binary (feature `embedded`)
//! supplies the ESP-IDF implementations. Host tests run the full
//! control loop against in-memory fakes.

#![cfg_attr(not(test), no_std)]

pub mod api;
pub mod cal;
pub mod config;
pub mod context;
pub mod error;
pub mod net;
pub mod scheduler;
pub mod sensors;
pub mod store;
pub mod ui;

pub use context::DeviceContext;
pub use error::{Error, Result};
pub use scheduler::{ButtonInput, Scheduler};
pub use ui::navigator::NavAction;
