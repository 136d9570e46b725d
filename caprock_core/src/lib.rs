#![forbid(unsafe_code)]

//! Core domain model and business logic for CapRock.
//!
//! This crate provides:
//! - Domain types (containers, drinker sex, drinking experience)
//! - Liquid registry with container assignment
//! - Drink composer with ABV derivation
//! - Drinker profiles with time-decayed BAC
//! - Text-file persistence with name-based cross references

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod liquid;
pub mod drink;
pub mod profile;
pub mod storage;
pub mod bar;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::{Config, Limits};
pub use liquid::{Liquid, LiquidRegistry};
pub use drink::{Drink, DrinkComposer, DrinkPart};
pub use profile::{Consumption, Profile, ProfileRegistry};
pub use storage::Storage;
pub use bar::Bar;
