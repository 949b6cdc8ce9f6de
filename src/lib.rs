#![allow(
    clippy::len_zero,
    clippy::needless_lifetimes,
    clippy::enum_variant_names,
    clippy::new_without_default
)]

#[macro_use]
mod macros;

pub mod blit;
pub mod blt;
pub mod config;
pub mod display;
pub mod driver;
pub mod format;
pub mod gate;
pub mod hwmem;
#[cfg(test)]
mod it;
pub mod logger;
pub mod overlap;
pub mod scratch;
pub mod surface;
pub mod utils;
pub mod video;
