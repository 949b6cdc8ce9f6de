#![allow(clippy::comparison_chain)]

pub mod layout;
pub mod rect;
