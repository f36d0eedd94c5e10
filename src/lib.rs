//! glitchdeck library crate.
//!
//! Renders slide decks as animated terminal presentations and exports them
//! as MP4/GIF video or asciicast recordings.

pub mod bigtext;
pub mod capture;
pub mod config;
pub mod deck;
pub mod export;
pub mod rain;
pub mod raster;
pub mod renderer;
pub mod screen;
pub mod theme;
pub mod transition;
