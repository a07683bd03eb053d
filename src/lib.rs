#![allow(
    clippy::needless_return,
    clippy::similar_names,
    clippy::inline_always,
    clippy::similar_names
)]
#![warn(
    clippy::correctness,
    clippy::perf,
    clippy::pedantic,
    clippy::inline_always
)]
#[macro_use]
extern crate log;

pub mod bitio;
pub mod components;
pub mod control;
pub mod entropy;
pub mod errors;
pub mod frame;
pub mod huffman;
pub mod image;
pub mod markers;
pub mod misc;
pub mod options;
pub mod resample;
pub mod scan;
pub mod tables;
