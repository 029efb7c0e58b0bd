//! Debayering module for converting Bayer pattern RAW images to RGBA16 frames

pub mod cpu_debayer;

pub use cpu_debayer::CpuDebayer;
