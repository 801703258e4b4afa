pub mod bands;
pub mod dsp;
pub mod engine;
pub mod separator;
