//! Conversion of raw samples into fixed-width examples

pub mod example_encoder;

pub use example_encoder::ExampleEncoder;
