pub mod analysis;
pub mod beat;
pub mod decode;
pub mod energy;
pub mod error;
pub mod features;
pub mod framer;
pub mod onset;
pub mod signal;
pub mod spectrum;
pub mod tempo;
