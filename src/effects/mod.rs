pub mod dynamics;
pub mod filter;
pub mod restoration;
pub mod spectral;
pub mod utility;
