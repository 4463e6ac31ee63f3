pub mod edge_fade;
pub mod gain;
pub mod vad_gate;
