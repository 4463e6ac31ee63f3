pub mod butterworth;
pub mod dc_removal;
pub mod speech_highpass;
