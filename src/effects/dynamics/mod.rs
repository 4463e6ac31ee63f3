pub mod agc;
pub mod normalization;
