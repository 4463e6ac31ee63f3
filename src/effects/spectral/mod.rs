pub mod noise_suppression;
