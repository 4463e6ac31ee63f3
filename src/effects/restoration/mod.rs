pub mod declicking;
