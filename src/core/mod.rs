pub mod error;
pub mod instrument;
pub mod opportunity;
pub mod participant;
pub mod result;
