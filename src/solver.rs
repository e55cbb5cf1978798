pub mod boolean;
pub mod math;
