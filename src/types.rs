pub mod alarm;
pub mod push;
