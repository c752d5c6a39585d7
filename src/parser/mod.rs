pub mod fields;
pub mod xml;
