pub mod bbox;
pub mod matcher;
