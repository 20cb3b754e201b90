pub mod category;
pub mod element;
pub mod field;
pub mod page;
