pub mod produce;
pub mod table;
