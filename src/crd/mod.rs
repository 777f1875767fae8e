pub mod cnpg;
mod documentdb;

pub use documentdb::*;
