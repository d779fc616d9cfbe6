pub mod collect;
pub mod config;
pub mod geo_core;
pub mod geometric;
