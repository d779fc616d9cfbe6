pub mod opendata;
pub mod overpass;
