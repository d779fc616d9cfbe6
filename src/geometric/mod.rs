pub mod division;
pub mod parcels;
pub mod roads;
