pub mod flats;
pub mod members;
pub mod payments;
pub mod rents;
