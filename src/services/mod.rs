pub mod appointments;
pub mod hospitals;
pub mod inventory;
