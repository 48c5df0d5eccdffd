pub mod events;
pub mod health;
pub mod medical;
pub mod personnel;
