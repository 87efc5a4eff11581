pub mod health;
pub mod me;
pub mod protected;
pub mod public;
pub mod sessions;
