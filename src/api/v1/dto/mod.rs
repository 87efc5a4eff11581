pub mod me;
pub mod sessions;
