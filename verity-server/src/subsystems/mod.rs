pub mod extract;
pub mod verify;
