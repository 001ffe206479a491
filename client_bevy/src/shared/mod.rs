pub mod channel;
pub mod types;
pub mod vrm;
