pub mod attendance;
pub mod auth;
pub mod capture;
pub mod core;
pub mod review;
pub mod roster;
