pub mod backend;
pub mod busy;
pub mod capture;
pub mod config;
pub mod db;
pub mod error;
pub mod ipc;
pub mod model;
pub mod orchestrator;
pub mod persistence;
pub mod recognition;
pub mod recognizer;
pub mod review;
pub mod roster;
pub mod session;
