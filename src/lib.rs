// src/lib.rs

//! León mobile speed-radar feed library

pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
