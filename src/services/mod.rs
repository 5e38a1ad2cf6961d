// src/services/mod.rs
pub mod attendance_service;
pub mod auth_service;
pub mod credential_service;
pub mod slot_grid;
pub mod timetable_engine;
pub mod timetable_service;
pub mod user_service;
