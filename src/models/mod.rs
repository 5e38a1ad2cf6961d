// src/models/mod.rs
pub mod attendance;
pub mod credential;
pub mod timetable;
pub mod user;
