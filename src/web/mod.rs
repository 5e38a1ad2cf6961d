// src/web/mod.rs
pub mod attendance_handlers;
pub mod auth_handlers;
pub mod mw_admin;
pub mod mw_auth;
pub mod qr_handlers;
pub mod response;
pub mod routes;
pub mod timetable_handlers;
pub mod user_handlers;
