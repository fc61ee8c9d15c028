//! Infrastructure layer - Store backends, services and adapters

pub mod access;
pub mod auth;
pub mod logging;
pub mod storage;
pub mod team;
