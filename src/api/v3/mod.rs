/*
 * Responsibility
 * - v3 API surface: DTOs, handlers and their registration on the handler registry
 */
pub mod dto;
pub mod handlers;
mod routes;

pub use routes::{OWNER, register};
