/*
 * Responsibility
 * - Transport-neutral request/response types and the per-request pipeline
 */
pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod problem;
pub mod response;
