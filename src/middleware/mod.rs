/*
 * Responsibility
 * - Transport middleware applied to the axum adapter
 */
pub mod http;
