/*
 * Responsibility
 * - Users, scopes and the user store
 * - Auth providers (basic / jwt / ticket), the priority loader and the request interceptor
 * - Signing key bootstrap
 */
pub mod basic;
pub mod interceptor;
pub mod jwt;
pub mod keys;
pub mod management;
pub mod password;
pub mod provider;
pub mod result;
pub mod ticket;
pub mod user;
