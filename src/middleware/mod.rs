/*
 * Responsibility
 * - Public interface of the middleware layer
 * - cross-cutting HTTP layers (http, cors, security_headers) and the access gate (auth)
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod security_headers;
