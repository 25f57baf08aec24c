//! Network layer.
//!
//! Plain TCP is served by `axum::serve`; `tls.rs` prepares the optional
//! rustls listener served through `axum-server`.

pub mod tls;
