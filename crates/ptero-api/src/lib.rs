//! ptero-api: Shared wire types for the panel API
//!
//! Contains response envelopes, the structured API error set, request
//! bodies, websocket frame/event types and typed resource records used
//! across the client surfaces.

pub mod errors;
pub mod events;
pub mod requests;
pub mod resources;
pub mod responses;
