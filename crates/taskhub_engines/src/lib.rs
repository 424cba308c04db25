#![forbid(unsafe_code)]

pub mod push_codec;
pub mod raster_surface;
pub mod unsub_code;
pub mod unsub_glyph;
pub mod unsub_guard;
pub mod unsub_match;
