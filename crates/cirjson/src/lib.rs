//! Streaming reader and writer for CirJSON: a JSON superset in which
//! every object opens with a mandatory `"__cirJsonId__"` identity
//! property and every array opens with a string identity element.
//!
//! The crate exposes a low-level token-stream API: a factory constructs
//! blocking or non-blocking (feed-driven) readers and byte- or
//! char-target writers, parameterized by feature bitsets and resource
//! constraints. Higher data-binding layers are expected to build on top
//! of the [`TokenRead`] and [`CirJsonWriter`] surfaces.

pub mod base64;
pub mod constraints;
pub mod context;
pub mod error;
pub mod escape;
mod factory;
pub mod features;
pub mod io;
pub mod location;
pub mod num;
pub mod ptr;
pub mod reader;
pub mod recycler;
mod symbols;
pub mod token;
pub mod writer;

pub use error::{Error, Result};
pub use factory::{CirJsonFactory, CirJsonFactoryBuilder, FORMAT_NAME};
pub use location::{ContentReference, Location};
pub use ptr::Pointer;
pub use reader::{CirJsonReader, NonBlockingCirJsonReader, TokenRead};
pub use token::{NumberKind, TokenKind};
pub use writer::{CirJsonWriter, IdProvider, SequentialIdProvider};

/// The distinguished property name which must open every CirJSON object.
pub const ID_PROPERTY_NAME: &str = "__cirJsonId__";

/// Build-time embedded version of this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
