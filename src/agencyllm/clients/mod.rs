//! Provider specific [`ClientWrapper`](crate::client_wrapper::ClientWrapper) and
//! [`ImageGenerationClient`](crate::image_generation::ImageGenerationClient)
//! implementations.
//!
//! Each submodule offers a concrete client that speaks a particular vendor's API while
//! conforming to the uniform contracts the turn loop depends on.

pub mod common;

pub mod gemini;
