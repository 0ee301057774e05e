//! Exchange Web Services source
//!
//! Enumerates mailbox items with paged FindItem calls and pulls full MIME
//! content with batched GetItem calls, over Basic-auth SOAP.

mod client;
mod soap;

pub use client::EwsClient;
