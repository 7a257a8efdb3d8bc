//! Types shared between the order state engine, its durable cache and the console.

pub mod domain;
pub mod error;
pub mod protocol;
