#![forbid(unsafe_code)]

pub mod error;
pub mod help;
pub mod ladder;
pub mod model;
pub mod prize;
pub mod rules;
pub mod time;

pub use error::Error;
pub use time::Clock;
