//! Helpers for connecting to a rabbitmq broker through [`lapin`].

mod channel;
pub mod configuration;
mod factory;

pub use channel::Channel;
pub use factory::ConnectionFactory;
pub use lapin::Connection;

pub use lapin::{options, types};
