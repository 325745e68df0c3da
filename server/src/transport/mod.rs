//! Transport backends implementing [`Dispatcher`](crate::dispatch::Dispatcher).

pub mod broker;
pub mod direct;
pub mod webhook;
