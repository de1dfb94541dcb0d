//! The Switchyard dispatch engine.
//!
//! [`Dispatcher`] runs one message through the pipeline: obtain a transcript,
//! interpret it into commands, optionally synthesize a spoken reply, then
//! route the result to every requested target. Failures never escape
//! [`Dispatcher::handle`]; they are recorded in the returned
//! [`DispatchResult`](switchyard_types::DispatchResult).

pub mod dispatcher;
pub mod mode;

pub use dispatcher::Dispatcher;
pub use mode::resolve_response_mode;
