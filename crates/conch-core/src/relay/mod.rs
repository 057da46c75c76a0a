//! The relay: one response cycle per inbound message.
//!
//! - `aggregator`: folds engine fragments into one send plus bounded edits
//! - `responder`: runs a cycle (store -> engine -> aggregator -> store)
//! - `handler`: access control and command routing for a single update
//! - `dispatcher`: the polling loop, sequential or one worker per chat

pub mod aggregator;
pub mod dispatcher;
pub mod handler;
pub mod responder;
