//! liftlog - Local-first strength training log
//!
//! Workout data lives in a local SQLite store and is reconciled with a
//! remote backend in the background; logging never waits on the network.

pub mod db;
pub mod error;
pub mod models;
pub mod pr;
pub mod session;
pub mod sync;

pub use db::Store;
pub use session::SessionTracker;
pub use sync::{RemoteApi, SyncCoordinator};
