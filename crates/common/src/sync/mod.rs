//! Synchronization primitives for callback-driven orchestration

pub mod settle;

pub use settle::SettleCell;
