//! Cartwatch services: the live cart tracker, its storage and adapters, the
//! test runner driver and the poller.

pub mod adapter;
pub mod config;
pub mod observability;
pub mod poller;
pub mod repositories;
pub mod runner;
pub mod storage;
pub mod tracker;

#[cfg(test)]
mod test;
