pub mod config;
pub mod error;
pub mod ledger_client;
pub mod main_loop;
pub mod reconcile;
pub mod source_client;
pub mod types;
