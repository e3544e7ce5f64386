//! Invoice Ledger Bot
//!
//! Records sales, purchases and advertisement spend posted to a chat group
//! in a spreadsheet ledger, tracks which purchase invoices are still unpaid
//! and settles them against uploaded transfer proofs.

pub mod bot;
pub mod cloud_adapters;
pub mod config;
pub mod core;
pub mod parser;
