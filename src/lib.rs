//! Food order backend: order lifecycle, Pix payments through Mercado Pago
//! and webhook reconciliation.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod orders;
pub mod payments;
pub mod services;
