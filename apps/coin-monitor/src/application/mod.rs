//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the monitoring services and the port interfaces
//! that connect them to price sources and chat services.

/// Port interfaces for price sources, statistics, and notifiers.
pub mod ports;

/// Monitoring services (coins, ATH, statistics, banner, status).
pub mod services;
