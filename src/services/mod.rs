// Catalog state and its single writer
pub mod catalog;

// Sales trend classification and projection
pub mod forecasting;

// Simulated real-time updates
pub mod live_feed;
