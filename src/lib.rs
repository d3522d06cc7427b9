pub mod caption;
pub mod config;
pub mod crop;
pub mod error;
pub mod events;
pub mod jobs;
pub mod layout;
pub mod painter;
pub mod photo;
pub mod scan;
pub mod session;
pub mod settings;
pub mod template;
pub mod units;
