pub mod client;
pub mod files;
pub mod postgres;
mod record;
pub mod store;
