pub mod asset_manager;
pub mod data_manager;
pub mod db;
pub mod error;
pub mod repositories;

pub use data_manager::DataManager;
