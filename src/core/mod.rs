pub mod broker;
pub mod config;
pub mod cursor;
pub mod db;
pub mod error;
pub mod ranking;
pub mod schemas;
pub mod time;
