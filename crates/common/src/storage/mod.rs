//! 存储模块
//!
//! 提供 SQLite 连接池、表结构初始化以及存储连接状态的订阅

pub mod db;

pub use db::{Database, StoreState};
