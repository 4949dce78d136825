//! 测试工具模块

pub mod test_utils;
