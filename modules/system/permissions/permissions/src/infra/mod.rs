//! Infrastructure layer for the permissions module.

pub mod storage;
