#![allow(dead_code)]

pub mod checksummer_env;
pub mod tree;
