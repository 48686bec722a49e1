// src/utils/mod.rs

pub mod device;
pub mod evidence;
pub mod integrity;
pub mod jwt;
pub mod token;
