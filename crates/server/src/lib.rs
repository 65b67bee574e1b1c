//! HTTP surface for the FalconEye detection engine

pub mod api;
pub mod config;
