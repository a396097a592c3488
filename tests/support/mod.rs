#![allow(dead_code)]

pub mod shimmer_env;
pub mod voice;
pub mod wav;
