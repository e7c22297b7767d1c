//! Galaxy SED and broadband-magnitude synthesis from stellar population
//! templates and per-galaxy star-formation histories.

pub mod common;
pub mod domain;
pub mod library;
pub mod numerics;
pub mod synthesis;
