// src/lib.rs

pub mod config;
pub mod driver;
pub mod effective_field;
pub mod energy;
pub mod error;
pub mod fft;
pub mod geometry;
pub mod grid;
pub mod imaging;
pub mod initial_states;
pub mod llg;
pub mod minimize;
pub mod ovf;
pub mod params;
pub mod scalar_field;
pub mod system;
pub mod trajectory;
pub mod vec3;
pub mod vector_field;
pub mod visualisation;
pub mod workflow;
