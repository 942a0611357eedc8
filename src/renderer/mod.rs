//! WebGPU rendering module
//!
//! Instanced meshes and particles plus a CPU-built trail ribbon, all drawn
//! from a `FrameView` produced by the simulation.

pub mod pipeline;
pub mod shapes;
pub mod vertex;

pub use pipeline::GpuRenderer;
