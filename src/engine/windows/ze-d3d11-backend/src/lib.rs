//! Direct3D11 graphics backend.
//!
//! Backend logic is written against the traits of [`native`]. On Windows they are
//! implemented on top of DXGI/Direct3D11, [`null`] records every call for tests and tools.

pub mod adapter;
pub mod backend;
pub mod device;
pub mod native;
pub mod null;
pub mod output;
pub mod pipeline_manager;
pub mod video;
pub mod vr;

#[cfg(windows)]
pub mod d3d11;

pub use backend::D3D11Backend;
