//! DXGI/Direct3D11 implementation of the native seam

mod context;
mod conv;
mod device;
mod factory;
mod video;

pub use factory::DxgiFactory;

use crate::native::{NativeObject, NativeResult};
use std::ops::Deref;
use windows::core::{Interface, HRESULT};
use windows::Win32::Foundation::{E_INVALIDARG, E_OUTOFMEMORY};
use windows::Win32::Graphics::Direct3D11::*;
use windows::Win32::Graphics::Dxgi::*;
use ze_gfx::backend::DeviceError;

/// Wraps a COM interface so it can be shared between threads
#[derive(Clone, PartialEq, Eq)]
pub struct SendableIUnknown<T: Interface>(pub T);

impl<T: Interface> From<T> for SendableIUnknown<T> {
    fn from(object: T) -> Self {
        Self(object)
    }
}

unsafe impl<T: Interface> Send for SendableIUnknown<T> {}
unsafe impl<T: Interface> Sync for SendableIUnknown<T> {}

impl<T: Interface> Deref for SendableIUnknown<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub(crate) fn wrap<T: Interface>(object: T) -> NativeObject {
    NativeObject::new(SendableIUnknown(object))
}

/// Interface behind a handle created by this module
pub(crate) fn typed<T: Interface>(object: &NativeObject) -> NativeResult<&T> {
    object
        .downcast_ref::<SendableIUnknown<T>>()
        .map(|object| &object.0)
        .ok_or(DeviceError::InvalidParameters)
}

pub(crate) fn typed_opt<T: Interface>(object: Option<&NativeObject>) -> Option<T> {
    object.and_then(|object| typed::<T>(object).ok().cloned())
}

/// Buffers and textures as a generic resource
pub(crate) fn resource(object: &NativeObject) -> NativeResult<ID3D11Resource> {
    if let Ok(buffer) = typed::<ID3D11Buffer>(object) {
        return buffer.cast().map_err(convert_error);
    }
    if let Ok(texture) = typed::<ID3D11Texture1D>(object) {
        return texture.cast().map_err(convert_error);
    }
    if let Ok(texture) = typed::<ID3D11Texture2D>(object) {
        return texture.cast().map_err(convert_error);
    }
    typed::<ID3D11Texture3D>(object)?
        .cast()
        .map_err(convert_error)
}

pub(crate) fn convert_hresult(code: HRESULT) -> DeviceError {
    match code {
        E_OUTOFMEMORY => DeviceError::OutOfMemory,
        E_INVALIDARG | DXGI_ERROR_INVALID_CALL => DeviceError::InvalidParameters,
        DXGI_ERROR_NOT_FOUND => DeviceError::NotFound,
        DXGI_ERROR_DEVICE_REMOVED => DeviceError::DeviceRemoved,
        DXGI_ERROR_WAS_STILL_DRAWING => DeviceError::StillDrawing,
        DXGI_ERROR_NOT_CURRENTLY_AVAILABLE => DeviceError::NotCurrentlyAvailable,
        _ => DeviceError::Unknown,
    }
}

pub(crate) fn convert_error(error: windows::core::Error) -> DeviceError {
    convert_hresult(error.code())
}

/// Out parameter that must have been written on success
pub(crate) fn created<T>(object: Option<T>) -> NativeResult<T> {
    object.ok_or(DeviceError::Unknown)
}
