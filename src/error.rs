// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Error type shared by the texture wrapper, the transfer helper and the device backends.

use crate::description::TextureType;
use crate::imp::TextureHandle;
use crate::pixel_formats::TextureFormat;
use crate::target::TextureTarget;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The GPU wrapper only understands 2D and cube textures.
    #[error("unsupported texture type {0:?}")]
    UnsupportedTextureType(TextureType),
    #[error("unknown texture handle {0}")]
    UnknownHandle(TextureHandle),
    /// A device call was issued for a texture that is not bound to its target on the calling thread.
    #[error("texture {handle} is not bound to {target:?}")]
    NotBound {
        handle: TextureHandle,
        target: TextureTarget,
    },
    #[error("texture {0} has no storage allocated")]
    NoStorage(TextureHandle),
    #[error("mip {mip} face {face} is outside the allocated storage")]
    InvalidMipFace { mip: u16, face: u8 },
    #[error("expected {expected} bytes of pixel data, got {actual}")]
    DataLengthMismatch { expected: usize, actual: usize },
    #[error("mip range {min}..={max} is invalid (full chain ends at {limit})")]
    InvalidMipRange { min: u16, max: u16, limit: u16 },
    #[error("mip generation is not supported for {0:?}")]
    MipGenerationUnsupported(TextureFormat),
    #[error("texture dimensions must be non-zero")]
    EmptyTexture,
    /// Cube faces are square.
    #[error("cube map faces must be square, got {width}x{height}")]
    NonSquareCube { width: u32, height: u32 },
}
