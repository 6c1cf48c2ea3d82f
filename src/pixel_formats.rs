// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Pixel formats understood by texture descriptions.
//!
//! Unlike a typed texture API, a texture description is a runtime object: the engine may
//! change its format at any time (which invalidates GPU storage). So the format is an enum
//! carried by value rather than a type parameter.
//!
//! ```
//! use texture_sync::pixel_formats::TextureFormat;
//!
//! assert_eq!(TextureFormat::Rgba8Unorm.bytes_per_pixel(), 4);
//! assert!(TextureFormat::Rgba8Unorm.supports_box_filter());
//! assert!(!TextureFormat::R32Float.supports_box_filter());
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit normalized single channel.
    R8Unorm,
    /// 8-bit normalized, two channels.
    Rg8Unorm,
    Rgba8Unorm,
    /// 4-channel 8-bit normalized with sRGB encoding.
    Rgba8UnormSrgb,
    /// 4-channel 8-bit normalized with sRGB encoding (BGRA order)
    Bgra8UnormSrgb,
    /// 16-bit half-precision float
    R16Float,
    R32Float,
    R32Sint,
    /// 2-channel 32-bit float (8 bytes total)
    Rg32Float,
    /// 4-channel 16-bit normalized (8 bytes total)
    Rgba16Unorm,
    /// 4-channel 32-bit float (16 bytes total)
    Rgba32Float,
}

impl TextureFormat {
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            TextureFormat::R8Unorm => 1,
            TextureFormat::Rg8Unorm => 2,
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8UnormSrgb => 4,
            TextureFormat::R16Float => 2,
            TextureFormat::R32Float | TextureFormat::R32Sint => 4,
            TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba16Unorm => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }

    /**
    Whether mip levels can be produced by averaging bytes.

    This holds for formats whose channels are all 8-bit unorm.  sRGB formats are averaged
    in encoded space, which is what most drivers do for automatic mip generation anyway.
    */
    pub const fn supports_box_filter(&self) -> bool {
        matches!(
            self,
            TextureFormat::R8Unorm
                | TextureFormat::Rg8Unorm
                | TextureFormat::Rgba8Unorm
                | TextureFormat::Rgba8UnormSrgb
                | TextureFormat::Bgra8UnormSrgb
        )
    }
}
