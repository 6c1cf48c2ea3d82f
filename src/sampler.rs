// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Sampler state carried by texture descriptions.

The engine describes sampling with its own vocabulary ([Filter], [WrapMode]).  Devices consume
the device-neutral form produced by [WRAP_MODES] and [FILTER_MODES], so each backend only
has to translate [AddressMode] and [FilterMode].
*/

/// How texture coordinates outside `[0,1]` are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    Mirror,
    Clamp,
    Border,
    /// Mirror once around zero, then clamp.
    MirrorOnce,
}

impl WrapMode {
    pub const COUNT: usize = 5;
    const fn index(self) -> usize {
        match self {
            WrapMode::Repeat => 0,
            WrapMode::Mirror => 1,
            WrapMode::Clamp => 2,
            WrapMode::Border => 3,
            WrapMode::MirrorOnce => 4,
        }
    }
    /// The device-neutral address mode for this wrap mode.
    pub const fn address_mode(self) -> AddressMode {
        WRAP_MODES[self.index()]
    }
}

/// Engine filter modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Filter {
    MinMagPoint,
    MinPointMagLinear,
    MinLinearMagPoint,
    MinMagLinear,
    MinMagMipPoint,
    MinMagPointMipLinear,
    MinPointMagLinearMipPoint,
    MinPointMagMipLinear,
    MinLinearMagMipPoint,
    MinLinearMagPointMipLinear,
    MinMagLinearMipPoint,
    #[default]
    MinMagMipLinear,
    Anisotropic,
}

impl Filter {
    pub const COUNT: usize = 13;
    const fn index(self) -> usize {
        self as usize
    }
    pub const fn filter_pair(self) -> FilterPair {
        FILTER_MODES[self.index()]
    }
    pub const fn is_anisotropic(self) -> bool {
        matches!(self, Filter::Anisotropic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    MirroredRepeat,
    ClampToEdge,
    ClampToBorder,
    MirrorClampToEdge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Minification, magnification and mip filtering.  `mipmap` is `None` when only the base
/// level is sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterPair {
    pub min: FilterMode,
    pub mag: FilterMode,
    pub mipmap: Option<FilterMode>,
}

const fn pair(min: FilterMode, mag: FilterMode, mipmap: Option<FilterMode>) -> FilterPair {
    FilterPair { min, mag, mipmap }
}

pub const WRAP_MODES: [AddressMode; WrapMode::COUNT] = [
    AddressMode::Repeat,
    AddressMode::MirroredRepeat,
    AddressMode::ClampToEdge,
    AddressMode::ClampToBorder,
    AddressMode::MirrorClampToEdge,
];

use FilterMode::{Linear, Nearest};

pub const FILTER_MODES: [FilterPair; Filter::COUNT] = [
    pair(Nearest, Nearest, None),
    pair(Nearest, Linear, None),
    pair(Linear, Nearest, None),
    pair(Linear, Linear, None),
    pair(Nearest, Nearest, Some(Nearest)),
    pair(Nearest, Nearest, Some(Linear)),
    pair(Nearest, Linear, Some(Nearest)),
    pair(Nearest, Linear, Some(Linear)),
    pair(Linear, Nearest, Some(Nearest)),
    pair(Linear, Nearest, Some(Linear)),
    pair(Linear, Linear, Some(Nearest)),
    pair(Linear, Linear, Some(Linear)),
    pair(Linear, Linear, Some(Linear)),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

/// Full sampler state of a texture description.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerDescription {
    pub filter: Filter,
    pub wrap_u: WrapMode,
    pub wrap_v: WrapMode,
    pub wrap_w: WrapMode,
    pub border_color: [f32; 4],
    /// Only meaningful with [Filter::Anisotropic].
    pub max_anisotropy: u8,
    pub comparison: Option<ComparisonFunction>,
    /// Bias added to the computed level of detail.
    ///
    /// wgpu samplers have no LOD bias, so [crate::WgpuDevice] ignores it (with a warning when
    /// non-zero); shaders that need it apply it to the sampled level themselves.
    /// [crate::HeadlessDevice] records it unchanged.
    pub mip_offset: f32,
    pub min_lod: f32,
    pub max_lod: f32,
}

impl Default for SamplerDescription {
    fn default() -> Self {
        SamplerDescription {
            filter: Filter::default(),
            wrap_u: WrapMode::default(),
            wrap_v: WrapMode::default(),
            wrap_w: WrapMode::default(),
            border_color: [0.0, 0.0, 0.0, 0.0],
            max_anisotropy: 16,
            comparison: None,
            mip_offset: 0.0,
            min_lod: 0.0,
            max_lod: 32.0,
        }
    }
}

impl SamplerDescription {
    pub fn with_filter(filter: Filter) -> Self {
        SamplerDescription {
            filter,
            ..Default::default()
        }
    }
    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap_u = wrap;
        self.wrap_v = wrap;
        self.wrap_w = wrap;
        self
    }
    pub fn filter_pair(&self) -> FilterPair {
        self.filter.filter_pair()
    }
    pub fn address_modes(&self) -> [AddressMode; 3] {
        [
            self.wrap_u.address_mode(),
            self.wrap_v.address_mode(),
            self.wrap_w.address_mode(),
        ]
    }
    /// Anisotropy to request from the device; 1 unless the filter is anisotropic.
    pub fn effective_anisotropy(&self) -> u8 {
        if self.filter.is_anisotropic() {
            self.max_anisotropy.max(1)
        } else {
            1
        }
    }
}
