// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Native texture targets and the per-face targets pixel data is uploaded to.

use crate::description::TextureType;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureTarget {
    Texture2D,
    CubeMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceTarget {
    Texture2D,
    CubeMapPositiveX,
    CubeMapNegativeX,
    CubeMapPositiveY,
    CubeMapNegativeY,
    CubeMapPositiveZ,
    CubeMapNegativeZ,
}

/// Upload order of cube faces.  Face `n` of a description maps to `CUBE_FACE_LAYOUT[n]`.
pub const CUBE_FACE_LAYOUT: [FaceTarget; 6] = [
    FaceTarget::CubeMapPositiveX,
    FaceTarget::CubeMapNegativeX,
    FaceTarget::CubeMapPositiveY,
    FaceTarget::CubeMapNegativeY,
    FaceTarget::CubeMapPositiveZ,
    FaceTarget::CubeMapNegativeZ,
];

const SINGLE_FACE: [FaceTarget; 1] = [FaceTarget::Texture2D];

impl TextureTarget {
    pub fn for_type(texture_type: TextureType) -> Result<Self, Error> {
        match texture_type {
            TextureType::Tex2D => Ok(TextureTarget::Texture2D),
            TextureType::TexCube => Ok(TextureTarget::CubeMap),
            other => {
                logwise::warn_sync!(
                    "Unsupported texture type {kind}",
                    kind = logwise::privacy::LogIt(&other)
                );
                Err(Error::UnsupportedTextureType(other))
            }
        }
    }

    pub fn face_targets(self) -> &'static [FaceTarget] {
        match self {
            TextureTarget::Texture2D => &SINGLE_FACE,
            TextureTarget::CubeMap => &CUBE_FACE_LAYOUT,
        }
    }

    pub fn num_faces(self) -> u8 {
        self.face_targets().len() as u8
    }
}

impl FaceTarget {
    /// Array layer the face occupies in layered storage.
    pub fn layer(self) -> u32 {
        match self {
            FaceTarget::Texture2D | FaceTarget::CubeMapPositiveX => 0,
            FaceTarget::CubeMapNegativeX => 1,
            FaceTarget::CubeMapPositiveY => 2,
            FaceTarget::CubeMapNegativeY => 3,
            FaceTarget::CubeMapPositiveZ => 4,
            FaceTarget::CubeMapNegativeZ => 5,
        }
    }

    pub fn target(self) -> TextureTarget {
        match self {
            FaceTarget::Texture2D => TextureTarget::Texture2D,
            _ => TextureTarget::CubeMap,
        }
    }
}
