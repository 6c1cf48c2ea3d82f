// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Engine-side texture descriptions.

A [TextureDescription] is what the engine edits: shape, format, sampler and the CPU copy of
each mip face.  It never touches a device.  GPU objects compare themselves against it through
three stamps:

* [TextureDescription::stamp] moves when the storage shape changes (size, format, mip range),
* [TextureDescription::data_stamp] moves when pixel content changes,
* [TextureDescription::sampler_stamp] moves when the sampler is replaced.

Descriptions are shared with the transfer worker, so every mutation goes through `&self`.

```
use texture_sync::description::{TextureDescription, TextureType};
use texture_sync::pixel_formats::TextureFormat;

let description = TextureDescription::builder(TextureType::Tex2D, TextureFormat::Rgba8Unorm, 4, 4)
    .debug_name("checker")
    .build()
    .unwrap();
assert_eq!(description.max_mip(), 2);
let before = description.data_stamp();
description.assign_stored_mip_face(0, 0, vec![255u8; 4 * 4 * 4]).unwrap();
assert!(description.data_stamp() > before);
assert!(description.is_stored_mip_face_available(0, 0));
```
*/

use crate::error::Error;
use crate::pixel_formats::TextureFormat;
use crate::sampler::SamplerDescription;
use crate::sys::lock;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

static NEXT_DESCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    Tex1D,
    Tex2D,
    Tex3D,
    TexCube,
}

impl TextureType {
    pub const fn num_faces(self) -> u8 {
        match self {
            TextureType::TexCube => 6,
            _ => 1,
        }
    }
}

/// Storage shape at one point in time, together with the stamp it was taken at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub min_mip: u16,
    pub max_mip: u16,
    pub stamp: u32,
}

impl Shape {
    /// Last level of the full mip chain for these dimensions.
    pub fn full_chain_max_mip(&self) -> u16 {
        full_chain_max_mip(self.width, self.height, self.depth)
    }

    pub fn mip_dimensions(&self, mip: u16) -> (u32, u32, u32) {
        let shrink = |v: u32| (v >> mip.min(31)).max(1);
        (shrink(self.width), shrink(self.height), shrink(self.depth))
    }

    pub fn mip_face_size(&self, mip: u16) -> usize {
        let (w, h, d) = self.mip_dimensions(mip);
        w as usize * h as usize * d as usize * self.format.bytes_per_pixel()
    }

    /// Bytes needed by every face and every mip in `min_mip..=max_mip`.
    pub fn total_size(&self, num_faces: u8) -> u64 {
        (self.min_mip..=self.max_mip)
            .map(|mip| self.mip_face_size(mip) as u64)
            .sum::<u64>()
            * num_faces as u64
    }
}

fn check_dimensions(
    texture_type: TextureType,
    width: u32,
    height: u32,
    depth: u32,
) -> Result<(), Error> {
    if width == 0 || height == 0 || depth == 0 {
        return Err(Error::EmptyTexture);
    }
    if texture_type == TextureType::TexCube && width != height {
        return Err(Error::NonSquareCube { width, height });
    }
    Ok(())
}

fn full_chain_max_mip(width: u32, height: u32, depth: u32) -> u16 {
    width.max(height).max(depth).max(1).ilog2() as u16
}

#[derive(Debug)]
struct Contents {
    shape: Shape,
    //[face][mip]
    faces: Vec<Vec<Option<Arc<[u8]>>>>,
}

impl Contents {
    fn empty_faces(texture_type: TextureType, levels: u16) -> Vec<Vec<Option<Arc<[u8]>>>> {
        (0..texture_type.num_faces())
            .map(|_| vec![None; levels as usize + 1])
            .collect()
    }
}

pub struct TextureDescription {
    id: u64,
    debug_name: String,
    texture_type: TextureType,
    autogenerate_mips: bool,
    release_cpu_after_upload: bool,
    contents: Mutex<Contents>,
    stamp: AtomicU32,
    data_stamp: AtomicU32,
    sampler: Mutex<SamplerDescription>,
    sampler_stamp: AtomicU32,
}

impl Debug for TextureDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureDescription")
            .field("id", &self.id)
            .field("debug_name", &self.debug_name)
            .field("texture_type", &self.texture_type)
            .field("stamp", &self.stamp)
            .field("data_stamp", &self.data_stamp)
            .finish()
    }
}

impl TextureDescription {
    pub fn builder(
        texture_type: TextureType,
        format: TextureFormat,
        width: u32,
        height: u32,
    ) -> TextureDescriptionBuilder {
        TextureDescriptionBuilder::new(texture_type, format, width, height)
    }

    fn contents(&self) -> MutexGuard<'_, Contents> {
        //a panic while holding this lock cannot leave the contents half-written
        lock(&self.contents)
    }

    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn debug_name(&self) -> &str {
        &self.debug_name
    }
    pub fn texture_type(&self) -> TextureType {
        self.texture_type
    }
    pub fn num_faces(&self) -> u8 {
        self.texture_type.num_faces()
    }
    pub fn is_autogenerate_mips(&self) -> bool {
        self.autogenerate_mips
    }

    pub fn stamp(&self) -> u32 {
        self.stamp.load(Ordering::Acquire)
    }
    pub fn data_stamp(&self) -> u32 {
        self.data_stamp.load(Ordering::Acquire)
    }
    pub fn sampler_stamp(&self) -> u32 {
        self.sampler_stamp.load(Ordering::Acquire)
    }

    /// Current shape, consistent with the stamp it carries.
    pub fn shape(&self) -> Shape {
        self.contents().shape
    }
    pub fn format(&self) -> TextureFormat {
        self.shape().format
    }
    pub fn min_mip(&self) -> u16 {
        self.shape().min_mip
    }
    pub fn max_mip(&self) -> u16 {
        self.shape().max_mip
    }

    pub fn eval_mip_dimensions(&self, mip: u16) -> (u32, u32, u32) {
        self.shape().mip_dimensions(mip)
    }
    pub fn eval_mip_face_size(&self, mip: u16) -> usize {
        self.shape().mip_face_size(mip)
    }
    pub fn eval_total_size(&self) -> u64 {
        self.shape().total_size(self.num_faces())
    }

    pub fn sampler(&self) -> SamplerDescription {
        *lock(&self.sampler)
    }

    pub fn set_sampler(&self, sampler: SamplerDescription) {
        *lock(&self.sampler) = sampler;
        self.sampler_stamp.fetch_add(1, Ordering::AcqRel);
    }

    /**
    Stores the CPU copy of one mip face.

    The data must be exactly [Self::eval_mip_face_size] bytes.  Bumps the data stamp.
    */
    pub fn assign_stored_mip_face(
        &self,
        mip: u16,
        face: u8,
        data: impl Into<Arc<[u8]>>,
    ) -> Result<(), Error> {
        let data = data.into();
        let mut contents = self.contents();
        let expected = contents.shape.mip_face_size(mip);
        let slot = contents
            .faces
            .get_mut(face as usize)
            .and_then(|mips| mips.get_mut(mip as usize))
            .ok_or(Error::InvalidMipFace { mip, face })?;
        if data.len() != expected {
            return Err(Error::DataLengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        *slot = Some(data);
        //bump while the lock is held so readers never see new data with an old stamp
        self.data_stamp.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn is_stored_mip_face_available(&self, mip: u16, face: u8) -> bool {
        self.stored_mip_face(mip, face).is_some()
    }

    pub fn stored_mip_face(&self, mip: u16, face: u8) -> Option<Arc<[u8]>> {
        self.contents()
            .faces
            .get(face as usize)
            .and_then(|mips| mips.get(mip as usize))
            .and_then(|slot| slot.clone())
    }

    /**
    Tells the description that a mip face now lives on the GPU.

    The CPU copy is released unless the description was built to keep it.
    */
    pub fn notify_mip_face_gpu_loaded(&self, mip: u16, face: u8) {
        if !self.release_cpu_after_upload {
            return;
        }
        if let Some(slot) = self
            .contents()
            .faces
            .get_mut(face as usize)
            .and_then(|mips| mips.get_mut(mip as usize))
        {
            *slot = None;
        }
    }

    /// Like [Self::notify_mip_face_gpu_loaded], but keeps the face if it was replaced after `uploaded` was read.
    pub(crate) fn notify_uploaded_mip_face(&self, mip: u16, face: u8, uploaded: &Arc<[u8]>) {
        if !self.release_cpu_after_upload {
            return;
        }
        if let Some(slot) = self
            .contents()
            .faces
            .get_mut(face as usize)
            .and_then(|mips| mips.get_mut(mip as usize))
        {
            if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, uploaded)) {
                *slot = None;
            }
        }
    }

    /**
    Changes the dimensions.  Stored pixels are discarded and the mip range is reset to the
    full chain of the new size.
    */
    pub fn resize(&self, width: u32, height: u32, depth: u32) -> Result<(), Error> {
        check_dimensions(self.texture_type, width, height, depth)?;
        let mut contents = self.contents();
        let max_mip = full_chain_max_mip(width, height, depth);
        let stamp = self.stamp.fetch_add(1, Ordering::AcqRel) + 1;
        contents.shape = Shape {
            width,
            height,
            depth,
            min_mip: 0,
            max_mip,
            stamp,
            ..contents.shape
        };
        contents.faces = Contents::empty_faces(self.texture_type, max_mip);
        self.data_stamp.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Changes the pixel format.  Stored pixels no longer match and are discarded.
    pub fn set_format(&self, format: TextureFormat) {
        let mut contents = self.contents();
        if contents.shape.format == format {
            return;
        }
        let stamp = self.stamp.fetch_add(1, Ordering::AcqRel) + 1;
        contents.shape.format = format;
        contents.shape.stamp = stamp;
        contents.faces = Contents::empty_faces(self.texture_type, contents.shape.full_chain_max_mip());
        self.data_stamp.fetch_add(1, Ordering::AcqRel);
    }

    /// Restricts the levels that get GPU storage.
    pub fn set_mip_range(&self, min_mip: u16, max_mip: u16) -> Result<(), Error> {
        let mut contents = self.contents();
        let limit = contents.shape.full_chain_max_mip();
        if min_mip > max_mip || max_mip > limit {
            return Err(Error::InvalidMipRange {
                min: min_mip,
                max: max_mip,
                limit,
            });
        }
        if contents.shape.min_mip == min_mip && contents.shape.max_mip == max_mip {
            return Ok(());
        }
        let stamp = self.stamp.fetch_add(1, Ordering::AcqRel) + 1;
        contents.shape.min_mip = min_mip;
        contents.shape.max_mip = max_mip;
        contents.shape.stamp = stamp;
        //the faces are still valid, but the new storage needs them uploaded again
        self.data_stamp.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Builder for [TextureDescription].
#[derive(Debug, Clone)]
pub struct TextureDescriptionBuilder {
    texture_type: TextureType,
    format: TextureFormat,
    width: u32,
    height: u32,
    depth: u32,
    mip_range: Option<(u16, u16)>,
    autogenerate_mips: bool,
    release_cpu_after_upload: bool,
    sampler: SamplerDescription,
    debug_name: String,
}

impl TextureDescriptionBuilder {
    pub fn new(texture_type: TextureType, format: TextureFormat, width: u32, height: u32) -> Self {
        Self {
            texture_type,
            format,
            width,
            height,
            depth: 1,
            mip_range: None,
            autogenerate_mips: false,
            release_cpu_after_upload: true,
            sampler: SamplerDescription::default(),
            debug_name: String::new(),
        }
    }

    /// Depth for 3D textures.  Ignored by the GPU wrapper, which rejects 3D textures.
    pub fn depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }

    /// Restrict GPU storage to `min..=max`.  Defaults to the full chain.
    pub fn mip_range(mut self, min: u16, max: u16) -> Self {
        self.mip_range = Some((min, max));
        self
    }

    pub fn autogenerate_mips(mut self, autogenerate: bool) -> Self {
        self.autogenerate_mips = autogenerate;
        self
    }

    /// Keep CPU pixels after they have been uploaded.
    pub fn keep_cpu_copy(mut self) -> Self {
        self.release_cpu_after_upload = false;
        self
    }

    pub fn sampler(mut self, sampler: SamplerDescription) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn debug_name(mut self, debug_name: &str) -> Self {
        self.debug_name = debug_name.to_string();
        self
    }

    pub fn build(self) -> Result<Arc<TextureDescription>, Error> {
        check_dimensions(self.texture_type, self.width, self.height, self.depth)?;
        let limit = full_chain_max_mip(self.width, self.height, self.depth);
        let (min_mip, max_mip) = self.mip_range.unwrap_or((0, limit));
        if min_mip > max_mip || max_mip > limit {
            return Err(Error::InvalidMipRange {
                min: min_mip,
                max: max_mip,
                limit,
            });
        }
        let shape = Shape {
            format: self.format,
            width: self.width,
            height: self.height,
            depth: self.depth,
            min_mip,
            max_mip,
            stamp: 1,
        };
        Ok(Arc::new(TextureDescription {
            id: NEXT_DESCRIPTION_ID.fetch_add(1, Ordering::Relaxed),
            debug_name: self.debug_name,
            texture_type: self.texture_type,
            autogenerate_mips: self.autogenerate_mips,
            release_cpu_after_upload: self.release_cpu_after_upload,
            contents: Mutex::new(Contents {
                shape,
                faces: Contents::empty_faces(self.texture_type, limit),
            }),
            stamp: AtomicU32::new(1),
            //a fresh description counts as defined content, so new GPU objects start outdated
            data_stamp: AtomicU32::new(1),
            sampler: Mutex::new(self.sampler),
            sampler_stamp: AtomicU32::new(1),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba(w: u32, h: u32) -> Arc<TextureDescription> {
        TextureDescription::builder(TextureType::Tex2D, TextureFormat::Rgba8Unorm, w, h)
            .build()
            .unwrap()
    }

    #[test]
    fn total_size_covers_all_faces_and_mips() {
        let d = rgba(4, 4);
        //4x4 + 2x2 + 1x1 texels
        assert_eq!(d.eval_total_size(), (16 + 4 + 1) * 4);

        let cube = TextureDescription::builder(TextureType::TexCube, TextureFormat::R8Unorm, 2, 2)
            .mip_range(1, 1)
            .build()
            .unwrap();
        assert_eq!(cube.num_faces(), 6);
        assert_eq!(cube.eval_total_size(), 6);
    }

    #[test]
    fn cube_faces_must_be_square() {
        assert_eq!(
            TextureDescription::builder(TextureType::TexCube, TextureFormat::R8Unorm, 4, 2)
                .build()
                .unwrap_err(),
            Error::NonSquareCube {
                width: 4,
                height: 2
            }
        );
        let cube = TextureDescription::builder(TextureType::TexCube, TextureFormat::R8Unorm, 4, 4)
            .build()
            .unwrap();
        let stamp = cube.stamp();
        assert_eq!(
            cube.resize(8, 4, 1),
            Err(Error::NonSquareCube {
                width: 8,
                height: 4
            })
        );
        assert_eq!(cube.stamp(), stamp);
        cube.resize(8, 8, 1).unwrap();
        //non-square is fine for plain 2D
        rgba(8, 2);
    }

    #[test]
    fn non_square_mips_clamp_to_one() {
        let d = rgba(8, 2);
        assert_eq!(d.max_mip(), 3);
        assert_eq!(d.eval_mip_dimensions(2), (2, 1, 1));
        assert_eq!(d.eval_mip_dimensions(3), (1, 1, 1));
    }

    #[test]
    fn wrong_length_rejected() {
        let d = rgba(2, 2);
        let stamp = d.data_stamp();
        assert_eq!(
            d.assign_stored_mip_face(0, 0, vec![0u8; 3]),
            Err(Error::DataLengthMismatch {
                expected: 16,
                actual: 3
            })
        );
        assert_eq!(
            d.assign_stored_mip_face(0, 1, vec![0u8; 16]),
            Err(Error::InvalidMipFace { mip: 0, face: 1 })
        );
        assert_eq!(d.data_stamp(), stamp);
    }

    #[test]
    fn resize_moves_stamps_and_drops_pixels() {
        let d = rgba(2, 2);
        d.assign_stored_mip_face(0, 0, vec![1u8; 16]).unwrap();
        let (stamp, data_stamp) = (d.stamp(), d.data_stamp());
        d.resize(4, 4, 1).unwrap();
        assert!(d.stamp() > stamp);
        assert!(d.data_stamp() > data_stamp);
        assert_eq!(d.shape().stamp, d.stamp());
        assert!(!d.is_stored_mip_face_available(0, 0));
        assert_eq!(d.max_mip(), 2);
    }

    #[test]
    fn mip_range_validation() {
        let d = rgba(4, 4);
        assert_eq!(
            d.set_mip_range(1, 3),
            Err(Error::InvalidMipRange {
                min: 1,
                max: 3,
                limit: 2
            })
        );
        let stamp = d.stamp();
        d.set_mip_range(0, 2).unwrap();
        assert_eq!(d.stamp(), stamp, "unchanged range keeps the stamp");
        d.set_mip_range(1, 2).unwrap();
        assert_eq!(d.stamp(), stamp + 1);
    }

    #[test]
    fn gpu_loaded_releases_cpu_copy() {
        let d = rgba(1, 1);
        d.assign_stored_mip_face(0, 0, vec![9u8; 4]).unwrap();
        d.notify_mip_face_gpu_loaded(0, 0);
        assert!(!d.is_stored_mip_face_available(0, 0));

        let kept = TextureDescription::builder(TextureType::Tex2D, TextureFormat::R8Unorm, 1, 1)
            .keep_cpu_copy()
            .build()
            .unwrap();
        kept.assign_stored_mip_face(0, 0, vec![9u8]).unwrap();
        kept.notify_mip_face_gpu_loaded(0, 0);
        assert!(kept.is_stored_mip_face_available(0, 0));
    }

    #[test]
    fn replaced_face_survives_stale_upload_notice() {
        let d = rgba(1, 1);
        d.assign_stored_mip_face(0, 0, vec![1u8; 4]).unwrap();
        let uploaded = d.stored_mip_face(0, 0).unwrap();
        d.assign_stored_mip_face(0, 0, vec![2u8; 4]).unwrap();
        d.notify_uploaded_mip_face(0, 0, &uploaded);
        assert_eq!(&*d.stored_mip_face(0, 0).unwrap(), &[2u8; 4]);
    }
}
