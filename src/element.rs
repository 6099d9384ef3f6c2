//! Element types a [`Resource`](crate::resource::Resource) can carry.
//!
//! The engine moves opaque numeric arrays; every resource is tagged with one
//! of the closed set of element types below, resolved once at creation time.
//! Host slices enter and leave through [`Element`], which ties each supported
//! Rust scalar to its tag and to [`bytemuck::Pod`] for byte-level access.

use std::fmt;

use crate::error::SurgeError;

/// Scalar type of a resource's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 32-bit IEEE-754 float.
    F32,
    /// 32-bit signed integer.
    I32,
    /// 32-bit unsigned integer.
    U32,
    /// 16-bit signed integer.
    I16,
    /// 16-bit unsigned integer.
    U16,
    /// 8-bit signed integer.
    I8,
    /// 8-bit unsigned integer.
    U8,
}

impl ElementType {
    /// Size of one element in bytes.
    #[must_use]
    pub const fn size_of(self) -> usize {
        match self {
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::I16 | Self::U16 => 2,
            Self::I8 | Self::U8 => 1,
        }
    }

    /// Lowercase type name, matching the Rust scalar spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I8 => "i8",
            Self::U8 => "u8",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Rust scalars that can back a resource.
///
/// Sealed by the closed [`ElementType`] set; implemented for exactly the
/// seven supported scalars.
pub trait Element: bytemuck::Pod + Send + Sync + 'static {
    /// Tag for this scalar.
    const TYPE: ElementType;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;
}
impl Element for i32 {
    const TYPE: ElementType = ElementType::I32;
}
impl Element for u32 {
    const TYPE: ElementType = ElementType::U32;
}
impl Element for i16 {
    const TYPE: ElementType = ElementType::I16;
}
impl Element for u16 {
    const TYPE: ElementType = ElementType::U16;
}
impl Element for i8 {
    const TYPE: ElementType = ElementType::I8;
}
impl Element for u8 {
    const TYPE: ElementType = ElementType::U8;
}

/// Storage-texture format for an image resource with the given element type
/// and channel count.
///
/// Only the storage-capable subset of texture formats is reachable: one and
/// two channels require 32-bit elements, four channels accept 8/16/32-bit
/// integers and 32-bit floats. Three-channel layouts have no storage format
/// on any backend.
///
/// # Errors
///
/// Returns [`SurgeError::Allocation`] for a combination with no
/// storage-capable format.
pub fn storage_format(
    element: ElementType,
    channels: u32,
) -> Result<wgpu::TextureFormat, SurgeError> {
    use wgpu::TextureFormat as Tf;
    let format = match (element, channels) {
        (ElementType::F32, 1) => Tf::R32Float,
        (ElementType::F32, 2) => Tf::Rg32Float,
        (ElementType::F32, 4) => Tf::Rgba32Float,
        (ElementType::U32, 1) => Tf::R32Uint,
        (ElementType::U32, 2) => Tf::Rg32Uint,
        (ElementType::U32, 4) => Tf::Rgba32Uint,
        (ElementType::I32, 1) => Tf::R32Sint,
        (ElementType::I32, 2) => Tf::Rg32Sint,
        (ElementType::I32, 4) => Tf::Rgba32Sint,
        (ElementType::U16, 4) => Tf::Rgba16Uint,
        (ElementType::I16, 4) => Tf::Rgba16Sint,
        (ElementType::U8, 4) => Tf::Rgba8Uint,
        (ElementType::I8, 4) => Tf::Rgba8Sint,
        (element, channels) => {
            return Err(SurgeError::Allocation(format!(
                "no storage texture format for {channels}-channel {element}"
            )));
        }
    };
    Ok(format)
}
