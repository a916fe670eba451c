//! Property layout engine.
//!
//! Given an ordered property schema, computes a packed byte layout
//! (per-property offsets plus total size) honoring per-type alignment,
//! and interprets that layout to encode and decode property-value
//! vectors. Offsets are a pure function of the schema: properties are
//! placed in descending-alignment order (stable for ties) so that no
//! padding is ever needed between properties, and the total size is
//! padded up to a multiple of 4.
//!
//! The whole binary format is written in one byte order, fixed per
//! process by [`Endianness::NATIVE`] and threaded explicitly through
//! every codec call so tests can pin either order.

use crate::error::AnnopackError;
use crate::model::{AnnotationSchema, PropertySpec, PropertyType};

/// Byte order applied uniformly across the packed binary format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// The byte order of the running process.
    pub const NATIVE: Endianness = if cfg!(target_endian = "big") {
        Endianness::Big
    } else {
        Endianness::Little
    };
}

/// Writes a `u32` at `offset` in the given byte order.
#[inline]
pub fn write_u32(buf: &mut [u8], offset: usize, value: u32, endianness: Endianness) {
    let bytes = match endianness {
        Endianness::Little => value.to_le_bytes(),
        Endianness::Big => value.to_be_bytes(),
    };
    buf[offset..offset + 4].copy_from_slice(&bytes);
}

/// Reads a `u32` at `offset` in the given byte order.
#[inline]
pub fn read_u32(buf: &[u8], offset: usize, endianness: Endianness) -> u32 {
    let bytes: [u8; 4] = buf[offset..offset + 4].try_into().unwrap();
    match endianness {
        Endianness::Little => u32::from_le_bytes(bytes),
        Endianness::Big => u32::from_be_bytes(bytes),
    }
}

/// Writes an `f32` at `offset` in the given byte order.
#[inline]
pub fn write_f32(buf: &mut [u8], offset: usize, value: f32, endianness: Endianness) {
    write_u32(buf, offset, value.to_bits(), endianness);
}

/// Reads an `f32` at `offset` in the given byte order.
#[inline]
pub fn read_f32(buf: &[u8], offset: usize, endianness: Endianness) -> f32 {
    f32::from_bits(read_u32(buf, offset, endianness))
}

#[inline]
fn write_u16(buf: &mut [u8], offset: usize, value: u16, endianness: Endianness) {
    let bytes = match endianness {
        Endianness::Little => value.to_le_bytes(),
        Endianness::Big => value.to_be_bytes(),
    };
    buf[offset..offset + 2].copy_from_slice(&bytes);
}

#[inline]
fn read_u16(buf: &[u8], offset: usize, endianness: Endianness) -> u16 {
    let bytes: [u8; 2] = buf[offset..offset + 2].try_into().unwrap();
    match endianness {
        Endianness::Little => u16::from_le_bytes(bytes),
        Endianness::Big => u16::from_be_bytes(bytes),
    }
}

/// Packed byte layout of a property schema.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyLayout {
    /// Total size of one property block, padded to a multiple of 4.
    pub serialized_bytes: usize,

    /// Byte offset of each property, indexed by declaration order.
    pub offsets: Vec<usize>,
}

impl PropertyLayout {
    /// Computes the layout for a schema's property list.
    pub fn new(schema: &AnnotationSchema) -> Self {
        Self::from_specs(&schema.properties)
    }

    /// Computes the layout for an explicit spec list.
    ///
    /// An empty list yields size 0 and makes encode/decode no-ops.
    pub fn from_specs(specs: &[PropertySpec]) -> Self {
        let mut order: Vec<usize> = (0..specs.len()).collect();
        // Stable sort keeps declaration order among equal alignments.
        order.sort_by_key(|&i| std::cmp::Reverse(specs[i].property_type.alignment()));

        let mut offsets = vec![0usize; specs.len()];
        let mut offset = 0usize;
        for &i in &order {
            let ty = specs[i].property_type;
            offset = offset.next_multiple_of(ty.alignment());
            offsets[i] = offset;
            offset += ty.serialized_bytes();
        }

        Self {
            serialized_bytes: offset.next_multiple_of(4),
            offsets,
        }
    }

    /// Encodes `values` (schema order) into `buf` starting at `base`.
    ///
    /// The caller must supply one value per property; the slice at
    /// `base..base + serialized_bytes` must already exist.
    pub fn encode(
        &self,
        specs: &[PropertySpec],
        endianness: Endianness,
        values: &[f64],
        buf: &mut [u8],
        base: usize,
    ) -> Result<(), AnnopackError> {
        if values.len() != specs.len() {
            return Err(AnnopackError::PropertyCountMismatch {
                expected: specs.len(),
                actual: values.len(),
            });
        }
        for (i, spec) in specs.iter().enumerate() {
            let off = base + self.offsets[i];
            let value = values[i];
            match spec.property_type {
                PropertyType::Rgb => {
                    let packed = value as u32;
                    buf[off] = (packed & 0xff) as u8;
                    buf[off + 1] = ((packed >> 8) & 0xff) as u8;
                    buf[off + 2] = ((packed >> 16) & 0xff) as u8;
                }
                PropertyType::Rgba => {
                    let packed = value as u32;
                    buf[off] = (packed & 0xff) as u8;
                    buf[off + 1] = ((packed >> 8) & 0xff) as u8;
                    buf[off + 2] = ((packed >> 16) & 0xff) as u8;
                    buf[off + 3] = ((packed >> 24) & 0xff) as u8;
                }
                PropertyType::Float32 => write_f32(buf, off, value as f32, endianness),
                PropertyType::Int32 => write_u32(buf, off, (value as i32) as u32, endianness),
                PropertyType::Uint32 => write_u32(buf, off, value as u32, endianness),
                PropertyType::Int16 => write_u16(buf, off, (value as i16) as u16, endianness),
                PropertyType::Uint16 => write_u16(buf, off, value as u16, endianness),
                PropertyType::Int8 => {
                    // Declared size is 2; the codec touches one byte and
                    // zeroes the reserved pad.
                    buf[off] = (value as i8) as u8;
                    buf[off + 1] = 0;
                }
                PropertyType::Uint8 => buf[off] = value as u8,
            }
        }
        Ok(())
    }

    /// Decodes one property block at `base` back to schema-order values.
    pub fn decode(
        &self,
        specs: &[PropertySpec],
        endianness: Endianness,
        buf: &[u8],
        base: usize,
    ) -> Vec<f64> {
        specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let off = base + self.offsets[i];
                match spec.property_type {
                    PropertyType::Rgb => {
                        let packed = buf[off] as u32
                            | (buf[off + 1] as u32) << 8
                            | (buf[off + 2] as u32) << 16;
                        packed as f64
                    }
                    PropertyType::Rgba => {
                        let packed = buf[off] as u32
                            | (buf[off + 1] as u32) << 8
                            | (buf[off + 2] as u32) << 16
                            | (buf[off + 3] as u32) << 24;
                        packed as f64
                    }
                    PropertyType::Float32 => read_f32(buf, off, endianness) as f64,
                    PropertyType::Int32 => (read_u32(buf, off, endianness) as i32) as f64,
                    PropertyType::Uint32 => read_u32(buf, off, endianness) as f64,
                    PropertyType::Int16 => (read_u16(buf, off, endianness) as i16) as f64,
                    PropertyType::Uint16 => read_u16(buf, off, endianness) as f64,
                    PropertyType::Int8 => (buf[off] as i8) as f64,
                    PropertyType::Uint8 => buf[off] as f64,
                }
            })
            .collect()
    }
}
