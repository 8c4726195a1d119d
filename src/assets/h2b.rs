//! H2B mesh asset codec
//!
//! H2B is a pre-baked binary form of an `.obj` + `.mtl` pair: one interleaved
//! vertex array, one `u32` index array, a material table and a list of
//! submeshes that each draw a contiguous index range with one material.
//!
//! Layout (little-endian):
//!
//! ```text
//! version tag         4 bytes, 01 00 00 00
//! vertex count        u32
//! index count         u32
//! material count      u32
//! mesh count          u32
//! vertices            vertex count * 36 bytes (position, uvw, normal)
//! indices             index count * u32
//! materials           material count * (80-byte attributes + 10 NUL-terminated strings)
//! batches             material count * (index count u32, index offset u32)
//! meshes              mesh count * (NUL-terminated name, index count u32,
//!                                   index offset u32, material index u32)
//! ```

use std::path::Path;

use bytemuck::Pod;

use crate::{error::AssetError, gfx::device::DrawRange, gfx::vertex::Vertex};

const VERSION: [u8; 4] = [1, 0, 0, 0];
const MAP_COUNT: usize = 9;

/// Surface attributes of one material, copied verbatim into the mesh
/// constant block before each submesh is drawn.
///
/// Every `[f32; 3]` is followed by a scalar so the struct matches the
/// 16-byte field alignment of a shader uniform block.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialAttributes {
    /// Kd
    pub diffuse: [f32; 3],
    /// d
    pub dissolve: f32,
    /// Ks
    pub specular: [f32; 3],
    /// Ns
    pub specular_exponent: f32,
    /// Ka
    pub ambient: [f32; 3],
    pub sharpness: f32,
    /// Tf
    pub transmission_filter: [f32; 3],
    /// Ni
    pub optical_density: f32,
    /// Ke
    pub emissive: [f32; 3],
    pub illumination_model: u32,
}

impl Default for MaterialAttributes {
    fn default() -> Self {
        Self {
            diffuse: [0.8, 0.8, 0.8],
            dissolve: 1.0,
            specular: [0.5, 0.5, 0.5],
            specular_exponent: 32.0,
            ambient: [1.0, 1.0, 1.0],
            sharpness: 60.0,
            transmission_filter: [1.0, 1.0, 1.0],
            optical_density: 1.0,
            emissive: [0.0, 0.0, 0.0],
            illumination_model: 2,
        }
    }
}

/// Texture map references of a material, in file order. Empty strings in the
/// file decode to `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MaterialMaps {
    pub diffuse: Option<String>,
    pub specular: Option<String>,
    pub ambient: Option<String>,
    pub emissive: Option<String>,
    pub specular_exponent: Option<String>,
    pub dissolve: Option<String>,
    pub displacement: Option<String>,
    pub decal: Option<String>,
    pub bump: Option<String>,
}

impl MaterialMaps {
    fn from_slots(mut slots: [Option<String>; MAP_COUNT]) -> Self {
        let mut take = |i: usize| slots[i].take();
        Self {
            diffuse: take(0),
            specular: take(1),
            ambient: take(2),
            emissive: take(3),
            specular_exponent: take(4),
            dissolve: take(5),
            displacement: take(6),
            decal: take(7),
            bump: take(8),
        }
    }

    fn slots(&self) -> [&Option<String>; MAP_COUNT] {
        [
            &self.diffuse,
            &self.specular,
            &self.ambient,
            &self.emissive,
            &self.specular_exponent,
            &self.dissolve,
            &self.displacement,
            &self.decal,
            &self.bump,
        ]
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub name: String,
    pub attributes: MaterialAttributes,
    pub maps: MaterialMaps,
    /// Index range of all geometry using this material.
    pub batch: DrawRange,
}

/// A drawable slice of the index array with its own material.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Submesh {
    pub name: String,
    pub draw: DrawRange,
    pub material_index: u32,
}

/// CPU-side content of one H2B file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshAsset {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub materials: Vec<Material>,
    pub submeshes: Vec<Submesh>,
}

impl MeshAsset {
    /// Reads and decodes an H2B file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Decodes H2B bytes. The result is either a fully validated asset or an
    /// error; nothing is returned half-decoded.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        let mut reader = ByteReader::new(bytes);

        let tag = reader.take(4, "version tag")?;
        if tag != VERSION {
            return Err(AssetError::UnsupportedVersion([tag[0], tag[1], tag[2], tag[3]]));
        }

        let vertex_count = reader.read_u32("vertex count")? as usize;
        let index_count = reader.read_u32("index count")? as usize;
        let material_count = reader.read_u32("material count")? as usize;
        let mesh_count = reader.read_u32("mesh count")? as usize;

        let vertices: Vec<Vertex> = reader.read_pods(vertex_count, "vertices")?;
        let indices: Vec<u32> = reader.read_pods(index_count, "indices")?;

        let mut materials = Vec::with_capacity(material_count.min(reader.remaining()));
        for _ in 0..material_count {
            let attributes = reader.read_pod::<MaterialAttributes>("material attributes")?;
            let name = reader.read_str("material name")?;
            let mut slots: [Option<String>; MAP_COUNT] = Default::default();
            for slot in slots.iter_mut() {
                let map = reader.read_str("material map")?;
                *slot = (!map.is_empty()).then_some(map);
            }
            materials.push(Material {
                name,
                attributes,
                maps: MaterialMaps::from_slots(slots),
                batch: DrawRange::default(),
            });
        }

        for material in materials.iter_mut() {
            material.batch = reader.read_pod::<DrawRange>("batches")?;
        }

        let mut submeshes = Vec::with_capacity(mesh_count.min(reader.remaining()));
        for _ in 0..mesh_count {
            let name = reader.read_str("mesh name")?;
            let draw = reader.read_pod::<DrawRange>("mesh draw range")?;
            let material_index = reader.read_u32("mesh material index")?;
            submeshes.push(Submesh {
                name,
                draw,
                material_index,
            });
        }

        let asset = MeshAsset {
            vertices,
            indices,
            materials,
            submeshes,
        };
        asset.validate()?;
        Ok(asset)
    }

    /// Encodes this asset in the H2B layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&VERSION);
        for count in [
            self.vertices.len(),
            self.indices.len(),
            self.materials.len(),
            self.submeshes.len(),
        ] {
            out.extend_from_slice(&(count as u32).to_le_bytes());
        }
        out.extend_from_slice(bytemuck::cast_slice(&self.vertices));
        out.extend_from_slice(bytemuck::cast_slice(&self.indices));

        for material in &self.materials {
            out.extend_from_slice(bytemuck::bytes_of(&material.attributes));
            push_str(&mut out, &material.name);
            for map in material.maps.slots() {
                push_str(&mut out, map.as_deref().unwrap_or(""));
            }
        }
        for material in &self.materials {
            out.extend_from_slice(bytemuck::bytes_of(&material.batch));
        }
        for submesh in &self.submeshes {
            push_str(&mut out, &submesh.name);
            out.extend_from_slice(bytemuck::bytes_of(&submesh.draw));
            out.extend_from_slice(&submesh.material_index.to_le_bytes());
        }
        out
    }

    /// Material drawn with the given submesh.
    pub fn material_for(&self, submesh: &Submesh) -> Option<&Material> {
        self.materials.get(submesh.material_index as usize)
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    fn validate(&self) -> Result<(), AssetError> {
        for submesh in &self.submeshes {
            if submesh.draw.end() > self.indices.len() as u64 {
                return Err(AssetError::DrawRangeOutOfBounds {
                    name: submesh.name.clone(),
                    start: submesh.draw.index_offset as u64,
                    end: submesh.draw.end(),
                    available: self.indices.len(),
                });
            }
            if self.material_for(submesh).is_none() {
                return Err(AssetError::MaterialOutOfBounds {
                    name: submesh.name.clone(),
                    index: submesh.material_index,
                    available: self.materials.len(),
                });
            }
        }
        if let Some(&index) = self
            .indices
            .iter()
            .find(|&&i| i as usize >= self.vertices.len())
        {
            return Err(AssetError::IndexOutOfBounds {
                index,
                available: self.vertices.len(),
            });
        }
        Ok(())
    }
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Bounds-checked cursor over H2B bytes.
///
/// Multi-byte values are read in host order through `bytemuck`, which matches
/// the little-endian files on every platform wgpu targets.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], AssetError> {
        if len > self.remaining() {
            return Err(AssetError::Truncated(what));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_u32(&mut self, what: &'static str) -> Result<u32, AssetError> {
        self.read_pod(what)
    }

    fn read_pod<T: Pod>(&mut self, what: &'static str) -> Result<T, AssetError> {
        let bytes = self.take(std::mem::size_of::<T>(), what)?;
        Ok(bytemuck::pod_read_unaligned(bytes))
    }

    fn read_pods<T: Pod>(&mut self, count: usize, what: &'static str) -> Result<Vec<T>, AssetError> {
        let len = count
            .checked_mul(std::mem::size_of::<T>())
            .ok_or(AssetError::Truncated(what))?;
        let bytes = self.take(len, what)?;
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    fn read_str(&mut self, what: &'static str) -> Result<String, AssetError> {
        let rest = &self.bytes[self.pos..];
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(AssetError::Truncated(what))?;
        let text = std::str::from_utf8(&rest[..end]).map_err(|_| AssetError::InvalidString)?;
        self.pos += end + 1;
        Ok(text.to_owned())
    }
}
