//! Binary glTF mesh payloads
//!
//! Meshes travel between the worker and the model pipelines as GLB
//! containers. The worker never edits geometry; it only validates the
//! container and reads enough of it to report sizes.

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use gltf::mesh::Mode;

use crate::error::{Error, Result};

/// GLB container magic
const GLB_MAGIC: &[u8; 4] = b"glTF";

/// Size summary of a mesh
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub meshes: usize,
    pub primitives: usize,
    pub vertices: usize,
    pub faces: usize,
}

impl fmt::Display for MeshStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} vertices, {} faces in {} primitive(s)",
            self.vertices, self.faces, self.primitives
        )
    }
}

/// A validated GLB document
#[derive(Clone)]
pub struct Mesh {
    glb: Vec<u8>,
    stats: MeshStats,
}

impl fmt::Debug for Mesh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mesh")
            .field("bytes", &self.glb.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Mesh {
    /// Parse and validate GLB bytes
    pub fn from_glb(glb: Vec<u8>) -> Result<Self> {
        if glb.len() < 12 || &glb[..4] != GLB_MAGIC {
            return Err(Error::InvalidMesh(
                "payload is not a binary glTF (missing glTF magic)".to_string(),
            ));
        }

        let document =
            gltf::Gltf::from_slice(&glb).map_err(|e| Error::InvalidMesh(e.to_string()))?;

        let mut stats = MeshStats::default();
        for mesh in document.meshes() {
            stats.meshes += 1;
            for primitive in mesh.primitives() {
                stats.primitives += 1;
                let vertices = primitive
                    .get(&gltf::Semantic::Positions)
                    .map(|a| a.count())
                    .unwrap_or(0);
                stats.vertices += vertices;
                if primitive.mode() == Mode::Triangles {
                    let corners = primitive.indices().map(|a| a.count()).unwrap_or(vertices);
                    stats.faces += corners / 3;
                }
            }
        }

        Ok(Self { glb, stats })
    }

    /// Decode a base64 encoded GLB
    pub fn from_base64(data: &str) -> Result<Self> {
        let bytes = STANDARD.decode(data.trim())?;
        Self::from_glb(bytes)
    }

    /// Read a GLB file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_glb(bytes)
    }

    /// Write the GLB to a file
    pub fn export<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path.as_ref(), &self.glb)?;
        Ok(())
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.glb)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.glb
    }

    pub fn stats(&self) -> MeshStats {
        self.stats
    }
}

/// Build a GLB container around a JSON document (no binary chunk)
#[cfg(test)]
pub(crate) fn glb_from_json(json: &str) -> Vec<u8> {
    let mut chunk = json.as_bytes().to_vec();
    while chunk.len() % 4 != 0 {
        chunk.push(b' ');
    }
    let total = 12 + 8 + chunk.len();

    let mut glb = Vec::with_capacity(total);
    glb.extend_from_slice(GLB_MAGIC);
    glb.extend_from_slice(&2u32.to_le_bytes());
    glb.extend_from_slice(&(total as u32).to_le_bytes());
    glb.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
    glb.extend_from_slice(b"JSON");
    glb.extend_from_slice(&chunk);
    glb
}

/// Smallest valid GLB: an asset header and nothing else
#[cfg(test)]
pub(crate) fn empty_glb() -> Vec<u8> {
    glb_from_json(r#"{"asset":{"version":"2.0"}}"#)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRIANGLE: &str = r#"{
        "asset": {"version": "2.0"},
        "accessors": [{
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 0.0]
        }],
        "meshes": [{"primitives": [{"attributes": {"POSITION": 0}}]}]
    }"#;

    #[test]
    fn test_empty_document() {
        let mesh = Mesh::from_glb(empty_glb()).unwrap();
        assert_eq!(mesh.stats(), MeshStats::default());
        assert_eq!(mesh.as_bytes(), empty_glb().as_slice());
    }

    #[test]
    fn test_triangle_stats() {
        let mesh = Mesh::from_glb(glb_from_json(TRIANGLE)).unwrap();
        let stats = mesh.stats();
        assert_eq!(stats.meshes, 1);
        assert_eq!(stats.primitives, 1);
        assert_eq!(stats.vertices, 3);
        assert_eq!(stats.faces, 1);
    }

    #[test]
    fn test_rejects_non_glb() {
        let err = Mesh::from_glb(br#"{"asset":{"version":"2.0"}}"#.to_vec()).unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));

        let err = Mesh::from_glb(b"glTF".to_vec()).unwrap_err();
        assert!(matches!(err, Error::InvalidMesh(_)));
    }

    #[test]
    fn test_base64_and_files() {
        let mesh = Mesh::from_glb(empty_glb()).unwrap();
        let decoded = Mesh::from_base64(&mesh.to_base64()).unwrap();
        assert_eq!(decoded.as_bytes(), mesh.as_bytes());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.glb");
        mesh.export(&path).unwrap();
        let loaded = Mesh::load(&path).unwrap();
        assert_eq!(loaded.as_bytes(), mesh.as_bytes());
    }
}
