//! Per-chunk renderable mesh

use glam::Vec3;

/// Vertex/index arrays consumed by the scene.
///
/// Vertices are never shared: index i refers to vertex i, three per triangle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChunkMesh {
    vertices: Vec<Vec3>,
    indices: Vec<u32>,
    normals: Vec<Vec3>,
    /// Bumped on every replacement
    generation: u32,
}

impl ChunkMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in a freshly triangulated surface and recompute normals
    pub fn replace(&mut self, vertices: Vec<Vec3>, indices: Vec<u32>) {
        debug_assert_eq!(indices.len() % 3, 0);
        self.vertices = vertices;
        self.indices = indices;
        self.recalculate_normals();
        self.generation = self.generation.wrapping_add(1);
    }

    /// Area-weighted vertex normals from the triangle faces
    pub fn recalculate_normals(&mut self) {
        self.normals.clear();
        self.normals.resize(self.vertices.len(), Vec3::ZERO);

        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
            let face = (self.vertices[b] - self.vertices[a]).cross(self.vertices[c] - self.vertices[a]);
            for i in [a, b, c] {
                self.normals[i] += face;
            }
        }

        for normal in &mut self.normals {
            *normal = normal.normalize_or_zero();
        }
    }

    pub fn vertices(&self) -> &[Vec3] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of times the mesh has been replaced
    pub fn generation(&self) -> u32 {
        self.generation
    }
}
