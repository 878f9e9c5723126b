//! Map construction parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;

/// Construction parameters of a voxel map.
///
/// Together these fix the half extent, the voxel size and every buffer
/// capacity. Changing any of them requires a full rebuild
/// (see [`crate::voxel::VoxelMap::reconfigure`]).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Physical edge length of one chunk.
    pub chunk_size: f32,
    /// Voxels per chunk edge (R).
    pub voxel_resolution: u32,
    /// Chunks per lattice edge (C).
    pub chunk_resolution: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2.0,
            voxel_resolution: 8,
            chunk_resolution: 2,
        }
    }
}

impl MapConfig {
    pub fn new(chunk_size: f32, voxel_resolution: u32, chunk_resolution: u32) -> Self {
        Self {
            chunk_size,
            voxel_resolution,
            chunk_resolution,
        }
    }

    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: MapConfig = serde_json::from_str(&data)?;
        config.validate()?;
        log::debug!("Loaded map config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Check the ranges every derived quantity depends on.
    pub fn validate(&self) -> Result<()> {
        if !(self.chunk_size.is_finite() && self.chunk_size > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "chunk_size must be a positive finite number, got {}",
                self.chunk_size
            )));
        }
        if self.voxel_resolution < 2 {
            return Err(Error::InvalidConfig(format!(
                "voxel_resolution must be at least 2, got {}",
                self.voxel_resolution
            )));
        }
        if self.chunk_resolution < 1 {
            return Err(Error::InvalidConfig(
                "chunk_resolution must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Physical size of one voxel.
    pub fn voxel_size(&self) -> f32 {
        self.chunk_size / self.voxel_resolution as f32
    }

    /// Half the lattice edge length; the lattice is centred on the origin.
    pub fn half_extent(&self) -> f32 {
        self.chunk_size * 0.5 * self.chunk_resolution as f32
    }

    /// Total number of chunks (C×C).
    pub fn chunk_count(&self) -> usize {
        (self.chunk_resolution * self.chunk_resolution) as usize
    }

    /// Voxels per chunk (R×R).
    pub fn voxels_per_chunk(&self) -> usize {
        (self.voxel_resolution * self.voxel_resolution) as usize
    }

    /// Scale applied to normalized kernel output.
    pub fn output_scale(&self) -> f32 {
        self.chunk_resolution as f32 * self.chunk_size
    }

    /// Triangle capacity of one chunk's kernel output.
    pub fn max_triangles(&self) -> u32 {
        crate::triangulate::kernel::max_triangles(self.voxel_resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_matches_editor() {
        let config = MapConfig::default();
        assert_eq!(config.chunk_size, 2.0);
        assert_eq!(config.voxel_resolution, 8);
        assert_eq!(config.chunk_resolution, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_derived_quantities() {
        let config = MapConfig::new(2.0, 4, 2);
        assert_eq!(config.voxel_size(), 0.5);
        assert_eq!(config.half_extent(), 2.0);
        assert_eq!(config.chunk_count(), 4);
        assert_eq!(config.voxels_per_chunk(), 16);
        assert_eq!(config.output_scale(), 4.0);
        assert_eq!(config.max_triangles(), 48);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(MapConfig::new(0.0, 8, 2).validate().is_err());
        assert!(MapConfig::new(-1.0, 8, 2).validate().is_err());
        assert!(MapConfig::new(f32::NAN, 8, 2).validate().is_err());
        assert!(MapConfig::new(2.0, 1, 2).validate().is_err());
        assert!(MapConfig::new(2.0, 8, 0).validate().is_err());
        assert!(MapConfig::new(0.5, 2, 1).validate().is_ok());
    }

    #[test]
    fn test_load_partial_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "voxel_resolution": 16 }}"#).unwrap();

        let config = MapConfig::load(file.path()).unwrap();
        assert_eq!(config.voxel_resolution, 16);
        assert_eq!(config.chunk_size, 2.0);
        assert_eq!(config.chunk_resolution, 2);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "chunk_resolution": 0 }}"#).unwrap();

        let err = MapConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = MapConfig::load("/nonexistent/voxmap.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
