//! Stencil shapes used to fill or carve voxels

use glam::IVec2;

/// Value a stencil writes into the voxels it covers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillType {
    #[default]
    Filled,
    Empty,
}

impl FillType {
    pub const ALL: [FillType; 2] = [FillType::Filled, FillType::Empty];

    /// Voxel state written by this fill
    pub fn value(self) -> bool {
        matches!(self, FillType::Filled)
    }

    /// Tool picker label
    pub fn name(self) -> &'static str {
        match self {
            FillType::Filled => "Filled",
            FillType::Empty => "Empty",
        }
    }
}

/// Stencil outline
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StencilShape {
    #[default]
    Square,
    Circle,
}

impl StencilShape {
    pub const ALL: [StencilShape; 2] = [StencilShape::Square, StencilShape::Circle];

    /// Tool picker label
    pub fn name(self) -> &'static str {
        match self {
            StencilShape::Square => "Square",
            StencilShape::Circle => "Circle",
        }
    }
}

/// Inclusive voxel bounds of a stencil clamped to one chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Footprint {
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
}

/// A shape, fill value and radius centred on a voxel.
///
/// The centre is expressed in the voxel coordinates of whichever chunk the
/// stencil is applied to; the map re-centres it for every affected chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stencil {
    shape: StencilShape,
    fill: FillType,
    /// Radius in voxels
    radius: u32,
    center: IVec2,
}

impl Stencil {
    /// Create a stencil centred on voxel (0, 0)
    pub fn new(shape: StencilShape, fill: FillType, radius: u32) -> Self {
        Self {
            shape,
            fill,
            radius,
            center: IVec2::ZERO,
        }
    }

    pub fn set_center(&mut self, x: i32, y: i32) {
        self.center = IVec2::new(x, y);
    }

    pub fn center(&self) -> IVec2 {
        self.center
    }

    pub fn shape(&self) -> StencilShape {
        self.shape
    }

    pub fn fill(&self) -> FillType {
        self.fill
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Whether a voxel offset (dx, dy) from the centre lies inside the shape
    pub fn contains(&self, dx: i64, dy: i64) -> bool {
        let r = self.radius as i64;
        match self.shape {
            StencilShape::Square => dx.abs() <= r && dy.abs() <= r,
            // Squared distance, no sqrt
            StencilShape::Circle => {
                dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy)) <= r.saturating_mul(r)
            }
        }
    }

    /// Bounding square of the stencil clamped to `[0, resolution)`, or `None`
    /// when it misses the chunk entirely
    pub fn footprint(&self, resolution: u32) -> Option<Footprint> {
        let r = self.radius as i64;
        let max = resolution as i64 - 1;
        let (cx, cy) = (self.center.x as i64, self.center.y as i64);

        let x_start = (cx - r).max(0);
        let x_end = (cx + r).min(max);
        let y_start = (cy - r).max(0);
        let y_end = (cy + r).min(max);

        if x_start > x_end || y_start > y_end {
            return None;
        }

        Some(Footprint {
            x_start: x_start as u32,
            x_end: x_end as u32,
            y_start: y_start as u32,
            y_end: y_end as u32,
        })
    }
}
