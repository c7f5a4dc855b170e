//! Viewpoint framing: place the observation camera so every object is visible

use serde::{Deserialize, Serialize};

/// Field of view used when the host reports none (about 45 degrees)
pub const DEFAULT_FOV: f64 = 0.785;

/// Padding applied to the largest scene dimension
const PADDING: f64 = 1.2;

/// Camera never sits closer than this multiple of the largest dimension
const MIN_DISTANCE_FACTOR: f64 = 2.0;

const AZIMUTH_DEG: f64 = 45.0;
const ELEVATION_DEG: f64 = 30.0;

/// World-space axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

impl Aabb {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self { min, max }
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        for i in 0..3 {
            out.min[i] = out.min[i].min(other.min[i]);
            out.max[i] = out.max[i].max(other.max[i]);
        }
        out
    }

    pub fn center(&self) -> [f64; 3] {
        [
            (self.min[0] + self.max[0]) / 2.0,
            (self.min[1] + self.max[1]) / 2.0,
            (self.min[2] + self.max[2]) / 2.0,
        ]
    }

    pub fn max_dim(&self) -> f64 {
        (0..3).map(|i| self.max[i] - self.min[i]).fold(0.0, f64::max)
    }
}

/// Camera location and XYZ Euler rotation in radians
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub location: [f64; 3],
    pub rotation: [f64; 3],
}

/// Mesh bounds and camera info reported by the host
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneBounds {
    #[serde(default)]
    pub objects: Vec<ObjectBounds>,

    #[serde(default)]
    pub camera: Option<CameraInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectBounds {
    pub name: String,
    pub min: [f64; 3],
    pub max: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub name: String,
    #[serde(default)]
    pub fov: Option<f64>,
}

/// Union of all boxes; `None` for an empty scene
pub fn union_bounds<'a>(boxes: impl IntoIterator<Item = &'a Aabb>) -> Option<Aabb> {
    boxes.into_iter().fold(None, |acc: Option<Aabb>, b| match acc {
        Some(acc) => Some(acc.union(b)),
        None => Some(*b),
    })
}

/// Rotation pointing the camera's -Z axis from `from` towards `to`, Y up
pub fn look_at(from: [f64; 3], to: [f64; 3]) -> [f64; 3] {
    let dx = to[0] - from[0];
    let dy = to[1] - from[1];
    let dz = to[2] - from[2];
    [dx.hypot(dy).atan2(-dz), 0.0, (-dx).atan2(dy)]
}

/// Pose framing `bounds` with the given field of view
pub fn frame_bounds(bounds: &Aabb, fov: f64) -> CameraPose {
    let center = bounds.center();
    let max_dim = bounds.max_dim();

    let fitted = (max_dim * PADDING) / (2.0 * (fov / 2.0).tan());
    let distance = fitted.max(max_dim * MIN_DISTANCE_FACTOR);

    let azimuth = AZIMUTH_DEG.to_radians();
    let elevation = ELEVATION_DEG.to_radians();
    let location = [
        center[0] + distance * elevation.cos() * azimuth.cos(),
        center[1] - distance * elevation.cos() * azimuth.sin(),
        center[2] + distance * elevation.sin(),
    ];

    CameraPose {
        location,
        rotation: look_at(location, center),
    }
}

/// Pose for the reported scene; `None` when there is nothing to frame or no camera
pub fn compute_pose(scene: &SceneBounds) -> Option<CameraPose> {
    let camera = scene.camera.as_ref()?;
    let boxes: Vec<Aabb> = scene.objects.iter().map(|o| Aabb::new(o.min, o.max)).collect();
    let bounds = union_bounds(&boxes)?;
    let fov = camera.fov.filter(|f| *f > 0.0).unwrap_or(DEFAULT_FOV);
    Some(frame_bounds(&bounds, fov))
}
