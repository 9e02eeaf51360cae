//! Spatial components shared by guards, hostiles, and props.

use serde::{Deserialize, Serialize};

/// 3D vector in world units
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_squared(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        dx * dx + dy * dy + dz * dz
    }

    pub fn distance(&self, other: &Self) -> f32 {
        self.distance_squared(other).sqrt()
    }

    /// Distance on the ground plane, ignoring height.
    pub fn distance_2d(&self, other: &Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
            z: self.z * scalar,
        }
    }
}

/// World position of an entity. Written by the frame loop only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position(pub Vec3);

/// Current velocity in units per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity(pub Vec3);

/// Collision capsule, used to size sweep probes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Capsule {
    pub radius: f32,
    pub half_height: f32,
}

impl Default for Capsule {
    fn default() -> Self {
        Self {
            radius: 34.0,
            half_height: 88.0,
        }
    }
}

impl Capsule {
    /// A thinner, shorter capsule. Never shrinks below zero.
    pub fn inset(&self, radius: f32, half_height: f32) -> Self {
        Self {
            radius: (self.radius - radius).max(0.0),
            half_height: (self.half_height - half_height).max(0.0),
        }
    }
}

/// Display label for logs and the harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Name(pub String);

impl Name {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);

        let sum = a + b;
        assert_eq!(sum.x, 5.0);
        assert_eq!(sum.y, 7.0);
        assert_eq!(sum.z, 9.0);

        let diff = b - a;
        assert_eq!(diff.x, 3.0);

        let scaled = a * 2.0;
        assert_eq!(scaled.x, 2.0);
        assert_eq!(scaled.y, 4.0);
    }

    #[test]
    fn test_distance_2d_ignores_height() {
        let guard = Vec3::new(0.0, 0.0, 0.0);
        let perched = Vec3::new(300.0, 400.0, 900.0);
        assert_eq!(guard.distance_2d(&perched), 500.0);
        assert!(guard.distance(&perched) > 1000.0);
    }

    #[test]
    fn test_capsule_inset_floors_at_zero() {
        let capsule = Capsule {
            radius: 0.5,
            half_height: 88.0,
        };
        let probe = capsule.inset(1.0, 5.0);
        assert_eq!(probe.radius, 0.0);
        assert_eq!(probe.half_height, 83.0);
    }
}
