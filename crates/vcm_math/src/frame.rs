use crate::Vec3;

/// Orthonormal basis around a unit normal.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    pub tangent: Vec3,
    pub bitangent: Vec3,
    pub normal: Vec3,
}

impl Frame {
    /// Build a frame from a unit normal (Duff et al. 2017).
    pub fn from_normal(normal: Vec3) -> Self {
        let sign = 1.0f32.copysign(normal.z);
        let a = -1.0 / (sign + normal.z);
        let b = normal.x * normal.y * a;
        let tangent = Vec3::new(1.0 + sign * normal.x * normal.x * a, sign * b, -sign * normal.x);
        let bitangent = Vec3::new(b, sign + normal.y * normal.y * a, -normal.y);
        Self {
            tangent,
            bitangent,
            normal,
        }
    }

    /// Local coordinates (z along the normal) to world space.
    #[inline]
    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.tangent * local.x + self.bitangent * local.y + self.normal * local.z
    }

    #[inline]
    pub fn to_local(&self, world: Vec3) -> Vec3 {
        Vec3::new(
            world.dot(self.tangent),
            world.dot(self.bitangent),
            world.dot(self.normal),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_is_orthonormal() {
        for n in [
            Vec3::Z,
            -Vec3::Z,
            Vec3::X,
            Vec3::new(0.3, -0.4, 0.8).normalize(),
        ] {
            let frame = Frame::from_normal(n);
            assert!((frame.tangent.length() - 1.0).abs() < 1e-5);
            assert!((frame.bitangent.length() - 1.0).abs() < 1e-5);
            assert!(frame.tangent.dot(frame.normal).abs() < 1e-5);
            assert!(frame.bitangent.dot(frame.normal).abs() < 1e-5);
            assert!(frame.tangent.dot(frame.bitangent).abs() < 1e-5);
        }
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = Frame::from_normal(Vec3::new(0.0, 1.0, 1.0).normalize());
        let v = Vec3::new(0.2, -0.7, 0.4);
        let back = frame.to_world(frame.to_local(v));
        assert!((back - v).length() < 1e-5);
    }
}
