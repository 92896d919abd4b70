//! Scene services for the VCM light-transport engine.
//!
//! This crate provides:
//!
//! - **Service traits**: [`Scene`], [`Light`], [`Sensor`] as consumed by the engine
//! - **BSDFs**: [`Bsdf`] bound to a surface point and an incident direction
//! - **Reference scene**: spheres, parallelograms, area lights and a pinhole camera
//!
//! # Example
//!
//! ```ignore
//! use vcm_core::presets::cornell_box;
//! use vcm_core::Scene;
//!
//! let (scene, camera) = cornell_box(256, 256)?;
//! println!("{} lights", scene.light_count());
//! ```

pub mod bsdf;
pub mod camera;
pub mod error;
pub mod hittable;
pub mod light;
pub mod material;
pub mod presets;
pub mod quad;
pub mod scene;
pub mod sphere;

// Re-export commonly used types
pub use bsdf::{Bsdf, BsdfEval, BsdfLobe, BsdfSample, ScatteringEvent};
pub use camera::{DirectImportance, PinholeCamera, Sensor};
pub use error::{SceneError, SceneResult};
pub use hittable::{HitRecord, Hittable, SurfacePoint};
pub use light::{AreaLight, DirectIllumination, EmissionPdf, ExitantRay, Light};
pub use material::{luminance, Color, DiffuseLight, Lambertian, Material, Mirror};
pub use quad::Quad;
pub use scene::{GeometryScene, Intersection, Scene, SceneBuilder, SurfaceSample};
pub use sphere::Sphere;

/// Re-export math types from vcm_math
pub use vcm_math::{Aabb, Ray, UVec2, Vec2, Vec3};
