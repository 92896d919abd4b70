//! Scene trait consumed by the light-transport engine, and a simple
//! list-based implementation.

use crate::bsdf::Bsdf;
use crate::error::{SceneError, SceneResult};
use crate::hittable::{Hittable, SurfacePoint};
use crate::light::{AreaLight, Light};
use crate::material::{luminance, Color, DiffuseLight, Material};
use crate::quad::Quad;
use vcm_math::{Aabb, Interval, Ray, Vec2, Vec3};

/// Closest surface hit along a ray.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    pub position: Vec3,
    /// Outward geometric normal
    pub normal: Vec3,
    pub distance: f32,
    /// Radiance emitted back along the ray
    pub emission: Color,
    /// Index of the light this surface belongs to
    pub light_id: Option<usize>,
    pub primitive: usize,
}

impl Intersection {
    pub fn surface_point(&self) -> SurfacePoint {
        SurfacePoint::new(self.position, self.normal)
    }
}

/// A surface point drawn uniformly over the whole scene area.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceSample {
    pub point: SurfacePoint,
    pub primitive: usize,
    /// Density with respect to area
    pub pdf: f32,
}

/// Everything the engine needs to know about the world.
pub trait Scene: Send + Sync {
    fn intersect(&self, ray: &Ray) -> Option<Intersection>;

    /// True if anything blocks `ray` before `max_distance`.
    fn occluded(&self, ray: &Ray, max_distance: f32) -> bool;

    /// BSDF at `hit`, bound to the direction pointing back along the path.
    fn bsdf(&self, hit: &Intersection, incident: Vec3) -> Bsdf;

    fn light_count(&self) -> usize;

    fn light(&self, index: usize) -> &dyn Light;

    fn bounding_box(&self) -> Aabb;

    fn surface_area(&self) -> f32;

    fn sample_surface(&self, primitive_sample: f32, position_sample: Vec2) -> Option<SurfaceSample>;
}

struct Primitive {
    shape: Box<dyn Hittable>,
    material: Box<dyn Material>,
    light_id: Option<usize>,
}

/// Collects shapes, materials and lights, then freezes them into a
/// [`GeometryScene`].
#[derive(Default)]
pub struct SceneBuilder {
    primitives: Vec<Primitive>,
    lights: Vec<AreaLight>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a non-emissive object.
    pub fn add(
        &mut self,
        shape: impl Hittable + 'static,
        material: impl Material + 'static,
    ) -> &mut Self {
        self.primitives.push(Primitive {
            shape: Box::new(shape),
            material: Box::new(material),
            light_id: None,
        });
        self
    }

    /// Add a parallelogram emitter. It is both geometry and a light.
    pub fn add_area_light(&mut self, shape: Quad, radiance: Color) -> &mut Self {
        let light_id = self.lights.len();
        self.lights.push(AreaLight::new(shape.clone(), radiance));
        self.primitives.push(Primitive {
            shape: Box::new(shape),
            material: Box::new(DiffuseLight::new(radiance)),
            light_id: Some(light_id),
        });
        self
    }

    pub fn build(self) -> SceneResult<GeometryScene> {
        if self.primitives.is_empty() {
            return Err(SceneError::NoGeometry);
        }
        for (index, light) in self.lights.iter().enumerate() {
            if light.shape().area() <= 0.0 || luminance(light.radiance()) <= 0.0 {
                return Err(SceneError::DegenerateLight { index });
            }
        }

        let mut area_cdf = Vec::with_capacity(self.primitives.len());
        let mut total_area = 0.0;
        let mut bbox = Aabb::EMPTY;
        for primitive in &self.primitives {
            total_area += primitive.shape.area();
            area_cdf.push(total_area);
            bbox = Aabb::surrounding(&bbox, &primitive.shape.bounding_box());
        }

        log::info!(
            "Scene built: {} primitives, {} lights, area {:.3}",
            self.primitives.len(),
            self.lights.len(),
            total_area
        );

        Ok(GeometryScene {
            primitives: self.primitives,
            lights: self.lights,
            area_cdf,
            total_area,
            bbox,
        })
    }
}

/// Brute-force scene: every ray is tested against every primitive.
pub struct GeometryScene {
    primitives: Vec<Primitive>,
    lights: Vec<AreaLight>,
    area_cdf: Vec<f32>,
    total_area: f32,
    bbox: Aabb,
}

impl GeometryScene {
    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    pub fn lights(&self) -> &[AreaLight] {
        &self.lights
    }
}

impl Scene for GeometryScene {
    fn intersect(&self, ray: &Ray) -> Option<Intersection> {
        let mut closest: Option<(usize, crate::hittable::HitRecord)> = None;
        let mut ray_t = Interval::forward();

        for (index, primitive) in self.primitives.iter().enumerate() {
            if let Some(rec) = primitive.shape.hit(ray, ray_t) {
                ray_t = ray_t.with_max(rec.t);
                closest = Some((index, rec));
            }
        }

        closest.map(|(index, rec)| {
            let primitive = &self.primitives[index];
            let emission = match primitive.light_id {
                Some(_) if rec.front_face => primitive.material.emitted(),
                _ => Color::ZERO,
            };
            Intersection {
                position: rec.p,
                normal: rec.normal,
                distance: rec.t,
                emission,
                light_id: primitive.light_id,
                primitive: index,
            }
        })
    }

    fn occluded(&self, ray: &Ray, max_distance: f32) -> bool {
        let ray_t = Interval::new(0.0, max_distance);
        self.primitives
            .iter()
            .any(|primitive| primitive.shape.hit(ray, ray_t).is_some())
    }

    fn bsdf(&self, hit: &Intersection, incident: Vec3) -> Bsdf {
        let lobe = self.primitives[hit.primitive].material.lobe();
        Bsdf::new(lobe, hit.normal, incident)
    }

    fn light_count(&self) -> usize {
        self.lights.len()
    }

    fn light(&self, index: usize) -> &dyn Light {
        &self.lights[index]
    }

    fn bounding_box(&self) -> Aabb {
        self.bbox
    }

    fn surface_area(&self) -> f32 {
        self.total_area
    }

    fn sample_surface(&self, primitive_sample: f32, position_sample: Vec2) -> Option<SurfaceSample> {
        if self.total_area <= 0.0 {
            return None;
        }
        let target = primitive_sample * self.total_area;
        let index = self
            .area_cdf
            .partition_point(|&c| c <= target)
            .min(self.primitives.len() - 1);
        let point = self.primitives[index].shape.sample_point(position_sample);
        Some(SurfaceSample {
            point,
            primitive: index,
            pdf: 1.0 / self.total_area,
        })
    }
}
