//! Light model and light-importance CDF.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Light discriminant, matches the GPU `type` word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Directional = 0,
    Point = 1,
    Rect = 2,
}

/// Scene light.
///
/// Rect lights span `position ± u ± v` and emit along `normalize(u × v)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub u: Vec3,
    pub v: Vec3,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize_or(Vec3::NEG_Z),
            color,
            intensity,
            u: Vec3::ZERO,
            v: Vec3::ZERO,
        }
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::ZERO,
            color,
            intensity,
            u: Vec3::ZERO,
            v: Vec3::ZERO,
        }
    }

    pub fn rect(position: Vec3, u: Vec3, v: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Rect,
            position,
            direction: u.cross(v).normalize_or_zero(),
            color,
            intensity,
            u,
            v,
        }
    }

    /// Emitting area; zero for delta lights.
    pub fn area(&self) -> f32 {
        match self.kind {
            LightKind::Rect => 4.0 * self.u.cross(self.v).length(),
            _ => 0.0,
        }
    }

    /// Photometric weight used for importance sampling.
    pub fn luminance(&self) -> f32 {
        self.intensity * (0.2126 * self.color.x + 0.7152 * self.color.y + 0.0722 * self.color.z)
    }

    pub fn to_gpu(&self) -> GpuLight {
        GpuLight {
            position: self.position.to_array(),
            kind: self.kind as u32,
            direction: self.direction.to_array(),
            intensity: self.intensity,
            color: self.color.to_array(),
            area: self.area(),
            u: self.u.to_array(),
            _pad0: 0,
            v: self.v.to_array(),
            _pad1: 0,
        }
    }
}

/// Light record (20 words).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLight {
    pub position: [f32; 3],
    pub kind: u32,
    pub direction: [f32; 3],
    pub intensity: f32,
    pub color: [f32; 3],
    pub area: f32,
    pub u: [f32; 3],
    pub _pad0: u32,
    pub v: [f32; 3],
    pub _pad1: u32,
}

/// Cumulative distribution over light luminance.
///
/// `cdf[i] = sum(lum[0..=i]) / sum(lum)`, with the last entry pinned to 1.
/// Negative or non-finite luminance counts as zero. When the total is zero
/// every light gets equal probability, `cdf[i] = (i + 1) / n`.
pub fn light_cdf(lights: &[Light]) -> Vec<f32> {
    let n = lights.len();
    if n == 0 {
        return Vec::new();
    }

    let weights: Vec<f32> = lights
        .iter()
        .map(|l| {
            let lum = l.luminance();
            if lum.is_finite() && lum > 0.0 { lum } else { 0.0 }
        })
        .collect();
    let total: f32 = weights.iter().sum();

    let mut cdf = Vec::with_capacity(n);
    if total > 0.0 && total.is_finite() {
        let mut running = 0.0f32;
        for w in &weights {
            running += w;
            cdf.push(running / total);
        }
    } else {
        tracing::debug!(lights = n, "zero total light luminance, using uniform light CDF");
        cdf.extend((1..=n).map(|i| i as f32 / n as f32));
    }
    cdf[n - 1] = 1.0;
    cdf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpu_light_is_20_words() {
        assert_eq!(std::mem::size_of::<GpuLight>(), 80);
    }

    #[test]
    fn test_rect_light_direction_and_area() {
        let l = Light::rect(
            Vec3::new(0.0, 1.0, -2.0),
            Vec3::new(0.4, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.4),
            Vec3::ONE,
            10.0,
        );
        assert!((l.direction - Vec3::NEG_Y).length() < 1e-6);
        assert!((l.area() - 0.64).abs() < 1e-6);
        assert_eq!(l.to_gpu().kind, 2);
    }

    #[test]
    fn test_luminance_weights() {
        let l = Light::point(Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), 2.0);
        assert!((l.luminance() - 1.4304).abs() < 1e-5);
        let white = Light::directional(Vec3::NEG_Z, Vec3::ONE, 5.0);
        assert!((white.luminance() - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_cdf_single_light() {
        let cdf = light_cdf(&[Light::directional(Vec3::NEG_Z, Vec3::ONE, 5.0)]);
        assert_eq!(cdf, vec![1.0]);
    }

    #[test]
    fn test_cdf_monotonic() {
        let lights: Vec<Light> = [3.0, 0.0, 1.0, 6.0]
            .iter()
            .map(|&i| Light::point(Vec3::ZERO, Vec3::ONE, i))
            .collect();
        let cdf = light_cdf(&lights);
        assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
        assert!((cdf[0] - 0.3).abs() < 1e-6);
        assert_eq!(cdf[1], cdf[0]);
        assert_eq!(*cdf.last().unwrap(), 1.0);
    }

    #[test]
    fn test_cdf_zero_luminance_is_uniform() {
        let lights = vec![Light::point(Vec3::ZERO, Vec3::ZERO, 1.0); 4];
        let cdf = light_cdf(&lights);
        assert_eq!(cdf, vec![0.25, 0.5, 0.75, 1.0]);
        assert!(cdf.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_cdf_empty() {
        assert!(light_cdf(&[]).is_empty());
    }
}
