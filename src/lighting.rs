//! Spotlight animation.
//!
//! Every light is re-derived from scratch each frame from its immutable
//! [`OrbitSpec`] and the elapsed time, so the animator keeps no state between
//! frames and the same time always yields the same light set.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::SceneError;

/// Size of the light array exposed by the shading stage.
pub const MAX_LIGHTS: usize = 8;

const DEGENERATE_EPSILON: f32 = 1e-4;

/// Vector valued function of an angle: `constant + sin(a) * sin + cos(a) * cos`.
///
/// Used wherever a direction or offset has to follow the animation phase,
/// e.g. a light's aim or a set piece's tumble axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrigAxis {
    #[serde(default)]
    pub constant: Vec3,
    #[serde(default)]
    pub sin: Vec3,
    #[serde(default)]
    pub cos: Vec3,
}

impl Default for TrigAxis {
    fn default() -> Self {
        Self::fixed(Vec3::NEG_Y)
    }
}

impl TrigAxis {
    pub const fn fixed(value: Vec3) -> Self {
        Self {
            constant: value,
            sin: Vec3::ZERO,
            cos: Vec3::ZERO,
        }
    }

    pub const fn new(constant: Vec3, sin: Vec3, cos: Vec3) -> Self {
        Self { constant, sin, cos }
    }

    pub fn evaluate(&self, angle: f32) -> Vec3 {
        let (sin, cos) = angle.sin_cos();
        self.constant + self.sin * sin + self.cos * cos
    }

    pub fn is_finite(&self) -> bool {
        self.constant.is_finite() && self.sin.is_finite() && self.cos.is_finite()
    }

    /// Returns true when some angle makes the axis evaluate to (nearly) zero.
    ///
    /// The traced curve is an ellipse centred on `constant` spanned by `sin`
    /// and `cos`; the axis vanishes when `-constant` lies on that ellipse.
    pub fn can_vanish(&self) -> bool {
        let target = -self.constant;
        let ss = self.sin.dot(self.sin);
        let kk = self.cos.dot(self.cos);
        let sk = self.sin.dot(self.cos);
        let det = ss * kk - sk * sk;

        if det > f32::EPSILON * (ss * kk).max(f32::EPSILON) {
            let st = self.sin.dot(target);
            let kt = self.cos.dot(target);
            let s = (kk * st - sk * kt) / det;
            let c = (ss * kt - sk * st) / det;
            let residual = (self.sin * s + self.cos * c - target).length();
            return residual < DEGENERATE_EPSILON && ((s * s + c * c) - 1.0).abs() < 1e-3;
        }

        // `sin` and `cos` are collinear, so the curve collapses onto a segment.
        let span = if ss >= kk { self.sin } else { self.cos };
        let Some(dir) = span.try_normalize() else {
            return target.length() < DEGENERATE_EPSILON;
        };
        let amplitude = self.sin.dot(dir).hypot(self.cos.dot(dir));
        let along = target.dot(dir);
        let off_line = (target - dir * along).length();
        off_line < DEGENERATE_EPSILON && along.abs() <= amplitude + DEGENERATE_EPSILON
    }
}

/// Which way round the orbit a light travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PhaseSign {
    #[default]
    Forward,
    Reverse,
}

impl PhaseSign {
    pub fn from_sign(value: f32) -> Option<Self> {
        if value == 1.0 {
            Some(Self::Forward)
        } else if value == -1.0 {
            Some(Self::Reverse)
        } else {
            None
        }
    }

    pub fn sign(self) -> f32 {
        match self {
            Self::Forward => 1.0,
            Self::Reverse => -1.0,
        }
    }
}

/// Immutable description of how one light moves.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitSpec {
    /// Rest position of the light; also the orbit centre unless `center` is set.
    pub base_position: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Vec3>,
    pub right: Vec3,
    pub forward: Vec3,
    pub radius: f32,
    #[serde(default)]
    pub phase: PhaseSign,
    #[serde(default)]
    pub aim: TrigAxis,
}

impl OrbitSpec {
    /// Circular orbit in the XZ plane around `base_position`, aiming straight down.
    pub fn horizontal(base_position: Vec3, radius: f32) -> Self {
        Self {
            base_position,
            center: None,
            right: Vec3::X,
            forward: Vec3::Z,
            radius,
            phase: PhaseSign::Forward,
            aim: TrigAxis::default(),
        }
    }

    pub fn center(&self) -> Vec3 {
        self.center.unwrap_or(self.base_position)
    }

    pub fn position_at(&self, angle: f32) -> Vec3 {
        let (sin, cos) = angle.sin_cos();
        self.center()
            + self.radius * (cos * self.right + self.phase.sign() * sin * self.forward)
    }

    pub fn direction_at(&self, angle: f32) -> Vec3 {
        self.aim.evaluate(angle).normalize_or_zero()
    }

    pub fn validate(&self, index: usize) -> Result<(), SceneError> {
        let invalid = |reason: &str| SceneError::InvalidOrbit {
            index,
            reason: reason.to_string(),
        };
        if !(self.base_position.is_finite()
            && self.center().is_finite()
            && self.right.is_finite()
            && self.forward.is_finite()
            && self.aim.is_finite())
        {
            return Err(invalid("contains a non-finite value"));
        }
        if !self.radius.is_finite() || self.radius < 0.0 {
            return Err(invalid("radius must be finite and non-negative"));
        }
        if self.radius > 0.0
            && (self.right.length_squared() < f32::EPSILON
                || self.forward.length_squared() < f32::EPSILON)
        {
            return Err(invalid("orbit axes must be non-zero"));
        }
        if self.aim.can_vanish() {
            return Err(invalid("aim axis evaluates to zero for some angle"));
        }
        Ok(())
    }
}

/// Photometric and cone settings shared by every animated light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotProfile {
    /// Angular speed of every orbit, in radians per second.
    pub movement_speed: f32,
    pub inner_degrees: f32,
    pub outer_degrees: f32,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for SpotProfile {
    fn default() -> Self {
        Self {
            movement_speed: 0.5,
            inner_degrees: 12.5,
            outer_degrees: 17.5,
            ambient: Vec3::splat(0.1),
            diffuse: Vec3::splat(0.8),
            specular: Vec3::ONE,
            constant: 1.0,
            linear: 0.09,
            quadratic: 0.032,
        }
    }
}

impl SpotProfile {
    pub fn cut_off(&self) -> f32 {
        self.inner_degrees.to_radians().cos()
    }

    pub fn outer_cut_off(&self) -> f32 {
        self.outer_degrees.to_radians().cos()
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        let finite = [
            self.movement_speed,
            self.inner_degrees,
            self.outer_degrees,
            self.constant,
            self.linear,
            self.quadratic,
        ]
        .iter()
        .all(|value| value.is_finite())
            && self.ambient.is_finite()
            && self.diffuse.is_finite()
            && self.specular.is_finite();
        if !finite {
            return Err(SceneError::NonFiniteProfile);
        }
        let cone_in_range = (0.0..90.0).contains(&self.inner_degrees)
            && (0.0..90.0).contains(&self.outer_degrees);
        if !cone_in_range || self.inner_degrees > self.outer_degrees {
            return Err(SceneError::InvertedCone {
                inner: self.inner_degrees,
                outer: self.outer_degrees,
            });
        }
        Ok(())
    }
}

/// Fully derived spotlight for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: Vec3,
    pub direction: Vec3,
    pub cut_off: f32,
    pub outer_cut_off: f32,
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

/// Computes every light for the given time. Pure in all of its inputs.
pub fn animate_lights(time: f32, specs: &[OrbitSpec], profile: &SpotProfile) -> Vec<Light> {
    let angle = time * profile.movement_speed;
    let cut_off = profile.cut_off();
    let outer_cut_off = profile.outer_cut_off();
    specs
        .iter()
        .map(|spec| Light {
            position: spec.position_at(angle),
            direction: spec.direction_at(angle),
            cut_off,
            outer_cut_off,
            ambient: profile.ambient,
            diffuse: profile.diffuse,
            specular: profile.specular,
            constant: profile.constant,
            linear: profile.linear,
            quadratic: profile.quadratic,
        })
        .collect()
}

/// Owns the validated orbit list and the shared spot profile.
#[derive(Debug, Clone, PartialEq)]
pub struct LightAnimator {
    specs: Vec<OrbitSpec>,
    profile: SpotProfile,
}

impl LightAnimator {
    pub fn new(specs: Vec<OrbitSpec>, profile: SpotProfile) -> Result<Self, SceneError> {
        if specs.len() > MAX_LIGHTS {
            return Err(SceneError::TooManyLights {
                count: specs.len(),
                max: MAX_LIGHTS,
            });
        }
        profile.validate()?;
        for (index, spec) in specs.iter().enumerate() {
            spec.validate(index)?;
        }
        Ok(Self { specs, profile })
    }

    pub fn advance(&self, time: f32) -> Vec<Light> {
        animate_lights(time, &self.specs, &self.profile)
    }

    /// Animation phase shared by lights and animated set pieces.
    pub fn angle(&self, time: f32) -> f32 {
        time * self.profile.movement_speed
    }

    pub fn specs(&self) -> &[OrbitSpec] {
        &self.specs
    }

    pub fn profile(&self) -> &SpotProfile {
        &self.profile
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drone_rig() -> Vec<OrbitSpec> {
        let bases = [
            Vec3::new(1.2, 1.0, 2.0),
            Vec3::new(3.0, 2.0, -2.0),
            Vec3::new(2.0, 2.5, 2.0),
            Vec3::new(0.0, 3.0, -3.0),
            Vec3::new(6.0, 1.5, 3.0),
        ];
        bases
            .iter()
            .enumerate()
            .map(|(i, base)| OrbitSpec {
                base_position: *base,
                center: None,
                right: Vec3::NEG_X,
                forward: Vec3::Z,
                radius: 1.0,
                phase: if i % 2 == 0 {
                    PhaseSign::Forward
                } else {
                    PhaseSign::Reverse
                },
                aim: TrigAxis::new(Vec3::NEG_Y, Vec3::NEG_X, Vec3::NEG_Z),
            })
            .collect()
    }

    fn bits(v: Vec3) -> [u32; 3] {
        v.to_array().map(f32::to_bits)
    }

    #[test]
    fn advance_is_deterministic() {
        let animator = LightAnimator::new(drone_rig(), SpotProfile::default()).unwrap();
        for time in [0.0, 0.25, 13.7, -4.0, 1.0e4] {
            let first = animator.advance(time);
            let second = animator.advance(time);
            for (a, b) in first.iter().zip(&second) {
                assert_eq!(bits(a.position), bits(b.position));
                assert_eq!(bits(a.direction), bits(b.direction));
                assert_eq!(a.cut_off.to_bits(), b.cut_off.to_bits());
            }
        }
    }

    #[test]
    fn outer_cone_never_narrower_than_inner() {
        let animator = LightAnimator::new(drone_rig(), SpotProfile::default()).unwrap();
        for step in 0..200 {
            let time = step as f32 * 0.37 - 20.0;
            for light in animator.advance(time) {
                assert!(light.outer_cut_off <= light.cut_off);
            }
        }
    }

    #[test]
    fn horizontal_orbit_starts_on_right_axis() {
        let spec = OrbitSpec {
            center: Some(Vec3::new(0.0, 2.0, 0.0)),
            aim: TrigAxis::new(Vec3::ZERO, Vec3::X, Vec3::Z),
            ..OrbitSpec::horizontal(Vec3::new(1.2, 1.0, 2.0), 5.0)
        };
        let lights = animate_lights(0.0, &[spec], &SpotProfile::default());
        assert!(lights[0].position.abs_diff_eq(Vec3::new(5.0, 2.0, 0.0), 1e-5));
        assert!(lights[0].direction.abs_diff_eq(Vec3::Z, 1e-6));
    }

    #[test]
    fn reverse_phase_mirrors_forward_axis() {
        let forward = OrbitSpec::horizontal(Vec3::ZERO, 2.0);
        let reverse = OrbitSpec {
            phase: PhaseSign::Reverse,
            ..forward
        };
        let angle = std::f32::consts::FRAC_PI_2;
        assert!(forward.position_at(angle).abs_diff_eq(Vec3::new(0.0, 0.0, 2.0), 1e-5));
        assert!(reverse.position_at(angle).abs_diff_eq(Vec3::new(0.0, 0.0, -2.0), 1e-5));
    }

    #[test]
    fn negative_time_is_well_defined() {
        let lights = animate_lights(-100.0, &drone_rig(), &SpotProfile::default());
        assert!(lights.iter().all(|l| l.position.is_finite() && l.direction.is_finite()));
    }

    #[test]
    fn default_profile_matches_reference_constants() {
        let profile = SpotProfile::default();
        assert!((profile.cut_off() - 12.5f32.to_radians().cos()).abs() < 1e-7);
        assert!((profile.outer_cut_off() - 17.5f32.to_radians().cos()).abs() < 1e-7);
        assert_eq!((profile.constant, profile.linear, profile.quadratic), (1.0, 0.09, 0.032));
    }

    #[test]
    fn inverted_cone_is_rejected() {
        let profile = SpotProfile {
            inner_degrees: 20.0,
            outer_degrees: 10.0,
            ..SpotProfile::default()
        };
        assert!(matches!(
            LightAnimator::new(Vec::new(), profile),
            Err(SceneError::InvertedCone { .. })
        ));
    }

    #[test]
    fn too_many_lights_is_rejected() {
        let specs = vec![OrbitSpec::horizontal(Vec3::ZERO, 1.0); MAX_LIGHTS + 1];
        assert!(matches!(
            LightAnimator::new(specs, SpotProfile::default()),
            Err(SceneError::TooManyLights { count: 9, .. })
        ));
    }

    #[test]
    fn vanishing_aim_is_rejected() {
        let spec = OrbitSpec {
            aim: TrigAxis::new(Vec3::X, Vec3::ZERO, Vec3::X),
            ..OrbitSpec::horizontal(Vec3::ZERO, 1.0)
        };
        assert!(spec.validate(0).is_err());
    }

    #[test]
    fn can_vanish_detects_ellipse_through_origin() {
        // (1 + cos a, sin a, 0) touches the origin at a = pi.
        assert!(TrigAxis::new(Vec3::X, Vec3::Y, Vec3::X).can_vanish());
        // (sin a, -1, cos a) stays at least one unit away.
        assert!(!TrigAxis::new(Vec3::NEG_Y, Vec3::X, Vec3::Z).can_vanish());
        assert!(TrigAxis::fixed(Vec3::ZERO).can_vanish());
        assert!(!TrigAxis::fixed(Vec3::NEG_Y).can_vanish());
    }

    #[test]
    fn negative_radius_is_rejected() {
        let spec = OrbitSpec::horizontal(Vec3::ZERO, -1.0);
        assert!(matches!(
            spec.validate(3),
            Err(SceneError::InvalidOrbit { index: 3, .. })
        ));
    }
}
