use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::assets::MeshId;
use crate::error::SceneError;
use crate::lighting::TrigAxis;

/// One affine step of a placement recipe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformStep {
    Translate(Vec3),
    /// Rotation by `angle` radians about `axis` (normalized when applied).
    Rotate { angle: f32, axis: Vec3 },
    Scale(Vec3),
    /// Rotation by the frame's animation angle about `axis(angle)`.
    Spin { axis: TrigAxis },
    /// Translation by `offset(angle)`.
    Swing { offset: TrigAxis },
}

impl TransformStep {
    pub fn matrix(&self, phase: f32) -> Mat4 {
        match *self {
            Self::Translate(offset) => Mat4::from_translation(offset),
            Self::Rotate { angle, axis } => Mat4::from_axis_angle(axis.normalize(), angle),
            Self::Scale(scale) => Mat4::from_scale(scale),
            Self::Spin { axis } => Mat4::from_axis_angle(axis.evaluate(phase).normalize(), phase),
            Self::Swing { offset } => Mat4::from_translation(offset.evaluate(phase)),
        }
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Spin { .. } | Self::Swing { .. })
    }

    fn validate(&self, object: &str, step: usize) -> Result<(), SceneError> {
        let non_finite = || SceneError::NonFinite {
            object: object.to_string(),
            step,
        };
        let degenerate = || SceneError::DegenerateAxis {
            object: object.to_string(),
            step,
        };
        match *self {
            Self::Translate(offset) => {
                if !offset.is_finite() {
                    return Err(non_finite());
                }
            }
            Self::Rotate { angle, axis } => {
                if !angle.is_finite() || !axis.is_finite() {
                    return Err(non_finite());
                }
                if axis.length_squared() < f32::EPSILON {
                    return Err(degenerate());
                }
            }
            Self::Scale(scale) => {
                if !scale.is_finite() {
                    return Err(non_finite());
                }
                if scale.abs().cmplt(Vec3::splat(f32::EPSILON)).any() {
                    return Err(SceneError::ZeroScale {
                        object: object.to_string(),
                        step,
                        scale: scale.to_array(),
                    });
                }
            }
            Self::Spin { axis } => {
                if !axis.is_finite() {
                    return Err(non_finite());
                }
                if axis.can_vanish() {
                    return Err(degenerate());
                }
            }
            Self::Swing { offset } => {
                if !offset.is_finite() {
                    return Err(non_finite());
                }
            }
        }
        Ok(())
    }
}

/// Ordered transform steps, applied left to right onto the identity.
///
/// Each step is right-multiplied onto the running matrix, so in column-vector
/// form the last step is the first one to act on a vertex.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlacementRecipe {
    pub steps: Vec<TransformStep>,
}

impl PlacementRecipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(mut self, offset: Vec3) -> Self {
        self.steps.push(TransformStep::Translate(offset));
        self
    }

    pub fn rotate(mut self, angle: f32, axis: Vec3) -> Self {
        self.steps.push(TransformStep::Rotate { angle, axis });
        self
    }

    pub fn rotate_degrees(self, degrees: f32, axis: Vec3) -> Self {
        self.rotate(degrees.to_radians(), axis)
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.steps.push(TransformStep::Scale(scale));
        self
    }

    pub fn uniform_scale(self, factor: f32) -> Self {
        self.scale(Vec3::splat(factor))
    }

    pub fn spin(mut self, axis: TrigAxis) -> Self {
        self.steps.push(TransformStep::Spin { axis });
        self
    }

    pub fn swing(mut self, offset: TrigAxis) -> Self {
        self.steps.push(TransformStep::Swing { offset });
        self
    }

    /// Folds the steps into a world matrix for the given animation phase.
    pub fn matrix_at(&self, phase: f32) -> Mat4 {
        self.steps
            .iter()
            .fold(Mat4::IDENTITY, |acc, step| acc * step.matrix(phase))
    }

    pub fn is_animated(&self) -> bool {
        self.steps.iter().any(TransformStep::is_animated)
    }

    /// Checks every step, then that the folded matrix can be inverted.
    ///
    /// Translations and rotations preserve volume, so the rest-phase
    /// determinant stands for every phase.
    pub fn validate(&self, object: &str) -> Result<(), SceneError> {
        self.steps
            .iter()
            .enumerate()
            .try_for_each(|(index, step)| step.validate(object, index))?;
        let determinant = self.matrix_at(0.0).determinant();
        if !determinant.is_finite() || determinant.abs() < f32::MIN_POSITIVE {
            return Err(SceneError::Singular {
                object: object.to_string(),
            });
        }
        Ok(())
    }
}

/// One renderable occurrence of a mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawableInstance {
    pub name: String,
    pub mesh: MeshId,
    pub recipe: PlacementRecipe,
}

/// Folds every instance's recipe, preserving declaration order.
pub fn compose(instances: &[DrawableInstance], phase: f32) -> Vec<(MeshId, Mat4)> {
    instances
        .iter()
        .map(|instance| (instance.mesh, instance.recipe.matrix_at(phase)))
        .collect()
}

/// Flat, ordered arena of validated drawable instances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneComposer {
    instances: Vec<DrawableInstance>,
}

impl SceneComposer {
    pub fn new(instances: Vec<DrawableInstance>) -> Result<Self, SceneError> {
        for instance in &instances {
            instance.recipe.validate(&instance.name)?;
        }
        Ok(Self { instances })
    }

    pub fn compose(&self, phase: f32) -> Vec<(MeshId, Mat4)> {
        compose(&self.instances, phase)
    }

    pub fn instances(&self) -> &[DrawableInstance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(name: &str, mesh: usize, recipe: PlacementRecipe) -> DrawableInstance {
        DrawableInstance {
            name: name.to_string(),
            mesh: MeshId::new(mesh),
            recipe,
        }
    }

    // Steps right-multiply like glm, so [Translate(1,0,0), Scale(0.5)] maps the
    // origin to (1,0,0) and [Scale(0.5), Translate(1,0,0)] maps it to (0.5,0,0).
    #[test]
    fn translate_then_scale_keeps_the_translation_unscaled() {
        let offset = Vec3::new(1.0, 0.0, 0.0);
        let translate_first = PlacementRecipe::new().translate(offset).uniform_scale(0.5);
        let scale_first = PlacementRecipe::new().uniform_scale(0.5).translate(offset);

        let a = translate_first.matrix_at(0.0);
        let b = scale_first.matrix_at(0.0);
        assert!(!a.abs_diff_eq(b, 1e-6));
        assert!(a.transform_point3(Vec3::ZERO).abs_diff_eq(offset, 1e-6));
        assert!(b
            .transform_point3(Vec3::ZERO)
            .abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
    }

    #[test]
    fn steps_compose_like_right_multiplication() {
        let recipe = PlacementRecipe::new()
            .translate(Vec3::new(5.5, 0.0, 2.0))
            .rotate_degrees(-45.0, Vec3::Y)
            .uniform_scale(0.03);
        let expected = Mat4::from_translation(Vec3::new(5.5, 0.0, 2.0))
            * Mat4::from_rotation_y((-45.0f32).to_radians())
            * Mat4::from_scale(Vec3::splat(0.03));
        assert!(recipe.matrix_at(0.0).abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn rotation_axis_is_normalized() {
        let unit = PlacementRecipe::new().rotate_degrees(90.0, Vec3::Y);
        let long = PlacementRecipe::new().rotate_degrees(90.0, Vec3::new(0.0, 7.0, 0.0));
        assert!(unit.matrix_at(0.0).abs_diff_eq(long.matrix_at(0.0), 1e-6));
        // Counter-clockwise about +Y takes +X to -Z.
        assert!(unit
            .matrix_at(0.0)
            .transform_vector3(Vec3::X)
            .abs_diff_eq(Vec3::NEG_Z, 1e-6));
    }

    #[test]
    fn compose_preserves_declaration_order() {
        let instances = vec![
            instance("tv", 2, PlacementRecipe::new().translate(Vec3::X)),
            instance("stage", 0, PlacementRecipe::new().translate(Vec3::Y)),
            instance("tv-copy", 2, PlacementRecipe::new().translate(Vec3::Z)),
        ];
        let composed = SceneComposer::new(instances).unwrap().compose(0.0);
        let meshes: Vec<_> = composed.iter().map(|(mesh, _)| mesh.index()).collect();
        assert_eq!(meshes, vec![2, 0, 2]);
        assert_eq!(composed[2].1.w_axis.truncate(), Vec3::Z);
    }

    #[test]
    fn static_recipes_ignore_phase() {
        let recipe = PlacementRecipe::new()
            .translate(Vec3::new(-3.0, 0.0, 0.0))
            .uniform_scale(0.1);
        assert!(!recipe.is_animated());
        assert_eq!(recipe.matrix_at(0.0), recipe.matrix_at(42.0));
    }

    #[test]
    fn animated_recipe_matches_explicit_product() {
        let spin = TrigAxis::new(Vec3::NEG_Y, Vec3::NEG_X, Vec3::NEG_Z);
        let swing = TrigAxis::new(Vec3::ZERO, Vec3::Z, Vec3::NEG_X);
        let recipe = PlacementRecipe::new()
            .translate(Vec3::new(1.2, 1.0, 2.0))
            .spin(spin)
            .swing(swing)
            .uniform_scale(0.05);
        assert!(recipe.is_animated());

        let phase = 0.8f32;
        let axis = Vec3::new(-phase.sin(), -1.0, -phase.cos()).normalize();
        let expected = Mat4::from_translation(Vec3::new(1.2, 1.0, 2.0))
            * Mat4::from_axis_angle(axis, phase)
            * Mat4::from_translation(Vec3::new(-phase.cos(), 0.0, phase.sin()))
            * Mat4::from_scale(Vec3::splat(0.05));
        assert!(recipe.matrix_at(phase).abs_diff_eq(expected, 1e-5));
    }

    #[test]
    fn zero_scale_is_a_configuration_error() {
        let recipe = PlacementRecipe::new()
            .translate(Vec3::X)
            .scale(Vec3::new(1.0, 0.0, 1.0));
        let err = SceneComposer::new(vec![instance("flat", 0, recipe)]).unwrap_err();
        assert!(matches!(err, SceneError::ZeroScale { step: 1, .. }));
    }

    #[test]
    fn vanishing_scale_is_a_configuration_error() {
        let recipe = PlacementRecipe::new().uniform_scale(1e-30);
        assert!(matches!(
            recipe.validate("speck"),
            Err(SceneError::ZeroScale { step: 0, .. })
        ));
    }

    #[test]
    fn stacked_small_scales_must_stay_invertible() {
        let recipe = PlacementRecipe::new()
            .uniform_scale(1e-6)
            .uniform_scale(1e-6)
            .uniform_scale(1e-6);
        assert!(matches!(
            recipe.validate("dust"),
            Err(SceneError::Singular { .. })
        ));
    }

    #[test]
    fn zero_rotation_axis_is_rejected() {
        let recipe = PlacementRecipe::new().rotate(1.0, Vec3::ZERO);
        assert!(matches!(
            recipe.validate("bad"),
            Err(SceneError::DegenerateAxis { step: 0, .. })
        ));
    }

    #[test]
    fn non_finite_translation_is_rejected() {
        let recipe = PlacementRecipe::new().translate(Vec3::new(f32::NAN, 0.0, 0.0));
        assert!(matches!(
            recipe.validate("nan"),
            Err(SceneError::NonFinite { .. })
        ));
    }

    #[test]
    fn valid_recipes_are_invertible() {
        let recipe = PlacementRecipe::new()
            .translate(Vec3::new(3.0, 0.4, 0.005))
            .rotate_degrees(90.0, Vec3::Y)
            .uniform_scale(0.003);
        recipe.validate("dj").unwrap();
        assert!(recipe.matrix_at(0.0).determinant().abs() > 0.0);
    }
}
