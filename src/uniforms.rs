//! Names and values of the uniforms exchanged with the shading stage.
//!
//! Keys follow the GLSL-style convention the shaders were authored against:
//! `model`, `view`, `projection`, `viewPos`, `time`, `lightCount`,
//! `material.shininess` and `lights[i].<field>`.

use std::fmt;

use anyhow::Result;
use glam::{Mat4, Vec3};

use crate::assets::MeshId;
use crate::frame::ShadingStage;

/// Per-light record fields, in declaration order of the shader struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightField {
    Position,
    Direction,
    CutOff,
    OuterCutOff,
    Ambient,
    Diffuse,
    Specular,
    Constant,
    Linear,
    Quadratic,
}

impl LightField {
    pub const ALL: [Self; 10] = [
        Self::Position,
        Self::Direction,
        Self::CutOff,
        Self::OuterCutOff,
        Self::Ambient,
        Self::Diffuse,
        Self::Specular,
        Self::Constant,
        Self::Linear,
        Self::Quadratic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Direction => "direction",
            Self::CutOff => "cutOff",
            Self::OuterCutOff => "outerCutOff",
            Self::Ambient => "ambient",
            Self::Diffuse => "diffuse",
            Self::Specular => "specular",
            Self::Constant => "constant",
            Self::Linear => "linear",
            Self::Quadratic => "quadratic",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }
}

/// Parsed uniform key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformName {
    Model,
    View,
    Projection,
    ViewPos,
    Time,
    LightCount,
    MaterialShininess,
    Light { index: usize, field: LightField },
}

impl UniformName {
    pub fn parse(name: &str) -> Option<Self> {
        let parsed = match name {
            "model" => Self::Model,
            "view" => Self::View,
            "projection" => Self::Projection,
            "viewPos" => Self::ViewPos,
            "time" => Self::Time,
            "lightCount" => Self::LightCount,
            "material.shininess" => Self::MaterialShininess,
            _ => {
                let rest = name.strip_prefix("lights[")?;
                let (index, field) = rest.split_once("].")?;
                if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                Self::Light {
                    index: index.parse().ok()?,
                    field: LightField::from_name(field)?,
                }
            }
        };
        Some(parsed)
    }
}

impl fmt::Display for UniformName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Model => f.write_str("model"),
            Self::View => f.write_str("view"),
            Self::Projection => f.write_str("projection"),
            Self::ViewPos => f.write_str("viewPos"),
            Self::Time => f.write_str("time"),
            Self::LightCount => f.write_str("lightCount"),
            Self::MaterialShininess => f.write_str("material.shininess"),
            Self::Light { index, field } => write!(f, "lights[{index}].{}", field.as_str()),
        }
    }
}

/// Builds the key for one field of one light record.
pub fn light_uniform(index: usize, field: LightField) -> String {
    UniformName::Light { index, field }.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Int(i32),
    Float(f32),
    Vec3(Vec3),
    Mat4(Mat4),
}

/// Call made against a [`ShadingStage`], as captured by [`UniformRecorder`].
#[derive(Debug, Clone, PartialEq)]
pub enum StageCall {
    UseProgram,
    Set(String, UniformValue),
    Draw(MeshId),
    Present,
}

/// Shading stage that records every call instead of talking to a GPU.
#[derive(Debug, Clone)]
pub struct UniformRecorder {
    aspect: f32,
    calls: Vec<StageCall>,
}

impl Default for UniformRecorder {
    fn default() -> Self {
        Self::new(16.0 / 9.0)
    }
}

impl UniformRecorder {
    pub fn new(aspect: f32) -> Self {
        Self {
            aspect,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[StageCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Most recent value bound to `name`.
    pub fn value(&self, name: &str) -> Option<UniformValue> {
        self.calls.iter().rev().find_map(|call| match call {
            StageCall::Set(key, value) if key == name => Some(*value),
            _ => None,
        })
    }

    /// Every draw paired with the `model` matrix bound at the time it was issued.
    pub fn draws(&self) -> Vec<(MeshId, Option<Mat4>)> {
        let mut model = None;
        let mut draws = Vec::new();
        for call in &self.calls {
            match call {
                StageCall::Set(key, UniformValue::Mat4(matrix)) if key == "model" => {
                    model = Some(*matrix)
                }
                StageCall::Draw(mesh) => draws.push((*mesh, model)),
                _ => {}
            }
        }
        draws
    }

    pub fn presents(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, StageCall::Present))
            .count()
    }

    fn set(&mut self, name: &str, value: UniformValue) {
        self.calls.push(StageCall::Set(name.to_string(), value));
    }
}

impl ShadingStage for UniformRecorder {
    fn aspect_ratio(&self) -> f32 {
        self.aspect
    }

    fn use_program(&mut self) {
        self.calls.push(StageCall::UseProgram);
    }

    fn set_int(&mut self, name: &str, value: i32) {
        self.set(name, UniformValue::Int(value));
    }

    fn set_float(&mut self, name: &str, value: f32) {
        self.set(name, UniformValue::Float(value));
    }

    fn set_vec3(&mut self, name: &str, value: Vec3) {
        self.set(name, UniformValue::Vec3(value));
    }

    fn set_mat4(&mut self, name: &str, value: &Mat4) {
        self.set(name, UniformValue::Mat4(*value));
    }

    fn draw(&mut self, mesh: MeshId) {
        self.calls.push(StageCall::Draw(mesh));
    }

    fn present(&mut self) -> Result<()> {
        self.calls.push(StageCall::Present);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_keys_match_shader_convention() {
        assert_eq!(light_uniform(0, LightField::Position), "lights[0].position");
        assert_eq!(light_uniform(4, LightField::OuterCutOff), "lights[4].outerCutOff");
        assert_eq!(light_uniform(12, LightField::Quadratic), "lights[12].quadratic");
    }

    #[test]
    fn names_round_trip_through_parse() {
        let names = [
            "model",
            "view",
            "projection",
            "viewPos",
            "time",
            "lightCount",
            "material.shininess",
            "lights[3].cutOff",
        ];
        for name in names {
            let parsed = UniformName::parse(name).unwrap();
            assert_eq!(parsed.to_string(), name);
        }
    }

    #[test]
    fn malformed_light_keys_are_rejected() {
        for name in [
            "lights[].position",
            "lights[-1].position",
            "lights[1]position",
            "lights[1].colour",
            "light[1].position",
            "material.diffuse",
        ] {
            assert_eq!(UniformName::parse(name), None, "{name}");
        }
    }

    #[test]
    fn recorder_pairs_draws_with_current_model() {
        let mut recorder = UniformRecorder::default();
        let a = Mat4::from_translation(Vec3::X);
        let b = Mat4::from_translation(Vec3::Y);
        recorder.draw(MeshId::new(9));
        recorder.set_mat4("model", &a);
        recorder.draw(MeshId::new(0));
        recorder.set_mat4("model", &b);
        recorder.draw(MeshId::new(1));
        assert_eq!(
            recorder.draws(),
            vec![
                (MeshId::new(9), None),
                (MeshId::new(0), Some(a)),
                (MeshId::new(1), Some(b)),
            ]
        );
        assert_eq!(recorder.value("model"), Some(UniformValue::Mat4(b)));
    }
}
