use std::collections::HashSet;

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec3};
use log::warn;

use crate::lighting::MAX_LIGHTS;
use crate::uniforms::{LightField, UniformName, UniformValue};

/// GPU layout of one spotlight record; scalars fill the vec3 padding slots.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct SpotLightRaw {
    pub position: [f32; 3],
    pub cut_off: f32,
    pub direction: [f32; 3],
    pub outer_cut_off: f32,
    pub ambient: [f32; 3],
    pub constant: f32,
    pub diffuse: [f32; 3],
    pub linear: f32,
    pub specular: [f32; 3],
    pub quadratic: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct GlobalUniform {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_pos: [f32; 3],
    pub time: f32,
    pub light_count: u32,
    pub shininess: f32,
    pub _pad: [f32; 2],
    pub lights: [SpotLightRaw; MAX_LIGHTS],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub(crate) struct ObjectConstants {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 3],
}

impl ObjectConstants {
    pub fn from_model(model: Mat4) -> Self {
        let normal = Mat3::from_mat4(model).inverse().transpose();
        Self {
            model: model.to_cols_array_2d(),
            normal: mat3_to_3x4(normal),
        }
    }
}

fn mat3_to_3x4(matrix: Mat3) -> [[f32; 4]; 3] {
    let cols = matrix.to_cols_array();
    [
        [cols[0], cols[1], cols[2], 0.0],
        [cols[3], cols[4], cols[5], 0.0],
        [cols[6], cols[7], cols[8], 0.0],
    ]
}

/// Packs named uniform writes into the GPU blocks.
///
/// Unknown names, out-of-range light slots and mistyped values are dropped
/// with a single warning per name.
#[derive(Debug)]
pub(crate) struct UniformBlock {
    globals: GlobalUniform,
    model: Mat4,
    rejected: HashSet<String>,
}

impl Default for UniformBlock {
    fn default() -> Self {
        let mut globals = GlobalUniform::zeroed();
        globals.view = Mat4::IDENTITY.to_cols_array_2d();
        globals.projection = Mat4::IDENTITY.to_cols_array_2d();
        globals.shininess = 32.0;
        Self {
            globals,
            model: Mat4::IDENTITY,
            rejected: HashSet::new(),
        }
    }
}

impl UniformBlock {
    pub fn globals(&self) -> &GlobalUniform {
        &self.globals
    }

    pub fn object(&self) -> ObjectConstants {
        ObjectConstants::from_model(self.model)
    }

    pub fn set(&mut self, name: &str, value: UniformValue) {
        if !self.apply(name, value) && self.rejected.insert(name.to_string()) {
            warn!("ignoring uniform {name} = {value:?}");
        }
    }

    fn apply(&mut self, name: &str, value: UniformValue) -> bool {
        let Some(parsed) = UniformName::parse(name) else {
            return false;
        };
        let globals = &mut self.globals;
        match (parsed, value) {
            (UniformName::Model, UniformValue::Mat4(m)) => self.model = m,
            (UniformName::View, UniformValue::Mat4(m)) => globals.view = m.to_cols_array_2d(),
            (UniformName::Projection, UniformValue::Mat4(m)) => {
                globals.projection = m.to_cols_array_2d()
            }
            (UniformName::ViewPos, UniformValue::Vec3(v)) => globals.view_pos = v.to_array(),
            (UniformName::Time, UniformValue::Float(t)) => globals.time = t,
            (UniformName::LightCount, UniformValue::Int(count)) => {
                globals.light_count = count.clamp(0, MAX_LIGHTS as i32) as u32
            }
            (UniformName::MaterialShininess, UniformValue::Float(s)) => globals.shininess = s,
            (UniformName::Light { index, field }, value) => {
                let Some(light) = globals.lights.get_mut(index) else {
                    return false;
                };
                return apply_light_field(light, field, value);
            }
            _ => return false,
        }
        true
    }
}

fn apply_light_field(light: &mut SpotLightRaw, field: LightField, value: UniformValue) -> bool {
    match (field, value) {
        (LightField::Position, UniformValue::Vec3(v)) => light.position = v.to_array(),
        (LightField::Direction, UniformValue::Vec3(v)) => light.direction = v.to_array(),
        (LightField::Ambient, UniformValue::Vec3(v)) => light.ambient = v.to_array(),
        (LightField::Diffuse, UniformValue::Vec3(v)) => light.diffuse = v.to_array(),
        (LightField::Specular, UniformValue::Vec3(v)) => light.specular = v.to_array(),
        (LightField::CutOff, UniformValue::Float(f)) => light.cut_off = f,
        (LightField::OuterCutOff, UniformValue::Float(f)) => light.outer_cut_off = f,
        (LightField::Constant, UniformValue::Float(f)) => light.constant = f,
        (LightField::Linear, UniformValue::Float(f)) => light.linear = f,
        (LightField::Quadratic, UniformValue::Float(f)) => light.quadratic = f,
        _ => return false,
    }
    true
}

pub(crate) const CLEAR_COLOR: [f64; 3] = [0.05, 0.05, 0.05];

/// Surface colour used in place of a diffuse texture.
const ALBEDO: Vec3 = Vec3::splat(0.8);

pub(crate) fn shader_source() -> String {
    SHADER
        .replace("{MAX_LIGHTS}", &MAX_LIGHTS.to_string())
        .replace(
            "{ALBEDO}",
            &format!("vec3<f32>({:.3}, {:.3}, {:.3})", ALBEDO.x, ALBEDO.y, ALBEDO.z),
        )
}

const SHADER: &str = r#"
struct SpotLight {
    position: vec3<f32>,
    cut_off: f32,
    direction: vec3<f32>,
    outer_cut_off: f32,
    ambient: vec3<f32>,
    constant_term: f32,
    diffuse: vec3<f32>,
    linear_term: f32,
    specular: vec3<f32>,
    quadratic_term: f32,
}

struct GlobalUniform {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    view_pos: vec3<f32>,
    time: f32,
    light_count: u32,
    shininess: f32,
    _pad: vec2<f32>,
    lights: array<SpotLight, {MAX_LIGHTS}>,
}

struct ObjectConstants {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectConstants;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.projection * globals.view * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;

    out.normal = normalize(world_normal);
    return out;
}

fn spot_light(light: SpotLight, normal: vec3<f32>, frag_pos: vec3<f32>, view_dir: vec3<f32>) -> vec3<f32> {
    let albedo = {ALBEDO};
    let to_light = light.position - frag_pos;
    let light_dir = normalize(to_light);

    let diff = max(dot(normal, light_dir), 0.0);
    let reflect_dir = reflect(-light_dir, normal);
    let spec = pow(max(dot(view_dir, reflect_dir), 0.0), globals.shininess);

    let distance = length(to_light);
    let attenuation = 1.0 / (light.constant_term + light.linear_term * distance
        + light.quadratic_term * distance * distance);

    let theta = dot(light_dir, normalize(-light.direction));
    let epsilon = max(light.cut_off - light.outer_cut_off, 0.0001);
    let intensity = clamp((theta - light.outer_cut_off) / epsilon, 0.0, 1.0);

    let ambient = light.ambient * albedo;
    let diffuse = light.diffuse * diff * albedo;
    let specular = light.specular * spec;
    return (ambient + (diffuse + specular) * intensity) * attenuation;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let normal = normalize(input.normal);
    let view_dir = normalize(globals.view_pos - input.world_pos);
    var color = vec3<f32>(0.0);
    let count = min(globals.light_count, {MAX_LIGHTS}u);
    for (var i = 0u; i < count; i = i + 1u) {
        color = color + spot_light(globals.lights[i], normal, input.world_pos, view_dir);
    }
    return vec4<f32>(color, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::light_uniform;

    #[test]
    fn gpu_blocks_match_wgsl_layout() {
        assert_eq!(std::mem::size_of::<SpotLightRaw>(), 80);
        assert_eq!(std::mem::size_of::<GlobalUniform>(), 160 + 80 * MAX_LIGHTS);
        assert_eq!(std::mem::size_of::<ObjectConstants>(), 112);
    }

    #[test]
    fn shader_is_sized_for_max_lights() {
        let source = shader_source();
        assert!(source.contains(&format!("array<SpotLight, {MAX_LIGHTS}>")));
        assert!(!source.contains("{MAX_LIGHTS}"));
        assert!(!source.contains("{ALBEDO}"));
    }

    #[test]
    fn named_writes_land_in_the_right_slots() {
        let mut block = UniformBlock::default();
        block.set("viewPos", UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)));
        block.set("lightCount", UniformValue::Int(3));
        block.set(
            &light_uniform(2, LightField::Direction),
            UniformValue::Vec3(Vec3::NEG_Y),
        );
        block.set(&light_uniform(2, LightField::Quadratic), UniformValue::Float(0.5));

        let globals = block.globals();
        assert_eq!(globals.view_pos, [1.0, 2.0, 3.0]);
        assert_eq!(globals.light_count, 3);
        assert_eq!(globals.lights[2].direction, [0.0, -1.0, 0.0]);
        assert_eq!(globals.lights[2].quadratic, 0.5);
        assert_eq!(globals.lights[0], SpotLightRaw::zeroed());
    }

    #[test]
    fn bad_writes_are_ignored() {
        let mut block = UniformBlock::default();
        let before = *block.globals();
        block.set("view", UniformValue::Float(1.0));
        block.set("lights[99].position", UniformValue::Vec3(Vec3::ONE));
        block.set("lights[0].cutOff", UniformValue::Vec3(Vec3::ONE));
        block.set("nonsense", UniformValue::Int(1));
        assert_eq!(*block.globals(), before);
    }

    #[test]
    fn light_count_is_clamped() {
        let mut block = UniformBlock::default();
        block.set("lightCount", UniformValue::Int(100));
        assert_eq!(block.globals().light_count, MAX_LIGHTS as u32);
        block.set("lightCount", UniformValue::Int(-4));
        assert_eq!(block.globals().light_count, 0);
    }

    #[test]
    fn normal_matrix_undoes_non_uniform_scale() {
        let mut block = UniformBlock::default();
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        block.set("model", UniformValue::Mat4(model));
        let object = block.object();
        assert_eq!(object.model, model.to_cols_array_2d());
        assert_eq!(object.normal[0][0], 0.5);
        assert_eq!(object.normal[1][1], 1.0);
    }
}
