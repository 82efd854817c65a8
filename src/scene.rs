use anyhow::{Context, Result};
use glam::Vec3;
use log::info;
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::assets::MeshResolver;
use crate::camera::{CameraController, CameraSettings};
use crate::error::SceneError;
use crate::input::{KeyBindings, KeyCode};
use crate::lighting::{LightAnimator, OrbitSpec, PhaseSign, SpotProfile, TrigAxis};
use crate::placement::{DrawableInstance, PlacementRecipe, SceneComposer};

/// Scene shipped with the binary: the concert set lit by five circling spotlights.
pub const BUILTIN_SCENE: &str = include_str!("../scenes/concert.xml");

/// Surface response shared by every drawable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub shininess: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self { shininess: 32.0 }
    }
}

/// Declarative scene description, as authored in XML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Scene {
    pub camera: CameraSettings,
    pub lighting: SpotProfile,
    pub material: Material,
    pub controls: KeyBindings,
    pub lights: Vec<OrbitSpec>,
    pub objects: Vec<SceneObject>,
}

/// Object entry: a mesh identifier plus the recipe that places it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub mesh: String,
    pub recipe: PlacementRecipe,
}

/// Validated, ready-to-run scene state owned by the frame orchestrator.
#[derive(Debug, Clone)]
pub struct SceneContext {
    pub camera: CameraController,
    pub lights: LightAnimator,
    pub composer: SceneComposer,
    pub material: Material,
    pub controls: KeyBindings,
}

impl Scene {
    pub fn builtin() -> Result<Self, SceneError> {
        Self::from_xml(BUILTIN_SCENE)
    }

    /// Parses and validates a scene description.
    pub fn from_xml(xml: &str) -> Result<Self, SceneError> {
        let document = Document::parse(xml)?;
        let root = document.root_element();
        let mut scene = Scene::default();

        if let Some(node) = child(&root, "camera") {
            scene.camera = parse_camera(&node, scene.camera)?;
        }
        if let Some(node) = child(&root, "lighting") {
            scene.lighting = parse_lighting(&node, scene.lighting)?;
        }
        if let Some(node) = child(&root, "material") {
            if let Some(shininess) = f32_tag(&node, "material", "shininess")? {
                scene.material.shininess = shininess;
            }
        }
        if let Some(node) = child(&root, "controls") {
            scene.controls = parse_controls(&node, scene.controls)?;
        }
        for (index, node) in elements(&root, "light").enumerate() {
            scene.lights.push(parse_light(&node, index)?);
        }
        for node in elements(&root, "object") {
            scene.objects.push(parse_object(&node)?);
        }

        scene.validate()?;
        Ok(scene)
    }

    pub fn validate(&self) -> Result<(), SceneError> {
        let camera = &self.camera;
        let camera_values = [
            ("yaw", camera.yaw),
            ("pitch", camera.pitch),
            ("zoom", camera.zoom),
            ("speed", camera.movement_speed),
            ("sensitivity", camera.mouse_sensitivity),
        ];
        for (tag, value) in camera_values {
            if !value.is_finite() {
                return Err(invalid("camera", tag, "finite number", value));
            }
        }
        if !camera.position.is_finite() {
            return Err(invalid("camera", "position", "finite vector", camera.position));
        }
        if camera.world_up.length_squared() < f32::EPSILON || !camera.world_up.is_finite() {
            return Err(invalid("camera", "up", "non-zero vector", camera.world_up));
        }
        if camera.movement_speed < 0.0 {
            return Err(invalid("camera", "speed", "non-negative number", camera.movement_speed));
        }
        let shininess = self.material.shininess;
        if !shininess.is_finite() || shininess <= 0.0 {
            return Err(invalid("material", "shininess", "positive number", shininess));
        }

        LightAnimator::new(self.lights.clone(), self.lighting)?;
        for object in &self.objects {
            object.recipe.validate(&object.name)?;
        }
        Ok(())
    }

    /// Resolves every mesh and builds the runtime state.
    pub fn instantiate(&self, meshes: &mut impl MeshResolver) -> Result<SceneContext> {
        let mut instances = Vec::with_capacity(self.objects.len());
        for object in &self.objects {
            let mesh = meshes
                .resolve(&object.mesh)
                .with_context(|| format!("failed to load mesh for object {}", object.name))?;
            instances.push(DrawableInstance {
                name: object.name.clone(),
                mesh,
                recipe: object.recipe.clone(),
            });
        }

        let context = SceneContext {
            camera: CameraController::new(self.camera),
            lights: LightAnimator::new(self.lights.clone(), self.lighting)?,
            composer: SceneComposer::new(instances)?,
            material: self.material,
            controls: self.controls.clone(),
        };
        info!(
            "scene ready: {} objects, {} lights",
            context.composer.len(),
            context.lights.len()
        );
        Ok(context)
    }
}

fn parse_camera(node: &Node<'_, '_>, mut camera: CameraSettings) -> Result<CameraSettings, SceneError> {
    const CONTEXT: &str = "camera";
    camera.position = vec3_tag(node, CONTEXT, "position")?.unwrap_or(camera.position);
    camera.world_up = vec3_tag(node, CONTEXT, "up")?.unwrap_or(camera.world_up);
    camera.yaw = f32_tag(node, CONTEXT, "yaw")?.unwrap_or(camera.yaw);
    camera.pitch = f32_tag(node, CONTEXT, "pitch")?.unwrap_or(camera.pitch);
    camera.zoom = f32_tag(node, CONTEXT, "zoom")?.unwrap_or(camera.zoom);
    camera.movement_speed = f32_tag(node, CONTEXT, "speed")?.unwrap_or(camera.movement_speed);
    camera.mouse_sensitivity =
        f32_tag(node, CONTEXT, "sensitivity")?.unwrap_or(camera.mouse_sensitivity);
    Ok(camera)
}

fn parse_lighting(node: &Node<'_, '_>, mut profile: SpotProfile) -> Result<SpotProfile, SceneError> {
    const CONTEXT: &str = "lighting";
    profile.movement_speed = f32_tag(node, CONTEXT, "speed")?.unwrap_or(profile.movement_speed);
    profile.inner_degrees = f32_tag(node, CONTEXT, "inner")?.unwrap_or(profile.inner_degrees);
    profile.outer_degrees = f32_tag(node, CONTEXT, "outer")?.unwrap_or(profile.outer_degrees);
    profile.ambient = vec3_tag(node, CONTEXT, "ambient")?.unwrap_or(profile.ambient);
    profile.diffuse = vec3_tag(node, CONTEXT, "diffuse")?.unwrap_or(profile.diffuse);
    profile.specular = vec3_tag(node, CONTEXT, "specular")?.unwrap_or(profile.specular);
    profile.constant = f32_tag(node, CONTEXT, "constant")?.unwrap_or(profile.constant);
    profile.linear = f32_tag(node, CONTEXT, "linear")?.unwrap_or(profile.linear);
    profile.quadratic = f32_tag(node, CONTEXT, "quadratic")?.unwrap_or(profile.quadratic);
    Ok(profile)
}

fn parse_controls(node: &Node<'_, '_>, mut controls: KeyBindings) -> Result<KeyBindings, SceneError> {
    let slots = [
        ("forward", &mut controls.forward),
        ("backward", &mut controls.backward),
        ("left", &mut controls.left),
        ("right", &mut controls.right),
        ("exit", &mut controls.exit),
    ];
    for (tag, slot) in slots {
        let Some(text) = optional_text(node, tag) else {
            continue;
        };
        *slot = text
            .split_whitespace()
            .map(|name| {
                KeyCode::from_name(name).ok_or_else(|| invalid("controls", tag, "key name", name))
            })
            .collect::<Result<_, _>>()?;
    }
    Ok(controls)
}

fn parse_light(node: &Node<'_, '_>, index: usize) -> Result<OrbitSpec, SceneError> {
    let context = format!("light {index}");
    let base_position = vec3_tag(node, &context, "base")?.ok_or_else(|| SceneError::MissingTag {
        context: context.clone(),
        tag: "base",
    })?;
    let mut spec = OrbitSpec::horizontal(base_position, 0.0);
    spec.center = vec3_tag(node, &context, "center")?;
    spec.radius = f32_tag(node, &context, "radius")?.unwrap_or(spec.radius);
    spec.right = vec3_tag(node, &context, "right")?.unwrap_or(spec.right);
    spec.forward = vec3_tag(node, &context, "forward")?.unwrap_or(spec.forward);
    if let Some(sign) = f32_tag(node, &context, "phase")? {
        spec.phase =
            PhaseSign::from_sign(sign).ok_or_else(|| invalid(&context, "phase", "+1 or -1", sign))?;
    }
    if let Some(aim) = child(node, "aim") {
        spec.aim = parse_trig_axis(&aim, &context)?;
    }
    Ok(spec)
}

fn parse_object(node: &Node<'_, '_>) -> Result<SceneObject, SceneError> {
    let name = required_text(node, "object", "name")?;
    let context = format!("object {name}");
    let mesh = required_text(node, &context, "mesh")?;
    let mut recipe = PlacementRecipe::new();
    if let Some(transform) = child(node, "transform") {
        for step in transform.children().filter(Node::is_element) {
            recipe = parse_step(&step, recipe, &name, &context)?;
        }
    }
    Ok(SceneObject { name, mesh, recipe })
}

fn parse_step(
    step: &Node<'_, '_>,
    recipe: PlacementRecipe,
    name: &str,
    context: &str,
) -> Result<PlacementRecipe, SceneError> {
    let tag = step.tag_name().name();
    let recipe = match tag {
        "translate" => recipe.translate(parse_vec3(context, tag, step.text().unwrap_or(""))?),
        "scale" => {
            let text = step.text().unwrap_or("");
            match parse_numbers(context, tag, text)?.as_slice() {
                [factor] => recipe.uniform_scale(*factor),
                [x, y, z] => recipe.scale(Vec3::new(*x, *y, *z)),
                _ => return Err(invalid(context, tag, "1 or 3 numbers", text)),
            }
        }
        "rotate" => {
            let degrees = f32_tag(step, context, "degrees")?.ok_or_else(|| {
                SceneError::MissingTag {
                    context: context.to_string(),
                    tag: "degrees",
                }
            })?;
            let axis = vec3_tag(step, context, "axis")?.ok_or_else(|| SceneError::MissingTag {
                context: context.to_string(),
                tag: "axis",
            })?;
            recipe.rotate_degrees(degrees, axis)
        }
        "spin" => recipe.spin(parse_trig_axis(step, context)?),
        "swing" => recipe.swing(parse_trig_axis(step, context)?),
        other => {
            return Err(SceneError::UnknownStep {
                object: name.to_string(),
                tag: other.to_string(),
            })
        }
    };
    Ok(recipe)
}

fn parse_trig_axis(node: &Node<'_, '_>, context: &str) -> Result<TrigAxis, SceneError> {
    Ok(TrigAxis {
        constant: vec3_tag(node, context, "constant")?.unwrap_or(Vec3::ZERO),
        sin: vec3_tag(node, context, "sin")?.unwrap_or(Vec3::ZERO),
        cos: vec3_tag(node, context, "cos")?.unwrap_or(Vec3::ZERO),
    })
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|c| c.has_tag_name(tag))
}

fn elements<'a, 'input: 'a>(
    node: &Node<'a, 'input>,
    tag: &'a str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.children().filter(move |c| c.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, context: &str, tag: &'static str) -> Result<String, SceneError> {
    optional_text(node, tag).ok_or_else(|| SceneError::MissingTag {
        context: context.to_string(),
        tag,
    })
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn f32_tag(node: &Node<'_, '_>, context: &str, tag: &str) -> Result<Option<f32>, SceneError> {
    optional_text(node, tag)
        .map(|text| {
            text.parse::<f32>()
                .map_err(|_| invalid(context, tag, "number", &text))
        })
        .transpose()
}

fn vec3_tag(node: &Node<'_, '_>, context: &str, tag: &str) -> Result<Option<Vec3>, SceneError> {
    optional_text(node, tag)
        .map(|text| parse_vec3(context, tag, &text))
        .transpose()
}

fn parse_vec3(context: &str, tag: &str, text: &str) -> Result<Vec3, SceneError> {
    match parse_numbers(context, tag, text)?.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(invalid(context, tag, "vector of 3 numbers", text)),
    }
}

fn parse_numbers(context: &str, tag: &str, text: &str) -> Result<Vec<f32>, SceneError> {
    text.split_whitespace()
        .map(|component| {
            component
                .parse::<f32>()
                .map_err(|_| invalid(context, tag, "number", text))
        })
        .collect()
}

fn invalid(context: &str, tag: &str, expected: &'static str, value: impl std::fmt::Debug) -> SceneError {
    let value = format!("{value:?}");
    SceneError::InvalidValue {
        context: context.to_string(),
        tag: tag.to_string(),
        expected,
        value: value.trim_matches('"').to_string(),
    }
}
