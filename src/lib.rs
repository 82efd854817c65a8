//! Per-frame scene composition with animated spotlights.
//!
//! A scene description is turned into a [`SceneContext`] holding a fly
//! camera, a set of orbiting spotlights and a list of placed meshes. The
//! [`FrameOrchestrator`] advances all of them once per frame and streams the
//! resulting uniforms and draws into any [`ShadingStage`]: the wgpu
//! [`Renderer`] for interactive use, or a [`UniformRecorder`] for headless
//! runs and tests.

pub mod app;
pub mod assets;
pub mod camera;
pub mod error;
pub mod frame;
pub mod input;
pub mod lighting;
pub mod obj;
pub mod placement;
pub mod render;
pub mod scene;
pub mod uniforms;

pub use assets::{MeshCatalog, MeshId, MeshLibrary, MeshResolver};
pub use camera::{CameraController, CameraSettings, Movement};
pub use error::SceneError;
pub use frame::{FrameClock, FrameOrchestrator, FrameOutcome, FrameReport, ShadingStage};
pub use input::{InputState, KeyBindings, KeyCode, NamedKey};
pub use lighting::{animate_lights, Light, LightAnimator, OrbitSpec, SpotProfile, MAX_LIGHTS};
pub use obj::ObjMesh;
pub use placement::{compose, DrawableInstance, PlacementRecipe, SceneComposer, TransformStep};
pub use render::Renderer;
pub use scene::{Material, Scene, SceneContext, SceneObject};
pub use uniforms::UniformRecorder;
