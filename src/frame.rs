//! One frame of the pipeline: clock, input, light animation, composition and
//! the uniform/draw sequence handed to the shading stage.

use anyhow::Result;
use glam::{Mat4, Vec3};
use log::{debug, trace};

use crate::assets::MeshId;
use crate::camera::Movement;
use crate::input::InputState;
use crate::lighting::Light;
use crate::scene::SceneContext;
use crate::uniforms::{light_uniform, LightField};

/// Consumer of per-frame uniforms and draws.
///
/// Uniforms are addressed by their shader names (see [`crate::uniforms`]);
/// every value set before a `draw` applies to that draw.
pub trait ShadingStage {
    fn aspect_ratio(&self) -> f32;
    fn use_program(&mut self);
    fn set_int(&mut self, name: &str, value: i32);
    fn set_float(&mut self, name: &str, value: f32);
    fn set_vec3(&mut self, name: &str, value: Vec3);
    fn set_mat4(&mut self, name: &str, value: &Mat4);
    fn draw(&mut self, mesh: MeshId);
    fn present(&mut self) -> Result<()>;
}

/// Monotonic frame clock in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameClock {
    current: f32,
    delta: f32,
    started: bool,
}

impl FrameClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances to `now`. Samples that go backwards or are not finite leave
    /// the clock where it is and yield a zero delta.
    pub fn tick(&mut self, now: f32) -> f32 {
        if !now.is_finite() || (self.started && now < self.current) {
            self.delta = 0.0;
            return self.delta;
        }
        self.delta = if self.started { now - self.current } else { 0.0 };
        self.current = now;
        self.started = true;
        self.delta
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn delta(&self) -> f32 {
        self.delta
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Exit,
}

/// What a frame did, for logging and the headless summary.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub time: f32,
    pub delta_time: f32,
    pub lights: Vec<Light>,
    pub draws: Vec<(MeshId, Mat4)>,
    pub outcome: FrameOutcome,
}

/// Drives the camera, lights and composer once per frame.
#[derive(Debug, Clone)]
pub struct FrameOrchestrator {
    scene: SceneContext,
    clock: FrameClock,
}

impl FrameOrchestrator {
    pub fn new(scene: SceneContext) -> Self {
        Self {
            scene,
            clock: FrameClock::new(),
        }
    }

    pub fn scene(&self) -> &SceneContext {
        &self.scene
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Runs one frame at wall-clock time `now` (seconds since start).
    ///
    /// An exit request still renders and presents the current frame; the
    /// caller stops after this frame when the outcome is [`FrameOutcome::Exit`].
    pub fn run_frame(
        &mut self,
        now: f32,
        input: &mut InputState,
        stage: &mut impl ShadingStage,
    ) -> Result<FrameReport> {
        let delta_time = self.clock.tick(now);
        let time = self.clock.current();

        let outcome = self.apply_input(input, delta_time);

        let lights = self.scene.lights.advance(time);
        let angle = self.scene.lights.angle(time);
        let draws = self.scene.composer.compose(angle);

        let camera = &self.scene.camera;
        let projection = camera.projection_matrix(stage.aspect_ratio());
        stage.use_program();
        stage.set_mat4("projection", &projection);
        stage.set_mat4("view", &camera.view_matrix());
        stage.set_vec3("viewPos", camera.position());
        stage.set_float("time", time);
        stage.set_int("lightCount", lights.len() as i32);
        upload_lights(stage, &lights);
        stage.set_float("material.shininess", self.scene.material.shininess);

        for (mesh, model) in &draws {
            stage.set_mat4("model", model);
            stage.draw(*mesh);
        }
        stage.present()?;

        trace!(
            "frame t={time:.3} dt={delta_time:.4}: {} lights, {} draws",
            lights.len(),
            draws.len()
        );
        Ok(FrameReport {
            time,
            delta_time,
            lights,
            draws,
            outcome,
        })
    }

    fn apply_input(&mut self, input: &mut InputState, delta_time: f32) -> FrameOutcome {
        let controls = &self.scene.controls;
        let camera = &mut self.scene.camera;

        let outcome = if input.close_requested() || input.any_down(&controls.exit) {
            debug!("exit requested");
            FrameOutcome::Exit
        } else {
            FrameOutcome::Continue
        };

        if input.take_pointer_reset() {
            camera.reset_pointer();
        }
        for sample in input.take_pointer_samples() {
            camera.process_pointer(sample.x, sample.y);
        }
        let scroll = input.take_scroll();
        if scroll != 0.0 {
            camera.process_scroll(scroll);
        }
        for movement in [
            Movement::Forward,
            Movement::Backward,
            Movement::Left,
            Movement::Right,
        ] {
            if input.any_down(controls.keys_for(movement)) {
                camera.process_movement(movement, delta_time);
            }
        }
        outcome
    }
}

/// Sets every field of every light record, `lights[i].<field>`.
pub fn upload_lights(stage: &mut impl ShadingStage, lights: &[Light]) {
    for (index, light) in lights.iter().enumerate() {
        for field in LightField::ALL {
            let name = light_uniform(index, field);
            match field {
                LightField::Position => stage.set_vec3(&name, light.position),
                LightField::Direction => stage.set_vec3(&name, light.direction),
                LightField::CutOff => stage.set_float(&name, light.cut_off),
                LightField::OuterCutOff => stage.set_float(&name, light.outer_cut_off),
                LightField::Ambient => stage.set_vec3(&name, light.ambient),
                LightField::Diffuse => stage.set_vec3(&name, light.diffuse),
                LightField::Specular => stage.set_vec3(&name, light.specular),
                LightField::Constant => stage.set_float(&name, light.constant),
                LightField::Linear => stage.set_float(&name, light.linear),
                LightField::Quadratic => stage.set_float(&name, light.quadratic),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::MeshCatalog;
    use crate::input::{KeyCode, NamedKey};
    use crate::scene::Scene;
    use crate::uniforms::{StageCall, UniformRecorder, UniformValue};

    fn orchestrator() -> FrameOrchestrator {
        let scene = Scene::builtin().unwrap();
        let mut catalog = MeshCatalog::new();
        FrameOrchestrator::new(scene.instantiate(&mut catalog).unwrap())
    }

    #[test]
    fn clock_is_monotonic() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(0.5), 0.0);
        assert_eq!(clock.current(), 0.5);
        assert!((clock.tick(0.75) - 0.25).abs() < 1e-6);
        assert_eq!(clock.tick(0.6), 0.0);
        assert_eq!(clock.current(), 0.75);
        assert_eq!(clock.tick(f32::NAN), 0.0);
        assert_eq!(clock.current(), 0.75);
    }

    #[test]
    fn every_draw_is_preceded_by_its_model_matrix() {
        let mut frame = orchestrator();
        let mut input = InputState::new();
        let mut stage = UniformRecorder::default();
        let report = frame.run_frame(1.0, &mut input, &mut stage).unwrap();

        let draws = stage.draws();
        assert_eq!(draws.len(), report.draws.len());
        for ((mesh, model), (recorded_mesh, recorded_model)) in report.draws.iter().zip(draws) {
            assert_eq!(*mesh, recorded_mesh);
            assert_eq!(Some(*model), recorded_model);
        }
        assert_eq!(stage.calls().first(), Some(&StageCall::UseProgram));
        assert_eq!(stage.calls().last(), Some(&StageCall::Present));
        assert_eq!(report.outcome, FrameOutcome::Continue);
    }

    #[test]
    fn frame_uploads_every_light_field() {
        let mut frame = orchestrator();
        let mut stage = UniformRecorder::default();
        let report = frame
            .run_frame(2.0, &mut InputState::new(), &mut stage)
            .unwrap();

        assert_eq!(
            stage.value("lightCount"),
            Some(UniformValue::Int(report.lights.len() as i32))
        );
        for index in 0..report.lights.len() {
            for field in LightField::ALL {
                assert!(stage.value(&light_uniform(index, field)).is_some());
            }
        }
        assert_eq!(
            stage.value("lights[1].position"),
            Some(UniformValue::Vec3(report.lights[1].position))
        );
        assert_eq!(
            stage.value("material.shininess"),
            Some(UniformValue::Float(32.0))
        );
        assert_eq!(stage.value("time"), Some(UniformValue::Float(2.0)));
    }

    #[test]
    fn exit_key_finishes_the_frame_then_exits() {
        let mut frame = orchestrator();
        let mut input = InputState::new();
        input.set_key_down(KeyCode::Named(NamedKey::Escape));
        let mut stage = UniformRecorder::default();
        let report = frame.run_frame(0.0, &mut input, &mut stage).unwrap();
        assert_eq!(report.outcome, FrameOutcome::Exit);
        assert_eq!(stage.presents(), 1);
    }

    #[test]
    fn close_request_exits() {
        let mut frame = orchestrator();
        let mut input = InputState::new();
        input.request_close();
        let report = frame
            .run_frame(0.0, &mut input, &mut UniformRecorder::default())
            .unwrap();
        assert_eq!(report.outcome, FrameOutcome::Exit);
    }

    #[test]
    fn held_keys_move_by_elapsed_time() {
        let mut frame = orchestrator();
        let mut input = InputState::new();
        let mut stage = UniformRecorder::default();
        let start = frame.scene().camera.position();
        let front = frame.scene().camera.front();

        frame.run_frame(0.0, &mut input, &mut stage).unwrap();
        input.set_key_down(KeyCode::Character('W'));
        frame.run_frame(0.5, &mut input, &mut stage).unwrap();

        let expected = start + front * 5.0 * 0.5;
        assert!(frame.scene().camera.position().abs_diff_eq(expected, 1e-4));
        assert_eq!(
            stage.value("viewPos"),
            Some(UniformValue::Vec3(frame.scene().camera.position()))
        );
    }

    #[test]
    fn pointer_samples_turn_the_camera() {
        let mut frame = orchestrator();
        let mut input = InputState::new();
        let mut stage = UniformRecorder::default();
        let yaw = frame.scene().camera.yaw();

        input.push_pointer(glam::Vec2::new(100.0, 100.0));
        input.push_pointer(glam::Vec2::new(120.0, 100.0));
        frame.run_frame(0.0, &mut input, &mut stage).unwrap();
        assert!((frame.scene().camera.yaw() - (yaw + 2.0)).abs() < 1e-4);

        input.reset_pointer();
        input.push_pointer(glam::Vec2::new(500.0, 100.0));
        frame.run_frame(0.1, &mut input, &mut stage).unwrap();
        assert!((frame.scene().camera.yaw() - (yaw + 2.0)).abs() < 1e-4);
    }

    #[test]
    fn relative_motion_keeps_turning_past_the_window_edge() {
        let mut frame = orchestrator();
        let mut input = InputState::new();
        let mut stage = UniformRecorder::default();
        let yaw = frame.scene().camera.yaw();

        for step in 0..40 {
            input.push_pointer_motion(glam::Vec2::new(50.0, 0.0));
            frame
                .run_frame(step as f32 * 0.01, &mut input, &mut stage)
                .unwrap();
        }
        // The first sample only seeds the pointer; 39 moves of 50 px at 0.1.
        assert!((frame.scene().camera.yaw() - (yaw + 195.0)).abs() < 1e-3);
    }

    #[test]
    fn same_time_gives_same_frame() {
        let mut a = orchestrator();
        let mut b = orchestrator();
        let ra = a
            .run_frame(3.25, &mut InputState::new(), &mut UniformRecorder::default())
            .unwrap();
        let rb = b
            .run_frame(3.25, &mut InputState::new(), &mut UniformRecorder::default())
            .unwrap();
        assert_eq!(ra, rb);
    }
}
