use std::io::Write;

use anyhow::Result;
use glam::Vec3;

use crate::assets::MeshCatalog;
use crate::frame::{FrameOrchestrator, FrameReport};
use crate::input::InputState;
use crate::scene::Scene;
use crate::uniforms::UniformRecorder;

/// Fixed step used when frames are simulated without a window.
pub const HEADLESS_FRAME_TIME: f32 = 1.0 / 60.0;

pub fn print_scene_summary(scene: &Scene, out: &mut impl Write) -> Result<()> {
    writeln!(
        out,
        "Loaded scene with {} objects ({} lights)",
        scene.objects.len(),
        scene.lights.len()
    )?;
    for object in &scene.objects {
        let kind = if object.recipe.is_animated() {
            "animated"
        } else {
            "static"
        };
        writeln!(out, " - {} ({}, {kind})", object.name, object.mesh)?;
    }
    Ok(())
}

/// Runs `frames` frames against a recording stage and prints the light poses.
///
/// Meshes are only catalogued, never read, so no asset files are required.
pub fn run_headless(
    scene: &Scene,
    frames: usize,
    out: &mut impl Write,
) -> Result<Vec<FrameReport>> {
    let mut catalog = MeshCatalog::new();
    let mut orchestrator = FrameOrchestrator::new(scene.instantiate(&mut catalog)?);
    let mut input = InputState::new();
    let mut stage = UniformRecorder::default();

    let mut reports = Vec::with_capacity(frames);
    for index in 0..frames {
        stage.clear();
        let now = index as f32 * HEADLESS_FRAME_TIME;
        let report = orchestrator.run_frame(now, &mut input, &mut stage)?;
        writeln!(
            out,
            "Frame {index} t={:.3}: {} draws",
            report.time,
            report.draws.len()
        )?;
        for (light_index, light) in report.lights.iter().enumerate() {
            writeln!(
                out,
                "  light {light_index} pos={} dir={}",
                format_vec3(light.position),
                format_vec3(light.direction)
            )?;
        }
        reports.push(report);
    }
    Ok(reports)
}

fn format_vec3(v: Vec3) -> String {
    format!("({:.2}, {:.2}, {:.2})", v.x, v.y, v.z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_lists_every_object() {
        let scene = Scene::builtin().unwrap();
        let mut out = Vec::new();
        print_scene_summary(&scene, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Loaded scene with 13 objects (5 lights)"));
        assert!(text.contains(" - drone-3 (model/dron/scene.obj, animated)"));
        assert!(text.contains(" - landscape (model/map-landscape/scene.obj, static)"));
    }

    #[test]
    fn headless_run_reports_each_frame() {
        let scene = Scene::builtin().unwrap();
        let mut out = Vec::new();
        let reports = run_headless(&scene, 3, &mut out).unwrap();
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.draws.len() == 13));
        assert!((reports[2].time - 2.0 * HEADLESS_FRAME_TIME).abs() < 1e-6);

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Frame 0 t=0.000: 13 draws"));
        assert!(text.contains("  light 0 pos=(5.00, 2.00, 0.00) dir=(0.00, 0.00, 1.00)"));
    }
}
