use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

fn write_scene(xml: &str) -> NamedTempFile {
    let mut tmp = NamedTempFile::new().expect("temp scene");
    tmp.write_all(xml.as_bytes()).expect("write scene");
    tmp
}

const ORBIT_SCENE: &str = r#"<scene>
  <lighting>
    <speed>0.5</speed>
  </lighting>
  <light>
    <base>1.2 1 2</base>
    <center>0 2 0</center>
    <radius>5</radius>
    <aim>
      <sin>1 0 0</sin>
      <cos>0 0 1</cos>
    </aim>
  </light>
  <object>
    <name>Box</name>
    <mesh>builtin:cube</mesh>
    <transform>
      <translate>1 0 0</translate>
      <scale>0.5</scale>
    </transform>
  </object>
</scene>
"#;

#[test]
fn cli_prints_scene_and_light_orbit() {
    let scene = write_scene(ORBIT_SCENE);
    let mut cmd = Command::cargo_bin("stagelight").expect("binary exists");
    cmd.arg(scene.path()).arg("--summary-only").arg("--frames").arg("2");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 1 objects (1 lights)"))
        .stdout(contains(" - Box (builtin:cube, static)"))
        .stdout(contains("Frame 0 t=0.000: 1 draws"))
        .stdout(contains("  light 0 pos=(5.00, 2.00, 0.00) dir=(0.00, 0.00, 1.00)"))
        .stdout(contains("Frame 1 t=0.017: 1 draws"))
        .stdout(contains("Frame 2").not());
}

#[test]
fn cli_runs_builtin_scene_without_assets() {
    let mut cmd = Command::cargo_bin("stagelight").expect("binary exists");
    cmd.arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 13 objects (5 lights)"))
        .stdout(contains(" - drone-1 (model/dron/scene.obj, animated)"))
        .stdout(contains("Frame 2 t=0.033: 13 draws"));
}

#[test]
fn cli_rejects_zero_scale() {
    let scene = write_scene(
        r#"<scene>
  <object>
    <name>Flat</name>
    <mesh>builtin:cube</mesh>
    <transform><scale>1 0 1</scale></transform>
  </object>
</scene>"#,
    );
    let mut cmd = Command::cargo_bin("stagelight").expect("binary exists");
    cmd.arg(scene.path()).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to parse scene"))
        .stderr(contains("Flat"));
}

#[test]
fn cli_rejects_unknown_flags() {
    let mut cmd = Command::cargo_bin("stagelight").expect("binary exists");
    cmd.arg("--fullscreen");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --fullscreen"));
}
