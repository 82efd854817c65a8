use std::any::Any;
use std::env;
use std::fmt;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::Vec2;
use log::{info, warn};
use pollster::block_on;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{KeyCode as WinitKey, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowBuilder};

use stagelight::app::{print_scene_summary, run_headless};
use stagelight::{
    FrameOrchestrator, FrameOutcome, InputState, KeyCode, MeshLibrary, NamedKey, Renderer, Scene,
};

const USAGE: &str = "Usage: stagelight [scene.xml] [--assets DIR] [--summary-only] [--frames N] [--placeholder-meshes]";

/// Scroll distance of one wheel notch on devices that report pixels.
const PIXELS_PER_LINE: f32 = 40.0;

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let Some(options) = CliOptions::parse(env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };
    let scene = match &options.scene {
        Some(path) => load_scene(path)?,
        None => Scene::builtin().context("built-in scene is invalid")?,
    };

    let mut stdout = io::stdout().lock();
    print_scene_summary(&scene, &mut stdout)?;

    if options.summary_only {
        run_headless(&scene, options.frames, &mut stdout)?;
        return Ok(());
    }
    drop(stdout);

    match run_interactive(&scene, &options) {
        Ok(()) => Ok(()),
        Err(err) if err.downcast_ref::<WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --summary-only mode (set DISPLAY or install a GPU driver to enable rendering)."
            );
            run_headless(&scene, options.frames, &mut io::stdout().lock())?;
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn load_scene(path: &Path) -> Result<Scene> {
    let xml = fs::read_to_string(path)
        .with_context(|| format!("failed to read scene {}", path.display()))?;
    Scene::from_xml(&xml).with_context(|| format!("failed to parse scene {}", path.display()))
}

fn run_interactive(scene: &Scene, options: &CliOptions) -> Result<()> {
    let mut library =
        MeshLibrary::new(options.asset_root()).with_placeholders(options.placeholder_meshes);
    let context = scene.instantiate(&mut library)?;

    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::from_panic("event loop", panic))?
        .map_err(|err| WindowInitError::from_error("event loop", err))?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Stagelight")
            .with_inner_size(LogicalSize::new(1280.0, 720.0))
            .build(&event_loop)
            .map_err(|err| WindowInitError::from_error("window", err))?,
    );
    grab_cursor(&window);

    let renderer = block_on(Renderer::new(Arc::clone(&window), &library))
        .map_err(|err| WindowInitError::from_error("renderer", format!("{err:#}")))?;

    let mut app = AppState {
        renderer,
        orchestrator: FrameOrchestrator::new(context),
        input: InputState::new(),
        started: Instant::now(),
        frames: 0,
        last_error: None,
    };

    event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);
        match app.process_event(event) {
            Ok(FrameOutcome::Continue) => {}
            Ok(FrameOutcome::Exit) => elwt.exit(),
            Err(err) => {
                app.last_error = Some(err);
                elwt.exit();
            }
        }
    })?;

    info!(
        "rendered {} frames in {:.1}s",
        app.frames,
        app.started.elapsed().as_secs_f32()
    );
    match app.last_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn grab_cursor(window: &Window) {
    let grabbed = window
        .set_cursor_grab(CursorGrabMode::Locked)
        .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined));
    if let Err(err) = grabbed {
        warn!("unable to capture the cursor: {err}");
    }
    window.set_cursor_visible(false);
}

struct AppState {
    renderer: Renderer,
    orchestrator: FrameOrchestrator,
    input: InputState,
    started: Instant,
    frames: u64,
    last_error: Option<anyhow::Error>,
}

impl AppState {
    fn process_event(&mut self, event: Event<()>) -> Result<FrameOutcome> {
        match event {
            Event::WindowEvent { event, window_id } if window_id == self.renderer.window_id() => {
                match event {
                    WindowEvent::CloseRequested => self.input.request_close(),
                    WindowEvent::Resized(size) => self.renderer.resize(size),
                    WindowEvent::KeyboardInput { event, .. } => self.handle_keyboard(&event),
                    WindowEvent::MouseWheel { delta, .. } => {
                        let lines = match delta {
                            MouseScrollDelta::LineDelta(_, y) => y,
                            MouseScrollDelta::PixelDelta(position) => {
                                position.y as f32 / PIXELS_PER_LINE
                            }
                        };
                        self.input.add_scroll(lines);
                    }
                    WindowEvent::Focused(focused) => {
                        self.input.reset_pointer();
                        if focused {
                            grab_cursor(self.renderer.window());
                        } else {
                            self.input.release_all();
                        }
                    }
                    WindowEvent::RedrawRequested => return self.redraw(),
                    _ => {}
                }
            }
            Event::DeviceEvent {
                event: DeviceEvent::MouseMotion { delta },
                ..
            } => {
                self.input
                    .push_pointer_motion(Vec2::new(delta.0 as f32, delta.1 as f32));
            }
            Event::AboutToWait => self.renderer.window().request_redraw(),
            _ => {}
        }
        Ok(FrameOutcome::Continue)
    }

    fn redraw(&mut self) -> Result<FrameOutcome> {
        let now = self.started.elapsed().as_secs_f32();
        let report = self
            .orchestrator
            .run_frame(now, &mut self.input, &mut self.renderer)?;
        self.frames += 1;
        Ok(report.outcome)
    }

    fn handle_keyboard(&mut self, event: &KeyEvent) {
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        let Some(key) = map_keycode(code) else {
            return;
        };
        match event.state {
            ElementState::Pressed => self.input.set_key_down(key),
            ElementState::Released => self.input.set_key_up(key),
        }
    }
}

#[derive(Debug)]
struct WindowInitError {
    message: String,
}

impl WindowInitError {
    fn from_panic(stage: &str, panic: Box<dyn Any + Send>) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {}", panic_message(panic)),
        }
    }

    fn from_error(stage: &str, err: impl fmt::Display) -> Self {
        Self {
            message: format!("failed to initialize {stage}: {err}"),
        }
    }
}

impl fmt::Display for WindowInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for WindowInitError {}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

fn map_keycode(code: WinitKey) -> Option<KeyCode> {
    Some(match code {
        WinitKey::Space => KeyCode::Named(NamedKey::Space),
        WinitKey::ArrowLeft => KeyCode::Named(NamedKey::Left),
        WinitKey::ArrowRight => KeyCode::Named(NamedKey::Right),
        WinitKey::ArrowUp => KeyCode::Named(NamedKey::Up),
        WinitKey::ArrowDown => KeyCode::Named(NamedKey::Down),
        WinitKey::Escape => KeyCode::Named(NamedKey::Escape),
        WinitKey::ShiftLeft => KeyCode::Named(NamedKey::LeftShift),
        WinitKey::ShiftRight => KeyCode::Named(NamedKey::RightShift),
        WinitKey::ControlLeft => KeyCode::Named(NamedKey::LeftCtrl),
        WinitKey::ControlRight => KeyCode::Named(NamedKey::RightCtrl),
        WinitKey::Digit0 => KeyCode::Character('0'),
        WinitKey::Digit1 => KeyCode::Character('1'),
        WinitKey::Digit2 => KeyCode::Character('2'),
        WinitKey::Digit3 => KeyCode::Character('3'),
        WinitKey::Digit4 => KeyCode::Character('4'),
        WinitKey::Digit5 => KeyCode::Character('5'),
        WinitKey::Digit6 => KeyCode::Character('6'),
        WinitKey::Digit7 => KeyCode::Character('7'),
        WinitKey::Digit8 => KeyCode::Character('8'),
        WinitKey::Digit9 => KeyCode::Character('9'),
        WinitKey::KeyA => KeyCode::Character('A'),
        WinitKey::KeyB => KeyCode::Character('B'),
        WinitKey::KeyC => KeyCode::Character('C'),
        WinitKey::KeyD => KeyCode::Character('D'),
        WinitKey::KeyE => KeyCode::Character('E'),
        WinitKey::KeyF => KeyCode::Character('F'),
        WinitKey::KeyG => KeyCode::Character('G'),
        WinitKey::KeyH => KeyCode::Character('H'),
        WinitKey::KeyI => KeyCode::Character('I'),
        WinitKey::KeyJ => KeyCode::Character('J'),
        WinitKey::KeyK => KeyCode::Character('K'),
        WinitKey::KeyL => KeyCode::Character('L'),
        WinitKey::KeyM => KeyCode::Character('M'),
        WinitKey::KeyN => KeyCode::Character('N'),
        WinitKey::KeyO => KeyCode::Character('O'),
        WinitKey::KeyP => KeyCode::Character('P'),
        WinitKey::KeyQ => KeyCode::Character('Q'),
        WinitKey::KeyR => KeyCode::Character('R'),
        WinitKey::KeyS => KeyCode::Character('S'),
        WinitKey::KeyT => KeyCode::Character('T'),
        WinitKey::KeyU => KeyCode::Character('U'),
        WinitKey::KeyV => KeyCode::Character('V'),
        WinitKey::KeyW => KeyCode::Character('W'),
        WinitKey::KeyX => KeyCode::Character('X'),
        WinitKey::KeyY => KeyCode::Character('Y'),
        WinitKey::KeyZ => KeyCode::Character('Z'),
        _ => return None,
    })
}

struct CliOptions {
    scene: Option<PathBuf>,
    assets: Option<PathBuf>,
    summary_only: bool,
    frames: usize,
    placeholder_meshes: bool,
}

impl CliOptions {
    /// Returns `None` when help was requested.
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>> {
        let mut options = Self {
            scene: None,
            assets: None,
            summary_only: false,
            frames: 3,
            placeholder_meshes: false,
        };
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(None),
                "--summary-only" => options.summary_only = true,
                "--placeholder-meshes" => options.placeholder_meshes = true,
                "--assets" => {
                    let dir = args
                        .next()
                        .ok_or_else(|| anyhow!("--assets needs a directory\n{USAGE}"))?;
                    options.assets = Some(PathBuf::from(dir));
                }
                "--frames" => {
                    let count = args
                        .next()
                        .ok_or_else(|| anyhow!("--frames needs a count\n{USAGE}"))?;
                    options.frames = count
                        .parse()
                        .with_context(|| format!("invalid frame count {count:?}"))?;
                }
                other if other.starts_with('-') => {
                    return Err(anyhow!("Unknown argument: {other}\n{USAGE}"));
                }
                path => {
                    if options.scene.is_some() {
                        return Err(anyhow!("Only one scene file may be given\n{USAGE}"));
                    }
                    options.scene = Some(PathBuf::from(path));
                }
            }
        }
        Ok(Some(options))
    }

    /// Explicit `--assets`, else the scene file's directory, else the working directory.
    fn asset_root(&self) -> PathBuf {
        if let Some(dir) = &self.assets {
            return dir.clone();
        }
        self.scene
            .as_ref()
            .and_then(|path| path.parent())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
