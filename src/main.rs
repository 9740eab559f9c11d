use std::error::Error;
use std::fmt::Display;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gltf_scene_viewer::renderer::gl;
use gltf_scene_viewer::renderer::gltf::MAX_LIGHTS;
use gltf_scene_viewer::{create_program, Camera, GlContext, Model, Shader};
use sdl2::event::{Event, WindowEvent};
use sdl2::keyboard::Keycode;
use sdl2::video::GLProfile;

const ORBIT_STEP: f32 = 0.05;
const ZOOM_STEP: f32 = 1.1;

/// Opens a window and draws a glTF scene lit by its own lights.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// The .gltf or .glb file to show.
    path: PathBuf,
    /// Apply gamma correction to the shaded color.
    #[arg(long)]
    gamma: bool,
    #[arg(long, default_value_t = 948)]
    width: u32,
    #[arg(long, default_value_t = 533)]
    height: u32,
    /// Initial distance of the camera from the origin.
    #[arg(long, default_value_t = 5.0)]
    distance: f32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let sdl_context = sdl2::init().map_err(SdlErr)?;
    let video_subsystem = sdl_context.video().map_err(SdlErr)?;
    let gl_attr = video_subsystem.gl_attr();
    gl_attr.set_context_profile(GLProfile::GLES);
    gl_attr.set_context_version(3, 0);
    gl_attr.set_depth_size(24);
    // Linear->SRGB conversion is done in the shader when requested.
    gl_attr.set_framebuffer_srgb_compatible(false);
    let window = video_subsystem
        .window(env!("CARGO_PKG_NAME"), args.width, args.height)
        .resizable()
        .opengl()
        .build()?;
    let _gl_context = window.gl_create_context().map_err(SdlErr)?;
    let mut event_pump = sdl_context.event_pump().map_err(SdlErr)?;

    let gpu = GlContext::load_with(|s| video_subsystem.gl_get_proc_address(s) as *const _);
    if let Err(err) = video_subsystem.gl_set_swap_interval(1) {
        log::warn!("vsync not available: {err}");
    }
    let (mut width, mut height) = window.drawable_size();
    gl::call!(gl::Viewport(0, 0, width as i32, height as i32));
    gl::call!(gl::Enable(gl::DEPTH_TEST));

    let mut program = create_program().context("failed to create the glTF shader program")?;
    let camera = Camera {
        distance: args.distance,
        ..Camera::default()
    };
    let mut model = Model::new(gpu, &args.path, camera, args.gamma);
    let lights = model.lights();
    if lights.point.len() > MAX_LIGHTS || lights.directional.len() > MAX_LIGHTS {
        log::warn!("only the first {MAX_LIGHTS} lights of each kind are shaded");
    }

    'running: loop {
        for event in event_pump.poll_iter() {
            match event {
                Event::Quit { .. } => break 'running,
                Event::Window {
                    win_event: WindowEvent::SizeChanged(..),
                    ..
                } => {
                    (width, height) = window.drawable_size();
                    gl::call!(gl::Viewport(0, 0, width as i32, height as i32));
                }
                Event::KeyDown {
                    keycode: Some(keycode),
                    ..
                } => {
                    let camera = model.camera_mut();
                    match keycode {
                        Keycode::Escape => break 'running,
                        Keycode::Left => camera.orbit(-ORBIT_STEP, 0.0),
                        Keycode::Right => camera.orbit(ORBIT_STEP, 0.0),
                        Keycode::Up => camera.orbit(0.0, ORBIT_STEP),
                        Keycode::Down => camera.orbit(0.0, -ORBIT_STEP),
                        Keycode::Plus | Keycode::KpPlus | Keycode::Equals => {
                            camera.zoom(1.0 / ZOOM_STEP)
                        }
                        Keycode::Minus | Keycode::KpMinus => camera.zoom(ZOOM_STEP),
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        gl::call!(gl::ClearColor(0.1, 0.1, 0.1, 1.0));
        gl::call!(gl::Clear(gl::COLOR_BUFFER_BIT | gl::DEPTH_BUFFER_BIT));

        let camera = *model.camera();
        let aspect_ratio = width as f32 / height.max(1) as f32;
        program.use_program();
        program.set_mat4("view", camera.view_matrix());
        program.set_mat4("projection", camera.projection_matrix(aspect_ratio));
        program.set_vec3("cameraPosition", camera.position());
        program.set_int("gammaCorrection", model.gamma_correction() as i32);
        model.draw(&mut program);

        window.gl_swap_window();
    }

    model.destroy();
    Ok(())
}

#[derive(Debug)]
pub struct SdlErr(String);
impl Display for SdlErr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sdl error: {}", self.0)
    }
}
impl Error for SdlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        None
    }
}
