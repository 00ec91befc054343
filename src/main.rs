use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info, warn};
use nalgebra::{Vector2, Vector3};
use shadelab::core::geometry::Vertex;
use shadelab::gpu::HeadlessBackend;
use shadelab::io::config::Config;
use shadelab::io::image::{frame_path, save_image};
use shadelab::io::loader::{LoadProgress, MeshLoader, MeshSource};
use shadelab::pipeline::renderer::Renderer;
use shadelab::scene::presets;
use shadelab::scene::texture::Texture;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// Headless OBJ viewer with swappable fragment shaders
#[derive(Parser, Debug)]
#[command(name = "shadelab")]
#[command(about = "Render an OBJ mesh with a GLSL fragment shader preset or file")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Mesh to load; a single triangle is drawn when omitted
    #[arg(long, value_name = "FILE")]
    obj: Option<PathBuf>,

    /// Texture image bound to the mesh
    #[arg(long, value_name = "FILE")]
    texture: Option<PathBuf>,

    /// Fragment shader source file
    #[arg(short, long, value_name = "FILE")]
    fragment: Option<PathBuf>,

    /// Built-in fragment shader preset
    #[arg(short, long)]
    preset: Option<String>,

    /// Output image path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Number of frames to render; more than one writes numbered images
    #[arg(long)]
    frames: Option<u32>,

    /// Spin the model as time advances
    #[arg(long)]
    auto_rotate: bool,

    /// Print the built-in presets and exit
    #[arg(long)]
    list_presets: bool,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(width) = self.width {
            config.render.width = width;
        }
        if let Some(height) = self.height {
            config.render.height = height;
        }
        if let Some(frames) = self.frames {
            config.render.frames = frames;
        }
        if let Some(output) = &self.output {
            config.render.output = output.clone();
        }
        if self.obj.is_some() {
            config.model.path = self.obj.clone();
        }
        if self.texture.is_some() {
            config.model.texture = self.texture.clone();
        }
        if self.auto_rotate {
            config.model.auto_rotate = true;
        }
        if self.fragment.is_some() {
            config.shader.fragment = self.fragment.clone();
        }
        if self.preset.is_some() {
            config.shader.preset = self.preset.clone();
        }
    }
}

fn fallback_triangle() -> Vec<Vertex> {
    let n = Vector3::z();
    vec![
        Vertex::new(Vector3::new(-0.5, -0.5, 0.0), n, Vector2::new(0.0, 0.0)),
        Vertex::new(Vector3::new(0.5, -0.5, 0.0), n, Vector2::new(1.0, 0.0)),
        Vertex::new(Vector3::new(0.0, 0.5, 0.0), n, Vector2::new(0.5, 1.0)),
    ]
}

fn fragment_source(config: &Config) -> Result<Option<String>> {
    if let Some(path) = &config.shader.fragment {
        let source = fs::read_to_string(path)
            .with_context(|| format!("cannot read fragment shader '{}'", path.display()))?;
        return Ok(Some(source));
    }
    match config.shader.preset.as_deref() {
        Some(name) => match presets::find(name) {
            Some(preset) => Ok(Some(preset.source.to_string())),
            None => bail!("unknown preset '{name}' (try --list-presets)"),
        },
        None => Ok(None),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp(None)
        .format_level(true)
        .init();

    let cli = Cli::parse();

    if cli.list_presets {
        for preset in &presets::BUILT_IN {
            let marker = if preset.name == presets::DEFAULT_PRESET { " (default)" } else { "" };
            println!("{:<14} {}{marker}", preset.name, preset.title);
        }
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    cli.apply(&mut config);

    let start = Instant::now();
    let (width, height) = (config.render.width, config.render.height);
    let mut renderer = Renderer::new(HeadlessBackend::new(width, height), config.camera.build())
        .with_clear_color(Vector3::from(config.render.clear_color))
        .with_time_step(config.render.time_step);
    renderer.surface_changed(width, height);

    if let Some(source) = fragment_source(&config)? {
        let report = renderer.state_mut().provide_fragment_source(&source);
        if !report.linked {
            for e in report.log.errors() {
                error!("{}", e.message);
            }
            warn!("Keeping the default fragment shader");
        }
    }

    let handle = renderer.handle();
    handle.set_sampler(config.sampler);
    handle.set_auto_rotate(config.model.auto_rotate);

    let installed = match config.model.path.clone() {
        Some(path) => {
            let (progress_tx, progress_rx) = bounded::<LoadProgress>(16);
            let loader = MeshLoader::spawn(
                MeshSource::File(path),
                config.model.texture.clone(),
                handle.clone(),
                Some(progress_tx),
            );
            let mut reported = 0;
            for tick in progress_rx.iter() {
                let percent = (tick.fraction() * 100.0) as u32;
                if percent >= reported + 10 || tick.is_complete() {
                    info!("Loading mesh: {percent}%");
                    reported = percent;
                }
            }
            let queued = loader
                .join()
                .map_err(|_| anyhow!("mesh loader thread panicked"))??;
            info!("Mesh handed to the renderer ({} vertices)", queued.vertex_count);
            queued.installed
        }
        None => {
            info!("No mesh given, drawing a single triangle");
            let texture = match &config.model.texture {
                Some(path) => Some(Texture::load(path)?),
                None => None,
            };
            handle.install_model(fallback_triangle(), texture)?
        }
    };

    let frames = config.render.frames.max(1);
    for frame in 0..frames {
        let image = renderer.render_still();
        if frame == 0 {
            installed
                .try_recv()
                .map_err(|_| anyhow!("the first frame did not install the mesh"))?
                .context("cannot install the mesh")?;
        }
        let path = if frames > 1 {
            frame_path(&config.render.output, frame)
        } else {
            config.render.output.clone()
        };
        save_image(&image, &path)?;
    }

    info!(
        "Rendered {} frame(s) in {:?}",
        renderer.state().frames_rendered(),
        start.elapsed()
    );
    Ok(())
}
