use crate::core::geometry::Vertex;
use crate::core::math::transform::TransformFactory;
use crate::error::{Error, Result};
use crate::gpu::RenderBackend;
use crate::pipeline::compile_log::CompileLog;
use crate::pipeline::frame_tasks::{FrameTaskQueue, FrameTaskSender};
use crate::pipeline::shader_program::ShaderProgram;
use crate::scene::camera::Camera;
use crate::scene::model::Model;
use crate::scene::presets::{DEFAULT_FRAGMENT_SHADER, VERTEX_SHADER};
use crate::scene::texture::{SamplerState, Texture};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use image::RgbaImage;
use log::{debug, error, info, warn};
use nalgebra::{Vector2, Vector3};
use std::f32::consts::TAU;

/// Elapsed-time increment per frame.
pub const DEFAULT_TIME_STEP: f32 = 0.001;

/// Outcome of one fragment shader submission, for the diagnostics display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileReport {
    pub linked: bool,
    pub log: CompileLog,
}

/// Everything owned by the render thread. Frame tasks receive it mutably.
pub struct RenderState<B: RenderBackend> {
    backend: B,
    camera: Camera,
    model: Option<Model>,

    vertex_source: String,
    /// Last fragment source that linked.
    fragment_source: String,

    time: f32,
    time_step: f32,
    paused: bool,
    auto_rotate: bool,
    sampler: SamplerState,
    clear_color: Vector3<f32>,
    frames_rendered: u64,

    reports: Sender<CompileReport>,
    still_requests: Vec<Sender<RgbaImage>>,
}

impl<B: RenderBackend> RenderState<B> {
    /// Builds a model from `vertices` with the current shader sources and swaps it in.
    ///
    /// On failure the previous model keeps rendering.
    pub fn install_model(&mut self, vertices: &[Vertex], texture: Option<&Texture>) -> Result<()> {
        let mut model = Model::new(
            &mut self.backend,
            vertices,
            texture,
            &self.vertex_source,
            &self.fragment_source,
        )
        .inspect_err(|e| error!("Failed to install model: {e}"))?;
        model.set_auto_rotate(self.auto_rotate);
        model.set_sampler(&mut self.backend, self.sampler);
        if let Some(old) = self.model.replace(model) {
            old.release(&mut self.backend);
        }
        Ok(())
    }

    /// Compiles `source` against the current model, or against a throwaway
    /// program when no model is installed, and reports the outcome.
    pub fn provide_fragment_source(&mut self, source: &str) -> CompileReport {
        let report = match self.model.as_mut() {
            Some(model) => match model.provide_fragment_source(&mut self.backend, source) {
                Ok(linked) => CompileReport {
                    linked,
                    log: model.program().fragment_log().clone(),
                },
                Err(e) => failed_report(e),
            },
            None => match ShaderProgram::new(&mut self.backend, &self.vertex_source, source) {
                Ok(mut scratch) => {
                    let log = scratch.fragment_log().clone();
                    scratch.release(&mut self.backend);
                    CompileReport { linked: true, log }
                }
                Err(Error::ShaderCompile { log, .. }) => CompileReport { linked: false, log },
                Err(e) => failed_report(e),
            },
        };

        if report.linked {
            self.fragment_source = source.to_string();
            info!("Fragment shader replaced");
        } else {
            warn!(
                "Fragment shader rejected with {} error(s)",
                report.log.error_count()
            );
        }
        if self.reports.send(report.clone()).is_err() {
            debug!("No one is listening for compile reports");
        }
        report
    }

    /// Rotates the model by a drag between two normalised screen positions.
    pub fn drag(&mut self, position: Vector2<f32>, previous: Vector2<f32>) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        let delta = position - previous;
        let theta = delta.y * TAU;
        let phi = delta.x * TAU;
        model.transform(&(TransformFactory::rotation_x(theta) * TransformFactory::rotation_y(phi)));
    }

    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
        if let Some(model) = self.model.as_mut() {
            model.set_auto_rotate(enabled);
        }
    }

    pub fn set_sampler(&mut self, sampler: SamplerState) {
        self.sampler = sampler;
        if let Some(model) = self.model.as_mut() {
            model.set_sampler(&mut self.backend, sampler);
        }
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn reset_time(&mut self) {
        self.time = 0.0;
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }
}

fn failed_report(e: Error) -> CompileReport {
    error!("Fragment shader submission failed: {e}");
    CompileReport {
        linked: false,
        log: CompileLog::parse(format!("ERROR: {e}\n")),
    }
}

/// The render context and its per-frame loop.
pub struct Renderer<B: RenderBackend + 'static> {
    state: RenderState<B>,
    tasks: FrameTaskQueue<RenderState<B>>,
    reports: Receiver<CompileReport>,
}

impl<B: RenderBackend + 'static> Renderer<B> {
    pub fn new(backend: B, camera: Camera) -> Self {
        let (reports_tx, reports_rx) = unbounded();
        Self {
            state: RenderState {
                backend,
                camera,
                model: None,
                vertex_source: VERTEX_SHADER.to_string(),
                fragment_source: DEFAULT_FRAGMENT_SHADER.to_string(),
                time: 0.0,
                time_step: DEFAULT_TIME_STEP,
                paused: false,
                auto_rotate: false,
                sampler: SamplerState::default(),
                clear_color: Vector3::new(0.1, 0.1, 0.1),
                frames_rendered: 0,
                reports: reports_tx,
                still_requests: Vec::new(),
            },
            tasks: FrameTaskQueue::new(),
            reports: reports_rx,
        }
    }

    pub fn with_clear_color(mut self, color: Vector3<f32>) -> Self {
        self.state.clear_color = color;
        self
    }

    pub fn with_time_step(mut self, step: f32) -> Self {
        self.state.time_step = step;
        self
    }

    /// Producer-side handle for other threads.
    pub fn handle(&self) -> RenderHandle<B> {
        RenderHandle {
            tasks: self.tasks.sender(),
        }
    }

    /// Receives a [`CompileReport`] for every fragment shader submission.
    pub fn compile_reports(&self) -> Receiver<CompileReport> {
        self.reports.clone()
    }

    pub fn surface_changed(&mut self, width: u32, height: u32) {
        info!("Surface changed to {width}x{height}");
        self.state.backend.viewport(width, height);
        self.state.camera.set_viewport(width, height);
    }

    /// Runs queued tasks, then clears, animates and draws one frame.
    pub fn frame(&mut self) {
        self.tasks.drain(&mut self.state);

        let state = &mut self.state;
        state.backend.clear(state.clear_color);
        if !state.paused {
            state.time += state.time_step;
        }
        if let Some(model) = state.model.as_mut() {
            model.update(state.time);
            model.draw(&mut state.backend, &state.camera, state.time);
        }
        state.frames_rendered += 1;

        if !state.still_requests.is_empty() {
            let image = state.backend.read_pixels();
            for request in state.still_requests.drain(..) {
                // A requester that gave up is not an error.
                let _ = request.send(image.clone());
            }
        }
    }

    /// Renders one frame and returns it.
    pub fn render_still(&mut self) -> RgbaImage {
        self.frame();
        self.state.backend.read_pixels()
    }

    pub fn state(&self) -> &RenderState<B> {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut RenderState<B> {
        &mut self.state
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }
}

/// Queues work for a [`Renderer`] from any thread.
///
/// Once the renderer has been dropped, methods return false and
/// installs fail with [`Error::LoaderDisconnected`].
pub struct RenderHandle<B: RenderBackend + 'static> {
    tasks: FrameTaskSender<RenderState<B>>,
}

impl<B: RenderBackend + 'static> Clone for RenderHandle<B> {
    fn clone(&self) -> Self {
        Self {
            tasks: self.tasks.clone(),
        }
    }
}

impl<B: RenderBackend + 'static> RenderHandle<B> {
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: FnOnce(&mut RenderState<B>) + Send + 'static,
    {
        self.tasks.submit(task)
    }

    /// Hands a finished mesh to the render thread in one piece.
    ///
    /// The receiver yields the install outcome once a frame has run the task.
    pub fn install_model(
        &self,
        vertices: Vec<Vertex>,
        texture: Option<Texture>,
    ) -> Result<Receiver<Result<()>>> {
        let (tx, rx) = bounded(1);
        let queued = self.submit(move |state| {
            let _ = tx.send(state.install_model(&vertices, texture.as_ref()));
        });
        if !queued {
            return Err(Error::LoaderDisconnected);
        }
        Ok(rx)
    }

    pub fn provide_fragment_source(&self, source: impl Into<String>) -> bool {
        let source = source.into();
        self.submit(move |state| {
            state.provide_fragment_source(&source);
        })
    }

    pub fn drag(&self, position: Vector2<f32>, previous: Vector2<f32>) -> bool {
        self.submit(move |state| state.drag(position, previous))
    }

    pub fn edit_camera<F>(&self, edit: F) -> bool
    where
        F: FnOnce(&mut Camera) + Send + 'static,
    {
        self.submit(move |state| edit(&mut state.camera))
    }

    pub fn set_paused(&self, paused: bool) -> bool {
        self.submit(move |state| state.set_paused(paused))
    }

    pub fn reset_time(&self) -> bool {
        self.submit(|state| state.reset_time())
    }

    pub fn set_auto_rotate(&self, enabled: bool) -> bool {
        self.submit(move |state| state.set_auto_rotate(enabled))
    }

    pub fn set_sampler(&self, sampler: SamplerState) -> bool {
        self.submit(move |state| state.set_sampler(sampler))
    }

    /// The returned receiver yields the next completed frame.
    pub fn request_still(&self) -> Receiver<RgbaImage> {
        let (tx, rx) = bounded(1);
        self.submit(move |state| state.still_requests.push(tx));
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::HeadlessBackend;
    use crate::scene::presets;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix4, Point3};

    const BROKEN: &str = "#version 450\n\
                          layout(location = 0) out vec4 fragColor;\n\
                          void main() {\n    fragColor = vec4(1.0)\n}\n";

    fn renderer() -> Renderer<HeadlessBackend> {
        let mut renderer = Renderer::new(HeadlessBackend::new(16, 16), Camera::default());
        renderer.surface_changed(16, 16);
        renderer
    }

    fn triangle() -> Vec<Vertex> {
        let n = Vector3::z();
        vec![
            Vertex::new(Vector3::new(-0.5, -0.5, 0.0), n, Vector2::zeros()),
            Vertex::new(Vector3::new(0.5, -0.5, 0.0), n, Vector2::zeros()),
            Vertex::new(Vector3::new(0.0, 0.5, 0.0), n, Vector2::zeros()),
        ]
    }

    #[test]
    fn time_advances_unless_paused() {
        let mut r = renderer();
        r.frame();
        r.frame();
        assert_relative_eq!(r.state().time(), 2.0 * DEFAULT_TIME_STEP);

        r.handle().set_paused(true);
        r.frame();
        assert!(r.state().is_paused());
        assert_relative_eq!(r.state().time(), 2.0 * DEFAULT_TIME_STEP);

        r.handle().reset_time();
        r.frame();
        assert_eq!(r.state().time(), 0.0);
    }

    #[test]
    fn queued_model_appears_on_the_next_frame() {
        let mut r = renderer();
        let installed = r.handle().install_model(triangle(), None).unwrap();
        assert!(r.state().model().is_none());
        assert!(installed.try_recv().is_err());
        r.frame();
        assert!(installed.try_recv().unwrap().is_ok());
        assert_eq!(r.state().model().map(Model::vertex_count), Some(3));
        assert_eq!(r.state().backend().draw_calls(), 1);
    }

    #[test]
    fn failed_install_is_reported_to_the_sender() {
        let mut r = Renderer::new(
        HeadlessBackend::new(16, 16).with_name_limit(1),
        Camera::default(),
    );
        r.surface_changed(16, 16);
        let installed = r.handle().install_model(triangle(), None).unwrap();
        r.frame();
        assert!(matches!(
            installed.try_recv().unwrap(),
            Err(Error::ResourceAllocation(_))
        ));
        assert!(r.state().model().is_none());
    }

    #[test]
    fn install_after_the_renderer_is_gone_fails_fast() {
        let handle = renderer().handle();
        assert!(matches!(
            handle.install_model(triangle(), None),
            Err(Error::LoaderDisconnected)
        ));
    }

    #[test]
    fn replacing_a_model_releases_the_old_one() {
        let mut r = renderer();
        r.handle().install_model(triangle(), None).unwrap();
        r.frame();
        let programs = r.state().backend().live_programs();
        r.handle().install_model(triangle(), Some(Texture::checker())).unwrap();
        r.frame();
        assert_eq!(r.state().backend().live_programs(), programs);
    }

    #[test]
    fn broken_edit_is_reported_and_the_last_good_source_survives_a_reload() {
        let mut r = renderer();
        let reports = r.compile_reports();
        let handle = r.handle();
        handle.install_model(triangle(), None).unwrap();
        let normals = presets::find("normals").unwrap().source;
        handle.provide_fragment_source(normals);
        handle.provide_fragment_source(BROKEN);
        r.frame();

        let good = reports.try_recv().unwrap();
        assert!(good.linked);
        assert!(good.log.is_empty());
        let bad = reports.try_recv().unwrap();
        assert!(!bad.linked);
        assert_eq!(bad.log.error_count(), 1);
        assert_eq!(r.state().fragment_source(), normals);

        handle.install_model(triangle(), None).unwrap();
        r.frame();
        let model = r.state().model().unwrap();
        assert_eq!(model.program().fragment_source(), normals);
    }

    #[test]
    fn edits_before_any_model_are_validated() {
        let mut r = renderer();
        let reports = r.compile_reports();
        r.handle().provide_fragment_source(BROKEN);
        r.frame();
        assert!(!reports.try_recv().unwrap().linked);
        assert_eq!(r.state().fragment_source(), DEFAULT_FRAGMENT_SHADER);
        assert_eq!(r.state().backend().live_programs(), 0);

        let normals = presets::find("normals").unwrap().source;
        r.handle().provide_fragment_source(normals);
        r.frame();
        assert!(reports.try_recv().unwrap().linked);
        assert_eq!(r.state().fragment_source(), normals);
        assert_eq!(r.state().backend().live_programs(), 0);
    }

    #[test]
    fn drag_rotates_by_a_full_turn_across_the_view() {
        let mut r = renderer();
        r.handle().install_model(triangle(), None).unwrap();
        r.handle()
            .drag(Vector2::new(0.25, 0.0), Vector2::new(0.0, 0.0));
        r.frame();
        let expected = TransformFactory::rotation_x(0.0) * TransformFactory::rotation_y(TAU / 4.0);
        assert_relative_eq!(r.state().model().unwrap().world(), expected, epsilon = 1e-5);
    }

    #[test]
    fn drag_without_a_model_is_ignored() {
        let mut r = renderer();
        r.handle().drag(Vector2::new(0.5, 0.5), Vector2::zeros());
        r.frame();
        assert!(r.state().model().is_none());
    }

    #[test]
    fn camera_edits_are_applied_on_the_render_thread() {
        let mut r = renderer();
        r.handle()
            .edit_camera(|camera| camera.set_position(Point3::new(0.0, 0.0, 3.0)));
        assert_eq!(r.state().camera().position().z, 1.5);
        r.frame();
        assert_eq!(r.state().camera().position().z, 3.0);
    }

    #[test]
    fn auto_rotation_applies_to_later_models() {
        let mut r = renderer();
        r.handle().set_auto_rotate(true);
        r.handle().install_model(triangle(), None).unwrap();
        r.frame();
        let model = r.state().model().unwrap();
        assert!(model.auto_rotate());
        assert_ne!(model.world(), Matrix4::identity());
    }

    #[test]
    fn still_requests_receive_the_next_frame() {
        let mut r = renderer();
        let still = r.handle().request_still();
        assert!(still.try_recv().is_err());
        r.frame();
        let image = still.try_recv().unwrap();
        assert_eq!(image.dimensions(), (16, 16));
        assert_eq!(r.render_still().dimensions(), (16, 16));
    }
}
