//! Frame driver tying the design slots, garment state, textures, camera and
//! lights together. Everything here runs on the frame context; the only work
//! that leaves it is the background-removal engine call.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::config::Configuration;
use crate::error::{DecodeError, Error};
use crate::events::{JobEvent, JobEventKind, Notification, Side};
use crate::matting::BackgroundRemover;
use crate::processing::normalize::{DesignImage, Normalizer};
use crate::render::camera::{CameraPose, OrbitCamera};
use crate::render::compositor::{DecalPlacement, GarmentState};
use crate::render::lighting::{DirectionalLight, LightingRig, LightingUniforms};
use crate::render::texture::{TextureBackend, TextureManager};
use crate::render::zones::PrintLocation;
use crate::tasks::removal::{JobManager, JobState, Presented, ToggleOutcome};

const NOTIFICATION_CAPACITY: usize = 64;

/// What the surrounding UI shows for one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub file_name: Option<String>,
    pub job_state: JobState,
    pub progress: Option<u8>,
    pub showing_processed: bool,
    pub has_image: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameLights {
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
    pub rim: DirectionalLight,
    pub ambient: f32,
}

/// Everything the rendering surface needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub decals: Vec<DecalPlacement>,
    /// Linear RGB of the garment body.
    pub base_color: [f32; 3],
    pub lights: FrameLights,
    pub camera: CameraPose,
}

pub struct Studio<B: TextureBackend> {
    normalizer: Normalizer,
    jobs: JobManager,
    job_events: mpsc::UnboundedReceiver<JobEvent>,
    garment: GarmentState,
    textures: TextureManager<B>,
    camera: OrbitCamera,
    lights: LightingRig,
    notify: broadcast::Sender<Notification>,
}

impl<B: TextureBackend> Studio<B> {
    pub fn new(
        cfg: &Configuration,
        backend: B,
        engine: Arc<dyn BackgroundRemover>,
        runtime: Handle,
    ) -> Result<Self, Error> {
        let (events_tx, job_events) = mpsc::unbounded_channel();
        let (notify, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        let camera = OrbitCamera::new(&cfg.camera);
        let mut lights = LightingRig::new(&cfg.lighting);
        lights.update(camera.position());
        Ok(Self {
            normalizer: Normalizer::new(cfg.max_dimension),
            jobs: JobManager::new(engine, cfg.background_removal.settings(), runtime, events_tx),
            job_events,
            garment: GarmentState::new(&cfg.initial_color, cfg.color_smooth_time)?,
            textures: TextureManager::new(backend, cfg.texture.settings()),
            camera,
            lights,
            notify,
        })
    }

    /// Decodes and normalizes `bytes` into the side's slot. A decode failure
    /// leaves the slot as it was.
    pub fn upload(&mut self, side: Side, bytes: &[u8], name: &str) -> Result<(), DecodeError> {
        let image = self.normalizer.normalize(bytes, name)?;
        info!(
            %side,
            name,
            width = image.width(),
            height = image.height(),
            "design uploaded"
        );
        self.jobs.upload(side, image);
        self.garment.note_upload(side);
        self.emit(Notification::SlotChanged(side));
        self.emit(Notification::GarmentChanged);
        Ok(())
    }

    pub fn toggle_background_removal(&mut self, side: Side) -> ToggleOutcome {
        let outcome = self.jobs.toggle(side);
        debug!(%side, ?outcome, "background removal toggled");
        if outcome != ToggleOutcome::Ignored {
            self.emit(Notification::SlotChanged(side));
        }
        outcome
    }

    pub fn remove(&mut self, side: Side) {
        self.jobs.remove(side);
        self.emit(Notification::SlotChanged(side));
    }

    pub fn select_color(&mut self, hex: &str) -> Result<(), Error> {
        self.garment.select_color(hex)?;
        self.emit(Notification::GarmentChanged);
        Ok(())
    }

    pub fn select_print(&mut self, side: Side, location: PrintLocation) -> Result<(), Error> {
        self.garment.select_print(side, location)?;
        self.emit(Notification::GarmentChanged);
        Ok(())
    }

    pub fn set_use_same_design(&mut self, enabled: bool) {
        self.garment.set_use_same_design(enabled);
        self.emit(Notification::GarmentChanged);
    }

    pub fn orbit(&mut self, d_azimuth: f32, d_polar: f32) {
        self.camera.orbit(d_azimuth, d_polar);
    }

    pub fn zoom(&mut self, factor: f32) {
        self.camera.zoom(factor);
    }

    pub fn status(&self, side: Side) -> SlotStatus {
        let slot = self.jobs.slot(side);
        SlotStatus {
            file_name: slot.file_name().map(str::to_owned),
            job_state: slot.job_state(),
            progress: slot.progress(),
            showing_processed: slot.presented() == Presented::Processed,
            has_image: !slot.is_empty(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notify.subscribe()
    }

    /// Applies every job event received so far. Returns how many changed a slot.
    pub fn pump_job_events(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.job_events.try_recv() {
            let side = event.side;
            let is_progress = matches!(event.kind, JobEventKind::Progress { .. });
            if !self.jobs.apply(event) {
                continue;
            }
            applied += 1;
            let notification = match (is_progress, self.jobs.slot(side).progress()) {
                (true, Some(percent)) => Notification::Progress { side, percent },
                _ => Notification::SlotChanged(side),
            };
            self.emit(notification);
        }
        applied
    }

    /// Runs one frame: drains job events, binds textures for the images each
    /// side presents, then advances camera, lights and base colour by `dt`.
    pub fn advance_frame(&mut self, dt: Duration) -> Frame {
        self.pump_job_events();

        for side in Side::ALL {
            let source = self.presented_source(side).cloned();
            self.textures.bind(side, source.as_ref());
        }

        let secs = dt.as_secs_f32();
        self.camera.advance(secs);
        self.lights.update(self.camera.position());
        self.garment.advance(secs);

        let textures = &self.textures;
        Frame {
            decals: self.garment.decals(|side| textures.handle(side).is_some()),
            base_color: self.garment.displayed_color(),
            lights: FrameLights {
                key: *self.lights.key(),
                fill: *self.lights.fill(),
                rim: *self.lights.rim(),
                ambient: self.lights.ambient(),
            },
            camera: self.camera.pose(),
        }
    }

    /// The image `side` presents, following the same-design alias.
    pub fn presented_source(&self, side: Side) -> Option<&DesignImage> {
        let source = self.garment.source_side(side);
        self.jobs.slot(source).current()
    }

    pub fn texture(&self, side: Side) -> Option<&B::Handle> {
        self.textures.handle(side)
    }

    pub fn lighting_uniforms(&self) -> LightingUniforms {
        self.lights.uniforms()
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    pub fn garment(&self) -> &GarmentState {
        &self.garment
    }

    pub fn textures(&self) -> &TextureManager<B> {
        &self.textures
    }

    pub fn is_processing(&self) -> bool {
        Side::ALL
            .into_iter()
            .any(|side| self.jobs.slot(side).job_state() == JobState::Processing)
    }

    fn emit(&self, notification: Notification) {
        // No subscribers is fine.
        let _ = self.notify.send(notification);
    }
}
