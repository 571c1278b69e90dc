//! Per-side background-removal job slots.
//!
//! Every slot carries a [`Generation`]. A job captures the generation it was
//! started under and its result is applied only if the slot still carries
//! that generation when the completion event is consumed. Engine calls are
//! never interrupted; superseded results are simply dropped.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::events::{Generation, JobEvent, JobEventKind, Side};
use crate::matting::{BackgroundRemover, RemovalProfile};
use crate::processing::normalize::{DesignImage, NormalizedImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Idle,
    Processing,
    Ready,
    Failed,
}

/// Which of the slot's images is handed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presented {
    Nothing,
    Original,
    Processed,
}

/// What a call to [`JobManager::toggle`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// A job is already running, or there is nothing to process.
    Ignored,
    ShowingOriginal,
    ShowingProcessed,
    Started(Generation),
}

#[derive(Debug)]
pub struct DesignSlot {
    original: Option<DesignImage>,
    processed: Option<DesignImage>,
    current: Presented,
    generation: Generation,
    job: JobState,
    job_id: u64,
    progress: Option<u8>,
    last_error: Option<EngineError>,
}

impl DesignSlot {
    fn empty() -> Self {
        Self {
            original: None,
            processed: None,
            current: Presented::Nothing,
            generation: Generation::default(),
            job: JobState::Idle,
            job_id: 0,
            progress: None,
            last_error: None,
        }
    }

    pub fn original(&self) -> Option<&DesignImage> {
        self.original.as_ref()
    }

    pub fn processed(&self) -> Option<&DesignImage> {
        self.processed.as_ref()
    }

    pub fn presented(&self) -> Presented {
        self.current
    }

    /// The image currently presented downstream, if any.
    pub fn current(&self) -> Option<&DesignImage> {
        match self.current {
            Presented::Nothing => None,
            Presented::Original => self.original.as_ref(),
            Presented::Processed => self.processed.as_ref(),
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn job_state(&self) -> JobState {
        self.job
    }

    /// Last relayed engine progress (0-100) while processing.
    pub fn progress(&self) -> Option<u8> {
        self.progress
    }

    pub fn last_error(&self) -> Option<&EngineError> {
        self.last_error.as_ref()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.original.as_deref().map(NormalizedImage::name)
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_none()
    }

    fn reset(&mut self) {
        self.generation = self.generation.next();
        self.original = None;
        self.processed = None;
        self.current = Presented::Nothing;
        self.job = JobState::Idle;
        self.progress = None;
        self.last_error = None;
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemovalSettings {
    pub profile: RemovalProfile,
    /// Expiry maps to the failed path; the engine call itself keeps running.
    pub timeout: Option<Duration>,
}

pub struct JobManager {
    slots: [DesignSlot; 2],
    engine: Arc<dyn BackgroundRemover>,
    settings: RemovalSettings,
    runtime: Handle,
    events: UnboundedSender<JobEvent>,
    next_job_id: u64,
}

impl JobManager {
    pub fn new(
        engine: Arc<dyn BackgroundRemover>,
        settings: RemovalSettings,
        runtime: Handle,
        events: UnboundedSender<JobEvent>,
    ) -> Self {
        Self {
            slots: [DesignSlot::empty(), DesignSlot::empty()],
            engine,
            settings,
            runtime,
            events,
            next_job_id: 0,
        }
    }

    pub fn slot(&self, side: Side) -> &DesignSlot {
        &self.slots[side.index()]
    }

    fn slot_mut(&mut self, side: Side) -> &mut DesignSlot {
        &mut self.slots[side.index()]
    }

    /// Replaces the slot's design. Any job in flight for the old design is
    /// invalidated. Removal is not started automatically.
    pub fn upload(&mut self, side: Side, image: NormalizedImage) {
        let slot = self.slot_mut(side);
        slot.reset();
        slot.original = Some(Arc::new(image));
        slot.current = Presented::Original;
        debug!(%side, generation = slot.generation.value(), "design uploaded");
    }

    pub fn remove(&mut self, side: Side) {
        let slot = self.slot_mut(side);
        slot.reset();
        debug!(%side, generation = slot.generation.value(), "design removed");
    }

    pub fn toggle(&mut self, side: Side) -> ToggleOutcome {
        let slot = self.slot_mut(side);
        if slot.job == JobState::Processing {
            return ToggleOutcome::Ignored;
        }
        if slot.current == Presented::Processed {
            slot.current = Presented::Original;
            return ToggleOutcome::ShowingOriginal;
        }
        if slot.processed.is_some() {
            slot.current = Presented::Processed;
            return ToggleOutcome::ShowingProcessed;
        }
        let Some(original) = slot.original.clone() else {
            return ToggleOutcome::Ignored;
        };
        let generation = slot.generation;
        slot.job = JobState::Processing;
        slot.progress = Some(0);
        slot.last_error = None;
        self.next_job_id += 1;
        let job_id = self.next_job_id;
        self.slot_mut(side).job_id = job_id;
        self.spawn_job(side, generation, job_id, original);
        ToggleOutcome::Started(generation)
    }

    fn spawn_job(&self, side: Side, generation: Generation, job_id: u64, original: DesignImage) {
        let engine = Arc::clone(&self.engine);
        let profile = self.settings.profile.clone();
        let timeout = self.settings.timeout;
        let events = self.events.clone();
        debug!(
            %side,
            generation = generation.value(),
            job_id,
            model = %profile.model,
            "starting background removal"
        );

        self.runtime.spawn(async move {
            let progress_tx = events.clone();
            let work = tokio::task::spawn_blocking(move || {
                let report = |current: u32, total: u32| {
                    let _ = progress_tx.send(JobEvent {
                        side,
                        generation,
                        job_id,
                        kind: JobEventKind::Progress { current, total },
                    });
                };
                let matted = engine.remove_background(&original, &profile, &report)?;
                NormalizedImage::from_rgba(original.name(), matted)
                    .map(Arc::new)
                    .map_err(|err| EngineError::Failed(err.to_string()))
            });
            let joined = match timeout {
                Some(limit) => match tokio::time::timeout(limit, work).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        let _ = events.send(JobEvent {
                            side,
                            generation,
                            job_id,
                            kind: JobEventKind::Finished(Err(EngineError::TimedOut(limit))),
                        });
                        return;
                    }
                },
                None => work.await,
            };
            let result = joined.unwrap_or_else(|err| Err(EngineError::Aborted(err.to_string())));
            let _ = events.send(JobEvent {
                side,
                generation,
                job_id,
                kind: JobEventKind::Finished(result),
            });
        });
    }

    /// Applies one worker event. Returns `true` if the slot changed; events
    /// from a superseded generation or an abandoned job are dropped and
    /// return `false`.
    pub fn apply(&mut self, event: JobEvent) -> bool {
        let JobEvent {
            side,
            generation,
            job_id,
            kind,
        } = event;
        let slot = self.slot_mut(side);
        if slot.generation != generation
            || slot.job_id != job_id
            || slot.job != JobState::Processing
        {
            debug!(
                %side,
                stale = generation.value(),
                current = slot.generation.value(),
                job_id,
                "discarding stale removal event"
            );
            return false;
        }
        match kind {
            JobEventKind::Progress { current, total } => {
                let percent = percent(current, total);
                if slot.progress == Some(percent) {
                    return false;
                }
                slot.progress = Some(percent);
            }
            JobEventKind::Finished(Ok(processed)) => {
                slot.processed = Some(processed);
                slot.current = Presented::Processed;
                slot.job = JobState::Ready;
                slot.progress = None;
                debug!(%side, generation = generation.value(), "background removed");
            }
            JobEventKind::Finished(Err(err)) => {
                warn!(%side, error = %err, "background removal failed");
                slot.job = JobState::Failed;
                slot.progress = None;
                slot.last_error = Some(err);
            }
        }
        true
    }
}

fn percent(current: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((u64::from(current.min(total)) * 100) / u64::from(total)) as u8
}
