use garment_preview::error::EngineError;
use garment_preview::events::{JobEvent, JobEventKind, Side};
use garment_preview::matting::{BackgroundRemover, RemovalProfile};
use garment_preview::processing::normalize::NormalizedImage;
use garment_preview::tasks::removal::{
    JobManager, JobState, Presented, RemovalSettings, ToggleOutcome,
};
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc as std_mpsc};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Blocks every call until the test releases it.
struct Gated {
    release: Mutex<std_mpsc::Receiver<()>>,
    calls: AtomicUsize,
    fail: bool,
}

impl Gated {
    fn new() -> (Arc<Self>, std_mpsc::Sender<()>) {
        Self::build(false)
    }

    fn failing() -> (Arc<Self>, std_mpsc::Sender<()>) {
        Self::build(true)
    }

    fn build(fail: bool) -> (Arc<Self>, std_mpsc::Sender<()>) {
        let (tx, rx) = std_mpsc::channel();
        let engine = Arc::new(Self {
            release: Mutex::new(rx),
            calls: AtomicUsize::new(0),
            fail,
        });
        (engine, tx)
    }
}

impl BackgroundRemover for Gated {
    fn remove_background(
        &self,
        image: &NormalizedImage,
        _profile: &RemovalProfile,
        _progress: &dyn Fn(u32, u32),
    ) -> Result<RgbaImage, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.release
            .lock()
            .unwrap()
            .recv()
            .map_err(|_| EngineError::Failed("gate dropped".into()))?;
        if self.fail {
            return Err(EngineError::Failed("model crashed".into()));
        }
        let mut out = image.pixels().clone();
        for px in out.pixels_mut() {
            px[3] = 0;
        }
        Ok(out)
    }
}

/// The first call is abandoned by the timeout and reports late; later calls
/// report early progress and then wait on their own gate.
struct Abandoned {
    first: Mutex<std_mpsc::Receiver<()>>,
    retry: Mutex<std_mpsc::Receiver<()>>,
    calls: AtomicUsize,
}

impl BackgroundRemover for Abandoned {
    fn remove_background(
        &self,
        image: &NormalizedImage,
        _profile: &RemovalProfile,
        progress: &dyn Fn(u32, u32),
    ) -> Result<RgbaImage, EngineError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = self.first.lock().unwrap().recv();
            progress(99, 100);
        } else {
            progress(1, 100);
            let _ = self.retry.lock().unwrap().recv();
            progress(2, 100);
        }
        Ok(image.pixels().clone())
    }
}

struct Slow(Duration);

impl BackgroundRemover for Slow {
    fn remove_background(
        &self,
        image: &NormalizedImage,
        _profile: &RemovalProfile,
        progress: &dyn Fn(u32, u32),
    ) -> Result<RgbaImage, EngineError> {
        progress(0, 2);
        std::thread::sleep(self.0);
        progress(2, 2);
        Ok(image.pixels().clone())
    }
}

fn image(name: &str, shade: u8) -> NormalizedImage {
    NormalizedImage::from_rgba(name, RgbaImage::from_pixel(6, 4, Rgba([shade, 0, 0, 255])))
        .unwrap()
}

fn manager(
    engine: Arc<dyn BackgroundRemover>,
    settings: RemovalSettings,
) -> (JobManager, mpsc::UnboundedReceiver<JobEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (JobManager::new(engine, settings, Handle::current(), tx), rx)
}

/// Applies events until a completion arrives; returns what `apply` said about it.
async fn apply_until_finished(
    jobs: &mut JobManager,
    rx: &mut mpsc::UnboundedReceiver<JobEvent>,
) -> bool {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout waiting for job event")
            .expect("channel closed");
        let finished = matches!(event.kind, JobEventKind::Finished(_));
        let applied = jobs.apply(event);
        if finished {
            return applied;
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn result_for_replaced_upload_is_discarded() {
    let (engine, gate) = Gated::new();
    let (mut jobs, mut rx) = manager(engine, RemovalSettings::default());

    jobs.upload(Side::Front, image("a.png", 10));
    let ToggleOutcome::Started(started) = jobs.toggle(Side::Front) else {
        panic!("job should start");
    };
    jobs.upload(Side::Front, image("b.png", 20));
    assert!(jobs.slot(Side::Front).generation() > started);

    gate.send(()).unwrap();
    assert!(!apply_until_finished(&mut jobs, &mut rx).await);

    let slot = jobs.slot(Side::Front);
    assert_eq!(slot.file_name(), Some("b.png"));
    assert_eq!(slot.presented(), Presented::Original);
    assert_eq!(slot.job_state(), JobState::Idle);
    assert!(slot.processed().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failure_for_replaced_upload_is_discarded() {
    let (engine, gate) = Gated::failing();
    let (mut jobs, mut rx) = manager(engine, RemovalSettings::default());

    jobs.upload(Side::Back, image("old.png", 10));
    assert!(matches!(jobs.toggle(Side::Back), ToggleOutcome::Started(_)));
    jobs.upload(Side::Back, image("new.png", 20));

    gate.send(()).unwrap();
    assert!(!apply_until_finished(&mut jobs, &mut rx).await);

    let slot = jobs.slot(Side::Back);
    assert_eq!(slot.file_name(), Some("new.png"));
    assert_eq!(slot.job_state(), JobState::Idle);
    assert_eq!(slot.presented(), Presented::Original);
    assert!(slot.last_error().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn toggle_while_processing_is_a_no_op() {
    let (engine, gate) = Gated::new();
    let (mut jobs, mut rx) = manager(engine.clone(), RemovalSettings::default());

    jobs.upload(Side::Back, image("back.png", 30));
    assert!(matches!(jobs.toggle(Side::Back), ToggleOutcome::Started(_)));
    let generation = jobs.slot(Side::Back).generation();

    assert_eq!(jobs.toggle(Side::Back), ToggleOutcome::Ignored);
    assert_eq!(jobs.toggle(Side::Back), ToggleOutcome::Ignored);
    let slot = jobs.slot(Side::Back);
    assert_eq!(slot.job_state(), JobState::Processing);
    assert_eq!(slot.generation(), generation);
    assert_eq!(slot.presented(), Presented::Original);

    gate.send(()).unwrap();
    assert!(apply_until_finished(&mut jobs, &mut rx).await);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(jobs.slot(Side::Back).job_state(), JobState::Ready);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn remove_mid_job_leaves_slot_empty() {
    let (engine, gate) = Gated::new();
    let (mut jobs, mut rx) = manager(engine, RemovalSettings::default());

    jobs.upload(Side::Front, image("a.png", 10));
    assert!(matches!(jobs.toggle(Side::Front), ToggleOutcome::Started(_)));
    jobs.remove(Side::Front);

    gate.send(()).unwrap();
    assert!(!apply_until_finished(&mut jobs, &mut rx).await);

    let slot = jobs.slot(Side::Front);
    assert!(slot.is_empty());
    assert!(slot.current().is_none());
    assert!(slot.processed().is_none());
    assert_eq!(slot.job_state(), JobState::Idle);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn toggles_between_processed_and_original() {
    let (engine, gate) = Gated::new();
    let (mut jobs, mut rx) = manager(engine.clone(), RemovalSettings::default());

    jobs.upload(Side::Front, image("logo.png", 40));
    let original = Arc::clone(jobs.slot(Side::Front).original().unwrap());
    assert_eq!(jobs.slot(Side::Front).job_state(), JobState::Idle);

    assert!(matches!(jobs.toggle(Side::Front), ToggleOutcome::Started(_)));
    assert_eq!(jobs.slot(Side::Front).job_state(), JobState::Processing);
    gate.send(()).unwrap();
    assert!(apply_until_finished(&mut jobs, &mut rx).await);

    let slot = jobs.slot(Side::Front);
    assert_eq!(slot.job_state(), JobState::Ready);
    assert_eq!(slot.presented(), Presented::Processed);
    assert_eq!(slot.current().unwrap().pixels().get_pixel(0, 0)[3], 0);

    assert_eq!(jobs.toggle(Side::Front), ToggleOutcome::ShowingOriginal);
    let slot = jobs.slot(Side::Front);
    assert!(Arc::ptr_eq(slot.current().unwrap(), &original));
    assert_eq!(slot.job_state(), JobState::Ready);

    // The cached result is reused; the engine is not called again.
    assert_eq!(jobs.toggle(Side::Front), ToggleOutcome::ShowingProcessed);
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert!(
        tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_takes_failed_path() {
    let settings = RemovalSettings {
        timeout: Some(Duration::from_millis(50)),
        ..RemovalSettings::default()
    };
    let (mut jobs, mut rx) = manager(Arc::new(Slow(Duration::from_millis(400))), settings);

    jobs.upload(Side::Front, image("slow.png", 50));
    assert!(matches!(jobs.toggle(Side::Front), ToggleOutcome::Started(_)));
    assert!(apply_until_finished(&mut jobs, &mut rx).await);

    let slot = jobs.slot(Side::Front);
    assert_eq!(slot.job_state(), JobState::Failed);
    assert_eq!(slot.presented(), Presented::Original);
    assert!(matches!(slot.last_error(), Some(EngineError::TimedOut(_))));

    // A failed slot can be retried explicitly.
    assert!(matches!(jobs.toggle(Side::Front), ToggleOutcome::Started(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn progress_is_relayed_while_processing() {
    let (mut jobs, mut rx) = manager(
        Arc::new(Slow(Duration::from_millis(20))),
        RemovalSettings::default(),
    );
    jobs.upload(Side::Back, image("p.png", 60));
    jobs.toggle(Side::Back);
    assert_eq!(jobs.slot(Side::Back).progress(), Some(0));

    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        let finished = matches!(event.kind, JobEventKind::Finished(_));
        jobs.apply(event);
        if finished {
            break;
        }
        seen.extend(jobs.slot(Side::Back).progress());
    }
    assert_eq!(seen.last(), Some(&100));
    assert_eq!(jobs.slot(Side::Back).progress(), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_progress_from_timed_out_call_does_not_reach_retry() {
    let (first_tx, first_rx) = std_mpsc::channel();
    let (retry_tx, retry_rx) = std_mpsc::channel();
    let engine = Arc::new(Abandoned {
        first: Mutex::new(first_rx),
        retry: Mutex::new(retry_rx),
        calls: AtomicUsize::new(0),
    });
    let settings = RemovalSettings {
        timeout: Some(Duration::from_millis(300)),
        ..RemovalSettings::default()
    };
    let (mut jobs, mut rx) = manager(engine, settings);

    jobs.upload(Side::Front, image("logo.png", 70));
    assert!(matches!(jobs.toggle(Side::Front), ToggleOutcome::Started(_)));
    assert!(apply_until_finished(&mut jobs, &mut rx).await);
    assert_eq!(jobs.slot(Side::Front).job_state(), JobState::Failed);

    // Same design, same generation: only the job differs.
    assert!(matches!(jobs.toggle(Side::Front), ToggleOutcome::Started(_)));
    first_tx.send(()).unwrap();

    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timeout waiting for job event")
            .expect("channel closed");
        let late = matches!(event.kind, JobEventKind::Progress { current: 99, .. });
        let applied = jobs.apply(event);
        if late {
            assert!(!applied);
            break;
        }
    }
    assert_ne!(jobs.slot(Side::Front).progress(), Some(99));
    assert_eq!(jobs.slot(Side::Front).job_state(), JobState::Processing);

    retry_tx.send(()).unwrap();
    assert!(apply_until_finished(&mut jobs, &mut rx).await);
    assert_eq!(jobs.slot(Side::Front).job_state(), JobState::Ready);
}
