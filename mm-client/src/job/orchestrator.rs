//! Mastering job state machine
//!
//! `Idle → Uploading → Submitting → Polling → {Completed | Failed}`
//!
//! Every `start()` and `cancel()` bumps a generation counter. Each
//! continuation of a chain (upload done, job created, poll response) checks
//! its generation under the state lock before touching the snapshot, so a
//! superseded chain can never overwrite a newer job. The scheduled poll task
//! of a superseded chain is also aborted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mm_common::api::{JobStatus, JobStatusResponse};
use mm_common::events::{EventBus, FailureKind, JobPhase, JobSnapshot, MmEvent};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::intent::MasteringIntent;
use super::poll::PollPolicy;
use crate::api::MasteringBackend;
use crate::error::{Error, Result};
use crate::upload::UploadCoordinator;

/// Owns the lifecycle of one mastering job at a time
pub struct JobOrchestrator {
    backend: Arc<dyn MasteringBackend>,
    uploads: UploadCoordinator,
    policy: PollPolicy,
    shared: Arc<Shared>,
}

struct Shared {
    chain: Mutex<ChainState>,
    snapshot_tx: watch::Sender<JobSnapshot>,
    events: EventBus,
}

#[derive(Default)]
struct ChainState {
    generation: u64,
    poll_task: Option<JoinHandle<()>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.chain.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Invalidate whatever chain is running and publish `initial` for the
    /// new generation
    fn advance(&self, initial: impl FnOnce(u64) -> JobSnapshot) -> u64 {
        let mut chain = self.lock();
        chain.generation += 1;
        if let Some(task) = chain.poll_task.take() {
            task.abort();
        }

        let snapshot = initial(chain.generation);
        self.snapshot_tx.send_replace(snapshot.clone());
        self.events.emit_lossy(MmEvent::job(snapshot));
        chain.generation
    }

    /// Apply `update` and publish, unless `generation` was superseded
    fn publish(&self, generation: u64, update: impl FnOnce(&mut JobSnapshot)) -> bool {
        let chain = self.lock();
        if chain.generation != generation {
            return false;
        }

        let mut snapshot = self.snapshot_tx.borrow().clone();
        update(&mut snapshot);
        snapshot.generation = generation;
        self.snapshot_tx.send_replace(snapshot.clone());
        self.events.emit_lossy(MmEvent::job(snapshot));
        true
    }

    /// Mark the chain failed; returns the error to hand back to the caller
    fn fail(&self, generation: u64, kind: FailureKind, message: String, cause: Error) -> Error {
        let applied = self.publish(generation, |s| {
            s.phase = JobPhase::Failed;
            s.status = JobStatus::Failed;
            s.message = message;
            s.output_files.clear();
            s.failure = Some(kind);
        });

        if applied {
            cause
        } else {
            Error::Superseded
        }
    }
}

impl JobOrchestrator {
    pub fn new(backend: Arc<dyn MasteringBackend>, events: EventBus, policy: PollPolicy) -> Self {
        let (snapshot_tx, _) = watch::channel(JobSnapshot::idle());

        Self {
            uploads: UploadCoordinator::new(Arc::clone(&backend)),
            backend,
            policy,
            shared: Arc::new(Shared {
                chain: Mutex::new(ChainState::default()),
                snapshot_tx,
                events,
            }),
        }
    }

    /// Validate, upload, submit and begin polling
    ///
    /// Resolves once polling has been scheduled, returning the backend job
    /// id. Validation failures leave the state untouched. Upload and
    /// submission failures move the job to `Failed`. If another `start()` or
    /// `cancel()` supersedes this chain while it is suspended, the chain
    /// stops and returns [`Error::Superseded`].
    pub async fn start(&self, intent: MasteringIntent) -> Result<String> {
        let plan = intent.validate()?;

        let generation = self.shared.advance(|generation| JobSnapshot {
            generation,
            phase: JobPhase::Uploading,
            status: JobStatus::Uploading,
            message: "Uploading files...".to_string(),
            ..JobSnapshot::idle()
        });

        info!(
            generation,
            mode = %plan.mode,
            target = %plan.target.name,
            "Starting mastering job"
        );

        let uploaded = match self
            .uploads
            .upload_all(&plan.target, plan.reference_file.as_ref())
            .await
        {
            Ok(uploaded) => uploaded,
            Err(e) => return Err(self.fail_start(generation, e)),
        };

        if !self.shared.publish(generation, |s| {
            s.phase = JobPhase::Submitting;
            s.message = "Submitting mastering job...".to_string();
        }) {
            debug!(generation, "Chain superseded after upload");
            return Err(Error::Superseded);
        }

        let request = plan.request(uploaded.target, uploaded.reference);
        let created = match self.backend.create_job(&request).await {
            Ok(created) => created,
            Err(e) => return Err(self.fail_start(generation, e)),
        };
        let job_id = created.job_id;

        if !self.shared.publish(generation, |s| {
            s.phase = JobPhase::Polling;
            s.job_id = Some(job_id.clone());
            s.status = JobStatus::Pending;
            s.progress = 0;
            s.message = "Job created".to_string();
        }) {
            debug!(generation, job_id = %job_id, "Chain superseded after submission");
            return Err(Error::Superseded);
        }

        info!(generation, job_id = %job_id, "Mastering job created, polling status");

        let task = tokio::spawn(poll_job(
            Arc::clone(&self.backend),
            Arc::clone(&self.shared),
            self.policy,
            job_id.clone(),
            generation,
        ));

        let mut chain = self.shared.lock();
        if chain.generation == generation {
            chain.poll_task = Some(task);
        } else {
            task.abort();
            return Err(Error::Superseded);
        }

        Ok(job_id)
    }

    fn fail_start(&self, generation: u64, cause: Error) -> Error {
        warn!(generation, error = %cause, "Error starting mastering job");
        let message = format!("Error starting mastering job: {}", cause);
        self.shared
            .fail(generation, FailureKind::Transport, message, cause)
    }

    /// Stop the current chain and return to `Idle`
    pub fn cancel(&self) {
        let generation = self.shared.advance(|generation| JobSnapshot {
            generation,
            ..JobSnapshot::idle()
        });
        info!(generation, "Mastering job cancelled");
    }

    /// Current snapshot
    pub fn snapshot(&self) -> JobSnapshot {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Every transition and successful poll, as [`MmEvent::JobStateChanged`]
    pub fn subscribe(&self) -> broadcast::Receiver<MmEvent> {
        self.shared.events.subscribe()
    }

    /// Latest-value view of the snapshot
    pub fn watch(&self) -> watch::Receiver<JobSnapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.shared.lock().generation
    }

    /// Resolve once the current job reaches `Completed` or `Failed`
    ///
    /// Returns [`Error::NoActiveJob`] when idle and [`Error::Superseded`] if
    /// the job is replaced or cancelled while waiting.
    pub async fn wait_for_terminal(&self) -> Result<JobSnapshot> {
        let mut rx = self.shared.snapshot_tx.subscribe();
        let generation = rx.borrow().generation;

        loop {
            {
                let snapshot = rx.borrow_and_update();
                if snapshot.generation != generation {
                    return Err(Error::Superseded);
                }
                if snapshot.phase == JobPhase::Idle {
                    return Err(Error::NoActiveJob);
                }
                if snapshot.phase.is_terminal() {
                    return Ok(snapshot.clone());
                }
            }

            rx.changed().await.map_err(|_| Error::SessionClosed)?;
        }
    }
}

impl Drop for JobOrchestrator {
    fn drop(&mut self) {
        let mut chain = self.shared.lock();
        chain.generation += 1;
        if let Some(task) = chain.poll_task.take() {
            task.abort();
        }
    }
}

/// Poll until a terminal status, the retry budget runs out, or the chain is
/// superseded
async fn poll_job(
    backend: Arc<dyn MasteringBackend>,
    shared: Arc<Shared>,
    policy: PollPolicy,
    job_id: String,
    generation: u64,
) {
    let mut failures: u32 = 0;

    loop {
        if !shared.is_current(generation) {
            return;
        }

        match backend.job_status(&job_id).await {
            Ok(response) => {
                failures = 0;

                if !shared.publish(generation, |s| apply_status(s, &response)) {
                    debug!(job_id = %job_id, generation, "Discarding stale poll response");
                    return;
                }

                match response.status {
                    JobStatus::Completed => {
                        info!(
                            job_id = %job_id,
                            outputs = response.output_files.as_ref().map(|f| f.len()).unwrap_or(0),
                            "Mastering completed"
                        );
                        return;
                    }
                    JobStatus::Failed => {
                        warn!(job_id = %job_id, message = %response.message, "Mastering failed");
                        return;
                    }
                    status => {
                        debug!(
                            job_id = %job_id,
                            %status,
                            progress = response.clamped_progress(),
                            "Job in progress"
                        );
                    }
                }

                tokio::time::sleep(policy.interval).await;
            }
            Err(e) => {
                failures += 1;

                if failures > policy.max_retries {
                    warn!(job_id = %job_id, error = %e, "Error checking job status, giving up");
                    let message = format!("Error checking job status: {}", e);
                    shared.fail(generation, FailureKind::Transport, message, e);
                    return;
                }

                let delay = policy.backoff(failures);
                warn!(
                    job_id = %job_id,
                    error = %e,
                    attempt = failures,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    "Status poll failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Replace the cached job fields with a poll response
fn apply_status(snapshot: &mut JobSnapshot, response: &JobStatusResponse) {
    snapshot.status = response.status;
    snapshot.progress = response.clamped_progress();
    snapshot.message = response.message.clone();
    snapshot.output_files.clear();
    snapshot.failure = None;

    match response.status {
        JobStatus::Completed => {
            snapshot.phase = JobPhase::Completed;
            snapshot.output_files = response.output_files.clone().unwrap_or_default();
        }
        JobStatus::Failed => {
            snapshot.phase = JobPhase::Failed;
            snapshot.failure = Some(FailureKind::Backend);
            if snapshot.message.is_empty() {
                snapshot.message = "Mastering failed".to_string();
            }
        }
        _ => snapshot.phase = JobPhase::Polling,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportStage;
    use crate::resolver::{MasteredOutputs, MediaSourceResolver, SourceInputs};
    use crate::upload::LocalAudioFile;
    use async_trait::async_trait;
    use mm_common::api::{
        CreateJobResponse, Genre, MasterJobRequest, MasteringMode, UploadResponse,
    };
    use mm_common::events::{MediaSource, TrackSelection};
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;
    use tokio::sync::Notify;

    type Scripted = std::result::Result<JobStatusResponse, String>;

    /// Backend whose poll responses are scripted per job id
    ///
    /// Once a job's script runs out it keeps answering `processing 50`.
    #[derive(Default)]
    struct ScriptedBackend {
        fail_uploads: Option<String>,
        uploads: Mutex<Vec<String>>,
        requests: Mutex<Vec<MasterJobRequest>>,
        scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
        polls: Mutex<HashMap<String, usize>>,
        /// Holds the next upload until notified
        upload_gate: Mutex<Option<Arc<Notify>>>,
        /// Holds the next job creation until notified
        create_gate: Mutex<Option<Arc<Notify>>>,
    }

    impl ScriptedBackend {
        fn hold_next_upload(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.upload_gate.lock().unwrap() = Some(Arc::clone(&gate));
            gate
        }

        fn hold_next_create(&self) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            *self.create_gate.lock().unwrap() = Some(Arc::clone(&gate));
            gate
        }

        fn script(&self, job_id: &str, responses: Vec<Scripted>) {
            self.scripts
                .lock()
                .unwrap()
                .insert(job_id.to_string(), responses.into());
        }

        fn polls_for(&self, job_id: &str) -> usize {
            self.polls.lock().unwrap().get(job_id).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl MasteringBackend for ScriptedBackend {
        async fn upload(&self, file: &LocalAudioFile) -> Result<UploadResponse> {
            let gate = self.upload_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if let Some(reason) = &self.fail_uploads {
                return Err(Error::transport(TransportStage::Upload, reason.clone()));
            }
            self.uploads.lock().unwrap().push(file.name.clone());
            Ok(UploadResponse {
                filename: format!("srv_{}", file.name),
                file_id: None,
                original_name: Some(file.name.clone()),
                size: Some(file.size),
            })
        }

        async fn create_job(&self, request: &MasterJobRequest) -> Result<CreateJobResponse> {
            let gate = self.create_gate.lock().unwrap().take();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            Ok(CreateJobResponse {
                job_id: format!("job-{}", requests.len()),
                status: Some(JobStatus::Pending),
            })
        }

        async fn job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
            *self.polls.lock().unwrap().entry(job_id.to_string()).or_default() += 1;
            let next = self
                .scripts
                .lock()
                .unwrap()
                .get_mut(job_id)
                .and_then(|script| script.pop_front());

            match next {
                Some(Ok(response)) => Ok(response),
                Some(Err(reason)) => Err(Error::transport(TransportStage::Poll, reason)),
                None => Ok(status(JobStatus::Processing, 50.0, "Processing", None)),
            }
        }
    }

    fn status(status: JobStatus, progress: f64, message: &str, files: Option<&[&str]>) -> JobStatusResponse {
        JobStatusResponse {
            job_id: None,
            status,
            progress,
            message: message.to_string(),
            output_files: files.map(|f| f.iter().map(|s| s.to_string()).collect()),
            created_at: None,
            completed_at: None,
        }
    }

    fn orchestrator(backend: &Arc<ScriptedBackend>, policy: PollPolicy) -> JobOrchestrator {
        let backend: Arc<dyn MasteringBackend> = backend.clone();
        JobOrchestrator::new(backend, EventBus::new(64), policy)
    }

    fn song() -> LocalAudioFile {
        LocalAudioFile::new("song.wav", 4096)
    }

    fn drain(rx: &mut broadcast::Receiver<MmEvent>) -> Vec<JobSnapshot> {
        let mut snapshots = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let MmEvent::JobStateChanged { snapshot, .. } = event {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }

    /// **Given** a reference-mode intent with only a URL
    /// **When** the backend reports processing 30, processing 75, completed
    /// **Then** exactly one upload and one job creation happen, the job ends
    /// `Completed` with the produced files and the resolver streams the MP3
    #[tokio::test(start_paused = true)]
    async fn test_reference_url_job_runs_to_completion() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script(
            "job-1",
            vec![
                Ok(status(JobStatus::Processing, 30.0, "Analyzing reference", None)),
                Ok(status(JobStatus::Processing, 75.0, "Mastering", None)),
                Ok(status(
                    JobStatus::Completed,
                    100.0,
                    "Done",
                    Some(&["mastered_pcm16.wav", "mastered_pcm24.wav", "mastered.mp3"]),
                )),
            ],
        );
        let orchestrator = orchestrator(&backend, PollPolicy::default());
        let mut events = orchestrator.subscribe();

        let intent = MasteringIntent::reference(
            song(),
            None,
            Some("https://www.youtube.com/watch?v=abc".to_string()),
        );
        let job_id = orchestrator.start(intent).await.expect("start");
        assert_eq!(job_id, "job-1");

        let terminal = orchestrator.wait_for_terminal().await.expect("terminal");
        assert_eq!(terminal.phase, JobPhase::Completed);
        assert_eq!(terminal.progress, 100);
        assert_eq!(
            terminal.output_files,
            vec!["mastered_pcm16.wav", "mastered_pcm24.wav", "mastered.mp3"]
        );

        assert_eq!(*backend.uploads.lock().unwrap(), vec!["song.wav".to_string()]);
        let requests = backend.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target_file, "srv_song.wav");
        assert_eq!(requests[0].reference_file, None);
        assert_eq!(
            requests[0].youtube_url.as_deref(),
            Some("https://www.youtube.com/watch?v=abc")
        );

        // No polls after the terminal response
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(backend.polls_for("job-1"), 3);

        let phases: Vec<(JobPhase, u8)> = drain(&mut events)
            .iter()
            .map(|s| (s.phase, s.progress))
            .collect();
        assert_eq!(
            phases,
            vec![
                (JobPhase::Uploading, 0),
                (JobPhase::Submitting, 0),
                (JobPhase::Polling, 0),
                (JobPhase::Polling, 30),
                (JobPhase::Polling, 75),
                (JobPhase::Completed, 100),
            ]
        );

        let resolver = MediaSourceResolver::new(reqwest::Url::parse("http://localhost:8000").unwrap());
        let inputs = SourceInputs {
            original: None,
            mastered: Some(MasteredOutputs {
                job_id,
                output_files: terminal.output_files.clone(),
            }),
        };
        match resolver.resolve(TrackSelection::Mastered, &inputs) {
            Some(MediaSource::Remote { filename, .. }) => assert_eq!(filename, "mastered.mp3"),
            other => panic!("Expected remote source, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_standalone_jazz_job_is_submitted() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script(
            "job-1",
            vec![Ok(status(JobStatus::Completed, 100.0, "Done", Some(&["mastered.mp3"])))],
        );
        let orchestrator = orchestrator(&backend, PollPolicy::default());

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Jazz))
            .await
            .expect("standalone jazz passes validation");
        orchestrator.wait_for_terminal().await.unwrap();

        let requests = backend.requests.lock().unwrap().clone();
        assert_eq!(requests[0].mastering_mode, MasteringMode::Standalone);
        assert_eq!(requests[0].genre, Some(Genre::Jazz));
        assert!(requests[0].reference_file.is_none());
        assert!(requests[0].youtube_url.is_none());
    }

    /// **Given** an upload that fails in transport
    /// **When** a job is started
    /// **Then** the job is `Failed` and job creation is never called
    #[tokio::test(start_paused = true)]
    async fn test_upload_failure_never_creates_job() {
        let backend = Arc::new(ScriptedBackend {
            fail_uploads: Some("connection refused".to_string()),
            ..Default::default()
        });
        let orchestrator = orchestrator(&backend, PollPolicy::default());

        let result = orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await;
        assert!(matches!(
            result,
            Err(Error::Transport { stage: TransportStage::Upload, .. })
        ));

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.phase, JobPhase::Failed);
        assert_eq!(snapshot.failure, Some(FailureKind::Transport));
        assert!(snapshot.message.starts_with("Error starting mastering job"));
        assert!(backend.requests.lock().unwrap().is_empty());
        assert_eq!(
            orchestrator.wait_for_terminal().await.unwrap().phase,
            JobPhase::Failed
        );
    }

    #[tokio::test]
    async fn test_validation_failure_leaves_state_idle() {
        let backend = Arc::new(ScriptedBackend::default());
        let orchestrator = orchestrator(&backend, PollPolicy::default());
        let mut events = orchestrator.subscribe();

        let result = orchestrator
            .start(MasteringIntent::reference(song(), None, None))
            .await;

        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(orchestrator.snapshot(), JobSnapshot::idle());
        assert!(backend.uploads.lock().unwrap().is_empty());
        assert!(drain(&mut events).is_empty());
        assert!(matches!(
            orchestrator.wait_for_terminal().await,
            Err(Error::NoActiveJob)
        ));
    }

    /// **Given** a job being polled
    /// **When** a second job is started
    /// **Then** the first job is never polled again and its responses never
    /// reach the snapshot
    #[tokio::test(start_paused = true)]
    async fn test_restart_discards_previous_poll() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script(
            "job-1",
            vec![
                Ok(status(JobStatus::Processing, 10.0, "first", None)),
                Ok(status(JobStatus::Completed, 100.0, "first done", Some(&["old.mp3"]))),
            ],
        );
        backend.script(
            "job-2",
            vec![Ok(status(JobStatus::Processing, 20.0, "second", None))],
        );
        let orchestrator = orchestrator(&backend, PollPolicy::default());
        let intent = MasteringIntent::standalone(song(), Genre::Rock);

        orchestrator.start(intent.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(backend.polls_for("job-1"), 1);
        assert_eq!(orchestrator.snapshot().progress, 10);

        let second = orchestrator.start(intent).await.unwrap();
        assert_eq!(second, "job-2");

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(backend.polls_for("job-1"), 1);
        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.job_id.as_deref(), Some("job-2"));
        assert_eq!(snapshot.phase, JobPhase::Polling);
        assert!(snapshot.output_files.is_empty());
        assert_eq!(snapshot.generation, orchestrator.generation());
    }

    /// **Given** a chain parked in its upload
    /// **When** a second `start()` runs to completion and the upload then
    /// finishes
    /// **Then** the first chain stops with `Superseded` before creating a job
    #[tokio::test(start_paused = true)]
    async fn test_restart_during_upload_supersedes_first_chain() {
        let backend = Arc::new(ScriptedBackend::default());
        let orchestrator = orchestrator(&backend, PollPolicy::default());
        let gate = backend.hold_next_upload();

        let (first, second) = tokio::join!(
            orchestrator.start(MasteringIntent::standalone(song(), Genre::Rock)),
            async {
                let second = orchestrator
                    .start(MasteringIntent::standalone(
                        LocalAudioFile::new("take2.wav", 512),
                        Genre::Jazz,
                    ))
                    .await;
                gate.notify_one();
                second
            }
        );

        assert!(matches!(first, Err(Error::Superseded)));
        assert_eq!(second.expect("second start"), "job-1");

        let requests = backend.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].target_file, "srv_take2.wav");

        let snapshot = orchestrator.snapshot();
        assert_eq!(snapshot.job_id.as_deref(), Some("job-1"));
        assert_eq!(snapshot.phase, JobPhase::Polling);
        assert_eq!(snapshot.generation, orchestrator.generation());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_during_submission_never_polls_first_job() {
        let backend = Arc::new(ScriptedBackend::default());
        let orchestrator = orchestrator(&backend, PollPolicy::default());
        let gate = backend.hold_next_create();

        let (first, second) = tokio::join!(
            orchestrator.start(MasteringIntent::standalone(song(), Genre::Rock)),
            async {
                let second = orchestrator
                    .start(MasteringIntent::standalone(
                        LocalAudioFile::new("take2.wav", 512),
                        Genre::Jazz,
                    ))
                    .await;
                gate.notify_one();
                second
            }
        );

        assert!(matches!(first, Err(Error::Superseded)));
        assert_eq!(second.expect("second start"), "job-1");
        assert_eq!(backend.requests.lock().unwrap().len(), 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.polls_for("job-2"), 0);
        assert!(backend.polls_for("job-1") > 0);
        assert_eq!(orchestrator.snapshot().job_id.as_deref(), Some("job-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_is_clamped() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script(
            "job-1",
            vec![
                Ok(status(JobStatus::Processing, 150.0, "over", None)),
                Ok(status(JobStatus::Processing, -5.0, "under", None)),
                Ok(status(JobStatus::Failed, 42.6, "", None)),
            ],
        );
        let orchestrator = orchestrator(&backend, PollPolicy::default());
        let mut events = orchestrator.subscribe();

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await
            .unwrap();
        let terminal = orchestrator.wait_for_terminal().await.unwrap();

        let progress: Vec<u8> = drain(&mut events)
            .iter()
            .filter(|s| s.phase != JobPhase::Uploading && s.phase != JobPhase::Submitting)
            .map(|s| s.progress)
            .collect();
        assert_eq!(progress, vec![0, 100, 0, 43]);
        assert_eq!(terminal.failure, Some(FailureKind::Backend));
        assert_eq!(terminal.error(), Some("Mastering failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_exposes_server_message() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script(
            "job-1",
            vec![Ok(status(JobStatus::Failed, 0.0, "Reference download failed", None))],
        );
        let orchestrator = orchestrator(&backend, PollPolicy::default());

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await
            .unwrap();
        let terminal = orchestrator.wait_for_terminal().await.unwrap();

        assert_eq!(terminal.phase, JobPhase::Failed);
        assert_eq!(terminal.failure, Some(FailureKind::Backend));
        assert_eq!(terminal.error(), Some("Reference download failed"));
        assert!(terminal.output_files.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_errors_are_retried() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script(
            "job-1",
            vec![
                Err("timed out".to_string()),
                Err("timed out".to_string()),
                Ok(status(JobStatus::Completed, 100.0, "Done", Some(&["mastered.mp3"]))),
            ],
        );
        let orchestrator = orchestrator(&backend, PollPolicy::default());

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await
            .unwrap();
        let terminal = orchestrator.wait_for_terminal().await.unwrap();

        assert_eq!(terminal.phase, JobPhase::Completed);
        assert_eq!(backend.polls_for("job-1"), 3);
    }

    /// **Given** a backend that keeps failing status polls
    /// **When** the retry budget is exhausted
    /// **Then** the job fails with a transport failure, distinct from a
    /// backend-reported failure
    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fail_job() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script("job-1", (0..10).map(|_| Err("unreachable".to_string())).collect());
        let orchestrator = orchestrator(&backend, PollPolicy::new(Duration::from_millis(2000), 3));

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await
            .unwrap();
        let terminal = orchestrator.wait_for_terminal().await.unwrap();

        assert_eq!(terminal.phase, JobPhase::Failed);
        assert_eq!(terminal.failure, Some(FailureKind::Transport));
        assert!(terminal.message.starts_with("Error checking job status"));
        assert_eq!(backend.polls_for("job-1"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_fail_fast() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.script("job-1", vec![Err("unreachable".to_string())]);
        let orchestrator = orchestrator(&backend, PollPolicy::new(Duration::from_millis(2000), 0));

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await
            .unwrap();
        let terminal = orchestrator.wait_for_terminal().await.unwrap();

        assert_eq!(terminal.failure, Some(FailureKind::Transport));
        assert_eq!(backend.polls_for("job-1"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_polling() {
        let backend = Arc::new(ScriptedBackend::default());
        let orchestrator = orchestrator(&backend, PollPolicy::default());

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        orchestrator.cancel();

        let polls = backend.polls_for("job-1");
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(backend.polls_for("job-1"), polls);
        assert_eq!(orchestrator.snapshot().phase, JobPhase::Idle);
        assert!(matches!(
            orchestrator.wait_for_terminal().await,
            Err(Error::NoActiveJob)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_is_superseded_by_cancel() {
        let backend = Arc::new(ScriptedBackend::default());
        let orchestrator = Arc::new(orchestrator(&backend, PollPolicy::default()));

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await
            .unwrap();

        let waiter = {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.wait_for_terminal().await })
        };
        tokio::time::sleep(Duration::from_secs(5)).await;
        orchestrator.cancel();

        let result = waiter.await.expect("join");
        assert!(matches!(result, Err(Error::Superseded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_poll_task() {
        let backend = Arc::new(ScriptedBackend::default());
        let orchestrator = orchestrator(&backend, PollPolicy::default());

        orchestrator
            .start(MasteringIntent::standalone(song(), Genre::Pop))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(orchestrator);

        let polls = backend.polls_for("job-1");
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.polls_for("job-1"), polls);
    }
}
