//! Background worker pool for disk writes and archiving.
//!
//! Frame persistence and session archiving run on a small pool of tokio
//! tasks fed by one bounded channel. The sensor-facing ingest path never
//! blocks on disk: it offers a job to the channel and drops the frame if
//! the queue is full. Session close is ordered after all in-flight frame
//! writes, so an archive can never miss a frame that was accepted before
//! the close.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::archive::SessionArchiver;
use crate::controller::SessionCloseHandle;
use crate::frame::{CalibrationTransform, PointCloudFrame};
use crate::storage::RecordingStore;
use crate::vtk::{BinaryFrameWriter, PoseTrajectoryWriter};

/// Work items accepted by the pool.
#[derive(Debug)]
pub(crate) enum Job {
    /// Persist one captured frame.
    WriteFrame {
        path: PathBuf,
        frame: PointCloudFrame,
    },
    /// Finalize a closed session: trajectory file, then archive.
    CloseSession {
        handle: SessionCloseHandle,
        notify: oneshot::Sender<PathBuf>,
    },
}

/// Counts frame writes that have been dequeued but not yet finished.
#[derive(Debug, Default)]
struct InflightGauge {
    count: AtomicUsize,
    notify: Notify,
}

impl InflightGauge {
    fn inc(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn dec(&self) {
        if self.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the count so a notify between the
            // load and the await is not lost.
            notified.as_mut().enable();
            if self.count.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Fixed-size pool of worker tasks behind a bounded job queue.
#[derive(Debug)]
pub(crate) struct WorkerPool {
    tx: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `count` workers sharing one queue of `queue_depth` jobs.
    pub(crate) fn spawn(
        count: usize,
        queue_depth: usize,
        store: RecordingStore,
        calibration: CalibrationTransform,
    ) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth);
        let rx = Arc::new(Mutex::new(rx));
        let gauge = Arc::new(InflightGauge::default());

        let workers = (0..count)
            .map(|id| {
                let rx = Arc::clone(&rx);
                let gauge = Arc::clone(&gauge);
                let store = store.clone();
                tokio::spawn(worker_loop(id, rx, gauge, store, calibration))
            })
            .collect();

        Self { tx, workers }
    }

    /// Offer a job without waiting. Returns false when the queue is full
    /// or the pool has shut down.
    pub(crate) fn try_submit(&self, job: Job) -> bool {
        self.tx.try_send(job).is_ok()
    }

    /// Enqueue a job, waiting for queue space. Returns false when the
    /// pool has shut down.
    pub(crate) async fn submit(&self, job: Job) -> bool {
        self.tx.send(job).await.is_ok()
    }

    /// Close the queue and wait for the workers to drain it.
    pub(crate) async fn shutdown(self) {
        drop(self.tx);
        for worker in self.workers {
            if let Err(err) = worker.await {
                error!(error = %err, "worker task panicked");
            }
        }
    }
}

async fn worker_loop(
    id: usize,
    rx: Arc<Mutex<mpsc::Receiver<Job>>>,
    gauge: Arc<InflightGauge>,
    store: RecordingStore,
    calibration: CalibrationTransform,
) {
    debug!(worker = id, "worker started");
    loop {
        // The gauge increment happens while still holding the receiver,
        // so a close job dequeued next always sees this write as
        // in-flight.
        let job = {
            let mut rx = rx.lock().await;
            match rx.recv().await {
                Some(job) => {
                    if matches!(job, Job::WriteFrame { .. }) {
                        gauge.inc();
                    }
                    job
                }
                None => break,
            }
        };

        match job {
            Job::WriteFrame { path, frame } => {
                write_frame(path, frame).await;
                gauge.dec();
            }
            Job::CloseSession { handle, notify } => {
                gauge.wait_idle().await;
                close_session(handle, notify, &store, calibration).await;
            }
        }
    }
    debug!(worker = id, "worker stopped");
}

async fn write_frame(path: PathBuf, frame: PointCloudFrame) {
    let result = tokio::task::spawn_blocking(move || {
        let writer = BinaryFrameWriter::new();
        writer.write(&path, &frame).map(|()| path)
    })
    .await;

    match result {
        Ok(Ok(path)) => debug!(file = %path.display(), "frame written"),
        Ok(Err(err)) if err.is_recoverable() => {
            warn!(error = %err, "frame write failed, frame dropped");
        }
        Ok(Err(err)) => error!(error = %err, "frame serialization failed, frame dropped"),
        Err(err) => error!(error = %err, "frame write task panicked"),
    }
}

async fn close_session(
    handle: SessionCloseHandle,
    notify: oneshot::Sender<PathBuf>,
    store: &RecordingStore,
    calibration: CalibrationTransform,
) {
    let store = store.clone();
    let archiver = SessionArchiver::new(store.archive_prefix());

    let result = tokio::task::spawn_blocking(move || {
        let (session_id, poses, mut files) = handle.into_parts();

        let trajectory_path = store.trajectory_path(&session_id);
        let writer = PoseTrajectoryWriter::new();
        match writer.write(&trajectory_path, &poses.into_samples(), &calibration) {
            Ok(()) => files.push(trajectory_path),
            Err(err) => {
                warn!(
                    session_id,
                    error = %err,
                    "trajectory write failed, archiving frames only"
                );
            }
        }

        archiver.archive(&session_id, &files, store.base_dir())
    })
    .await;

    match result {
        Ok(Ok(archive_path)) => {
            // The receiver may have been dropped; the archive exists
            // either way.
            let _ = notify.send(archive_path);
        }
        Ok(Err(err)) => error!(error = %err, "session archive failed"),
        Err(err) => error!(error = %err, "session close task panicked"),
    }
}
