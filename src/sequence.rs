//! Recorded command batches with an explicit lifecycle.
//!
//! A [`Sequence`] moves through `New -> Recording -> Recorded -> Submitted`
//! and back to `Recorded` when a submission completes. Transitions are
//! strict: each call names the state it needs and fails with
//! [`SurgeError::InvalidState`] from any other, there is no implicit
//! `begin`. The native command buffer is built once in [`end`](Sequence::end)
//! and, because a `wgpu` command buffer can only be submitted once, rebuilt
//! from the recorded op list on every replay. Replays are observably
//! identical to resubmitting one native buffer.
//!
//! Submission is decoupled from completion: [`eval_async`](Sequence::eval_async)
//! returns a [`SubmitHandle`] and [`eval_await`](Sequence::eval_await) takes
//! it back, so work on several logical queues can overlap before any of it
//! is awaited.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::SurgeError;
use crate::gpu::context::ComputeContext;
use crate::operation::Operation;
use crate::options::ExecutionOptions;
use crate::util::lock;

/// Lifecycle states of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// Created, nothing recorded yet.
    New,
    /// Between `begin()` and `end()`.
    Recording,
    /// Ops translated to commands, ready to submit or re-record.
    Recorded,
    /// A submission is in flight; only `eval_await` makes progress.
    Submitted,
}

impl SequenceState {
    const fn name(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Recording => "recording",
            Self::Recorded => "recorded",
            Self::Submitted => "submitted",
        }
    }
}

/// Identity of one asynchronous submission, returned by `eval_async` and
/// required by `eval_await`. A handle is stale once its submission
/// completed; awaiting a stale handle fails with [`SurgeError::NotFound`].
#[derive(Clone)]
pub struct SubmitHandle {
    sequence: String,
    serial: u64,
    index: wgpu::SubmissionIndex,
    done: Arc<AtomicBool>,
}

impl SubmitHandle {
    /// Name of the sequence that produced this handle.
    #[must_use]
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Monotonic per-sequence submission number.
    #[must_use]
    pub const fn serial(&self) -> u64 {
        self.serial
    }

    /// Whether the device has signalled completion. Completion still has to
    /// be collected through `eval_await` to run the post phase.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for SubmitHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitHandle")
            .field("sequence", &self.sequence)
            .field("serial", &self.serial)
            .field("done", &self.is_done())
            .finish()
    }
}

struct RecordedOp {
    op: Operation,
    consumed: bool,
}

struct InFlight {
    serial: u64,
    index: wgpu::SubmissionIndex,
    done: Arc<AtomicBool>,
}

struct Inner {
    state: SequenceState,
    ops: Vec<RecordedOp>,
    built: Option<wgpu::CommandBuffer>,
    in_flight: Option<InFlight>,
    next_serial: u64,
}

/// One recorded batch of operations bound to a logical queue.
pub struct Sequence {
    label: String,
    queue_index: u32,
    ctx: Arc<ComputeContext>,
    poll_interval: Duration,
    default_timeout: Option<Duration>,
    inner: Mutex<Inner>,
    destroyed: AtomicBool,
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.label)
            .field("queue_index", &self.queue_index)
            .field("state", &self.state())
            .field("ops", &self.op_count())
            .finish()
    }
}

impl Sequence {
    pub(crate) fn new(
        ctx: Arc<ComputeContext>,
        label: String,
        queue_index: u32,
        execution: &ExecutionOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            label,
            queue_index,
            ctx,
            poll_interval: Duration::from_micros(execution.poll_interval_us),
            default_timeout: execution
                .default_timeout_ms
                .map(Duration::from_millis),
            inner: Mutex::new(Inner {
                state: SequenceState::New,
                ops: Vec::new(),
                built: None,
                in_flight: None,
                next_serial: 0,
            }),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Sequence name; registered names are caller-chosen, anonymous ones
    /// generated.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.label
    }

    /// Logical queue this sequence submits on.
    #[must_use]
    pub const fn queue_index(&self) -> u32 {
        self.queue_index
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SequenceState {
        lock(&self.inner).state
    }

    /// Number of recorded operations.
    #[must_use]
    pub fn op_count(&self) -> usize {
        lock(&self.inner).ops.len()
    }

    /// `false` once destroyed. Reading this on a destroyed sequence is
    /// allowed, for defensive checks.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        !self.destroyed.load(Ordering::Acquire)
    }

    /// Handle for the submission currently in flight, if any. Lets a caller
    /// that lost its handle (or timed out inside `eval`) still await.
    #[must_use]
    pub fn current_submission(&self) -> Option<SubmitHandle> {
        lock(&self.inner).in_flight.as_ref().map(|f| SubmitHandle {
            sequence: self.label.clone(),
            serial: f.serial,
            index: f.index.clone(),
            done: Arc::clone(&f.done),
        })
    }

    /// New/Recorded -> Recording. Clears previously recorded ops and the
    /// built command buffer.
    ///
    /// # Errors
    ///
    /// [`SurgeError::InvalidState`] while Recording or Submitted,
    /// [`SurgeError::UseAfterDestroy`] after teardown.
    pub fn begin(&self) -> Result<(), SurgeError> {
        self.guard_live()?;
        let mut inner = lock(&self.inner);
        match inner.state {
            SequenceState::New | SequenceState::Recorded => {
                inner.ops.clear();
                inner.built = None;
                inner.state = SequenceState::Recording;
                Ok(())
            }
            state @ (SequenceState::Recording | SequenceState::Submitted) => {
                Err(invalid_state("an idle sequence", state))
            }
        }
    }

    /// Append one operation while Recording. Create-class ops allocate or
    /// build their target here, at record time.
    ///
    /// # Errors
    ///
    /// [`SurgeError::InvalidState`] outside Recording,
    /// [`SurgeError::AlreadyInitialized`] when a create-class op targets an
    /// already-initialized object. Failures leave the sequence Recording.
    pub fn record(&self, op: Operation) -> Result<(), SurgeError> {
        self.guard_live()?;
        let mut inner = lock(&self.inner);
        if inner.state != SequenceState::Recording {
            return Err(invalid_state("a recording sequence", inner.state));
        }
        op.record(&self.ctx)?;
        log::debug!("{}: recorded {}", self.label, op.kind());
        inner.ops.push(RecordedOp {
            op,
            consumed: false,
        });
        Ok(())
    }

    /// Recording -> Recorded. Translates the op list into one native
    /// command buffer.
    ///
    /// # Errors
    ///
    /// [`SurgeError::InvalidState`] outside Recording. On a translation
    /// failure the sequence stays Recording so the caller can inspect and
    /// retry.
    pub fn end(&self) -> Result<(), SurgeError> {
        self.guard_live()?;
        let mut inner = lock(&self.inner);
        if inner.state != SequenceState::Recording {
            return Err(invalid_state("a recording sequence", inner.state));
        }
        let built = encode_all(&self.ctx, &self.label, &inner.ops)?;
        inner.built = Some(built);
        inner.state = SequenceState::Recorded;
        log::debug!("{}: ended with {} ops", self.label, inner.ops.len());
        Ok(())
    }

    /// Submit and wait for completion: Recorded -> Submitted -> Recorded.
    ///
    /// # Errors
    ///
    /// Everything [`eval_async`](Self::eval_async) and
    /// [`eval_await`](Self::eval_await) can return. On
    /// [`SurgeError::Timeout`] (the configured default deadline passed) the
    /// sequence stays Submitted with the GPU work still running,
    /// recoverable through
    /// [`current_submission`](Self::current_submission) + `eval_await`.
    pub fn eval(&self) -> Result<(), SurgeError> {
        let handle = self.eval_async()?;
        self.eval_await(&handle, None)
    }

    /// Submit without blocking: Recorded -> Submitted. Re-encodes the op
    /// list when the built command buffer was consumed by a prior replay.
    ///
    /// # Errors
    ///
    /// [`SurgeError::AlreadyInitialized`] when a consumed create-class op
    /// would replay; [`SurgeError::InvalidState`] outside Recorded,
    /// including while an earlier submission is still in flight.
    pub fn eval_async(&self) -> Result<SubmitHandle, SurgeError> {
        self.guard_live()?;
        let mut inner = lock(&self.inner);
        if inner.state != SequenceState::Recorded {
            return Err(invalid_state("a recorded sequence", inner.state));
        }
        for recorded in &inner.ops {
            if recorded.consumed && recorded.op.is_create() {
                let target = recorded
                    .op
                    .create_target()
                    .unwrap_or(&self.label)
                    .to_owned();
                return Err(SurgeError::AlreadyInitialized(target));
            }
            recorded.op.pre_submit(&self.ctx)?;
        }
        let command = match inner.built.take() {
            Some(built) => built,
            None => encode_all(&self.ctx, &self.label, &inner.ops)?,
        };
        let index = self.ctx.submit(command);
        let done = Arc::new(AtomicBool::new(false));
        let signal = Arc::clone(&done);
        self.ctx.queue.on_submitted_work_done(move || {
            signal.store(true, Ordering::Release);
        });

        inner.next_serial += 1;
        let serial = inner.next_serial;
        inner.state = SequenceState::Submitted;
        inner.in_flight = Some(InFlight {
            serial,
            index: index.clone(),
            done: Arc::clone(&done),
        });
        log::debug!(
            "{}: submission {serial} on queue {} ({} ops)",
            self.label,
            self.queue_index,
            inner.ops.len()
        );
        Ok(SubmitHandle {
            sequence: self.label.clone(),
            serial,
            index,
            done,
        })
    }

    /// Block until the handle's submission completes, then run the post
    /// phase (readback folding) and return to Recorded.
    ///
    /// `timeout` of `None` falls back to the configured default; with no
    /// default the wait is unbounded. A timeout leaves the sequence
    /// Submitted and the GPU work running; awaiting again is permitted.
    ///
    /// # Errors
    ///
    /// [`SurgeError::NotFound`] for a stale or foreign handle,
    /// [`SurgeError::Timeout`] when the deadline passes first.
    pub fn eval_await(
        &self,
        handle: &SubmitHandle,
        timeout: Option<Duration>,
    ) -> Result<(), SurgeError> {
        self.guard_live()?;
        {
            let inner = lock(&self.inner);
            let Some(in_flight) = inner.in_flight.as_ref() else {
                return Err(SurgeError::NotFound(format!(
                    "no submission in flight for sequence '{}'",
                    self.label
                )));
            };
            if handle.sequence != self.label
                || handle.serial != in_flight.serial
            {
                return Err(SurgeError::NotFound(format!(
                    "submission {} of sequence '{}' is not in flight",
                    handle.serial, handle.sequence
                )));
            }
        }

        self.wait(
            handle.index.clone(),
            &handle.done,
            timeout.or(self.default_timeout),
        )?;

        let mut inner = lock(&self.inner);
        // A concurrent await may have collected this submission while the
        // lock was released.
        match inner.in_flight.as_ref() {
            Some(in_flight) if in_flight.serial == handle.serial => {}
            _ => return Ok(()),
        }
        inner.in_flight = None;
        inner.state = SequenceState::Recorded;
        for recorded in &mut inner.ops {
            if recorded.op.is_create() {
                recorded.consumed = true;
            }
            recorded.op.post_eval(&self.ctx)?;
        }
        log::debug!("{}: submission {} complete", self.label, handle.serial);
        Ok(())
    }

    /// Re-run the translation pass over the recorded ops, picking up
    /// rebuilt algorithms and resurrected resources.
    ///
    /// # Errors
    ///
    /// [`SurgeError::InvalidState`] outside Recorded, or any translation
    /// failure from the ops themselves.
    pub fn rerecord(&self) -> Result<(), SurgeError> {
        self.guard_live()?;
        let mut inner = lock(&self.inner);
        if inner.state != SequenceState::Recorded {
            return Err(invalid_state("a recorded sequence", inner.state));
        }
        let built = encode_all(&self.ctx, &self.label, &inner.ops)?;
        inner.built = Some(built);
        Ok(())
    }

    /// Drop recorded ops and the built command buffer, returning to New.
    ///
    /// # Errors
    ///
    /// [`SurgeError::InvalidState`] while a submission is in flight.
    pub fn clear(&self) -> Result<(), SurgeError> {
        self.guard_live()?;
        let mut inner = lock(&self.inner);
        if inner.state == SequenceState::Submitted {
            return Err(invalid_state("an idle sequence", inner.state));
        }
        inner.ops.clear();
        inner.built = None;
        inner.state = SequenceState::New;
        Ok(())
    }

    /// Drop recorded state. The sequence is unusable afterward; any
    /// in-flight GPU work is abandoned, not cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`SurgeError::AlreadyDestroyed`] on a second teardown.
    pub fn destroy(&self) -> Result<(), SurgeError> {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return Err(SurgeError::AlreadyDestroyed(self.label.clone()));
        }
        let mut inner = lock(&self.inner);
        if inner.in_flight.is_some() {
            log::warn!(
                "{}: destroyed with a submission in flight",
                self.label
            );
        }
        inner.ops.clear();
        inner.built = None;
        inner.in_flight = None;
        inner.state = SequenceState::New;
        Ok(())
    }

    fn wait(
        &self,
        index: wgpu::SubmissionIndex,
        done: &AtomicBool,
        timeout: Option<Duration>,
    ) -> Result<(), SurgeError> {
        match timeout {
            None => Ok(self.ctx.wait_for(index)?),
            Some(limit) => {
                let start = Instant::now();
                loop {
                    self.ctx.poll_once();
                    if done.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    if start.elapsed() >= limit {
                        return Err(SurgeError::Timeout {
                            waited_ms: start.elapsed().as_millis() as u64,
                        });
                    }
                    std::thread::sleep(self.poll_interval);
                }
            }
        }
    }

    fn guard_live(&self) -> Result<(), SurgeError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(SurgeError::UseAfterDestroy(self.label.clone()));
        }
        Ok(())
    }
}

const fn invalid_state(
    expected: &'static str,
    actual: SequenceState,
) -> SurgeError {
    SurgeError::InvalidState {
        expected,
        actual: actual.name(),
    }
}

fn encode_all(
    ctx: &ComputeContext,
    label: &str,
    ops: &[RecordedOp],
) -> Result<wgpu::CommandBuffer, SurgeError> {
    let mut encoder = ctx.create_encoder(label);
    for recorded in ops {
        recorded.op.encode(&mut encoder)?;
    }
    Ok(encoder.finish())
}
