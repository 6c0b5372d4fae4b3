//! Recognition engine
//!
//! Owns the recognizer, the grammar cache, and the event loop that
//! drives one recognition session at a time. A session starts audio
//! capture first; once capture is up it configures the recognizer,
//! fetches contacts, obtains a grammar (retained handle, cached
//! artifact, or a fresh build from the template), recognizes, and
//! interprets. Every long-running step completes via an
//! [`EngineEvent`]; the single consumer in [`RecognitionEngine::run`]
//! serializes all completions, so no handler ever races another.

use crate::actions::{ActionDescriptor, Hypothesis};
use crate::audio::{AudioSource, AudioStream};
use crate::config::Config;
use crate::contacts::{fingerprint, CallLog, ContactRecord, ContactSource, Fingerprint};
use crate::error::{DialError, DialResult};
use crate::events::{EngineEvent, EventBus};
use crate::grammar::{GrammarBuilder, GrammarCache, APP_PREFIX, TEMPLATE_GRAMMAR};
use crate::interpret::interpret;
use crate::logger::SessionLogger;
use crate::srec::{Codec, Grammar, Recognizer};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};

/// What to do when a session starts while another is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReentryPolicy {
    /// Abort the stuck session so the next attempt starts clean. The
    /// colliding caller still gets [`DialError::AlreadyInProgress`].
    #[default]
    ForceReset,
    /// Leave the running session alone.
    Reject,
}

impl FromStr for ReentryPolicy {
    type Err = DialError;

    fn from_str(s: &str) -> DialResult<Self> {
        if s.eq_ignore_ascii_case("force-reset") {
            Ok(ReentryPolicy::ForceReset)
        } else if s.eq_ignore_ascii_case("reject") {
            Ok(ReentryPolicy::Reject)
        } else {
            Err(DialError::Config(format!("illegal reentry policy {s:?}")))
        }
    }
}

/// How a session ended.
#[derive(Debug)]
pub enum Outcome {
    /// At least one candidate action was derived.
    Success(Vec<ActionDescriptor>),
    /// Recognition completed but produced nothing usable.
    Failure(String),
    Canceled,
    Error(DialError),
}

/// Session progress callbacks for a UI layer. All methods default to
/// no-ops.
pub trait SessionObserver: Send {
    /// Capture is live; a prompt tone or visual cue belongs here.
    fn on_audio_started(&mut self) {}

    /// Called once with the terminal outcome, before `run` returns it.
    fn on_outcome(&mut self, _outcome: &Outcome) {}
}

pub struct NullObserver;

impl SessionObserver for NullObserver {}

/// Everything one session needs from its caller.
pub struct SessionParams {
    pub contacts: Box<dyn ContactSource>,
    pub audio: Box<dyn AudioSource>,
    pub call_log: Box<dyn CallLog>,
    pub observer: Box<dyn SessionObserver>,
    /// Overrides the engine's default codec for this session.
    pub codec: Option<Codec>,
}

impl SessionParams {
    pub fn new(contacts: Box<dyn ContactSource>, audio: Box<dyn AudioSource>) -> Self {
        Self {
            contacts,
            audio,
            call_log: Box::new(crate::contacts::NoCallLog),
            observer: Box::new(NullObserver),
            codec: None,
        }
    }

    pub fn with_call_log(mut self, call_log: Box<dyn CallLog>) -> Self {
        self.call_log = call_log;
        self
    }

    pub fn with_observer(mut self, observer: Box<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }
}

/// Typed engine settings, usually derived from [`Config`].
pub struct EngineSettings {
    pub grammar_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub codec: Codec,
    pub reentry_policy: ReentryPolicy,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> DialResult<Self> {
        Ok(Self {
            grammar_dir: PathBuf::from(&config.grammar_dir),
            cache_dir: PathBuf::from(&config.cache_dir),
            log_dir: PathBuf::from(&config.log_dir),
            codec: config.codec()?,
            reentry_policy: config.reentry_policy()?,
        })
    }
}

/// Requests cancellation of the session it was issued for. Clonable and
/// usable from any thread; cancelling twice is a no-op.
#[derive(Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    bus: EventBus,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if self.flag.swap(false, Ordering::SeqCst) {
            debug!("cancellation requested");
            // wake the event loop in case nothing else is queued
            self.bus.send(EngineEvent::Cancelled).ok();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    StartingAudio,
    /// Loading a cached compiled artifact.
    LoadingArtifact,
    /// Cold build: loading the uncompiled template.
    LoadingTemplate,
    ResettingSlots,
    AddingBatches,
    Compiling,
    Saving,
    Recognizing,
}

struct Session {
    /// Consumed once capture is up; contacts are fetched while audio
    /// is already being buffered.
    contacts_source: Option<Box<dyn ContactSource>>,
    contacts: Vec<ContactRecord>,
    codec: Codec,
    fingerprint: Option<Fingerprint>,
    /// Where a freshly compiled grammar will be saved.
    artifact: Option<PathBuf>,
    audio: Box<dyn AudioSource>,
    call_log: Box<dyn CallLog>,
    observer: Box<dyn SessionObserver>,
    state: SessionState,
    stream: Option<AudioStream>,
    /// Grammar under construction, promoted to the engine on completion.
    pending: Option<Box<dyn Grammar>>,
    builder: Option<GrammarBuilder>,
    batch_index: usize,
}

/// The engine proper. Construct once, run many sessions; the configured
/// codec, grammar handle, and fingerprint are retained between sessions
/// so repeat recognitions skip straight to audio and recognition.
pub struct RecognitionEngine {
    recognizer: Box<dyn Recognizer>,
    cache: GrammarCache,
    grammar_dir: PathBuf,
    logger: SessionLogger,
    default_codec: Codec,
    reentry_policy: ReentryPolicy,
    /// Codec the recognizer is currently configured for.
    codec: Option<Codec>,
    /// Retained grammar handle for warm reuse.
    grammar: Option<Box<dyn Grammar>>,
    /// Fingerprint the retained grammar was built from.
    fingerprint: Option<Fingerprint>,
    /// True while a session is in flight; cleared by cancellation.
    in_progress: Arc<AtomicBool>,
    bus: EventBus,
    rx: UnboundedReceiver<EngineEvent>,
    session: Option<Session>,
}

impl RecognitionEngine {
    pub fn new(recognizer: Box<dyn Recognizer>, settings: EngineSettings) -> Self {
        let (bus, rx) = mpsc::unbounded_channel();
        Self {
            recognizer,
            cache: GrammarCache::new(&settings.cache_dir, APP_PREFIX),
            grammar_dir: settings.grammar_dir,
            logger: SessionLogger::new(settings.log_dir),
            default_codec: settings.codec,
            reentry_policy: settings.reentry_policy,
            codec: None,
            grammar: None,
            fingerprint: None,
            in_progress: Arc::new(AtomicBool::new(false)),
            bus,
            rx,
            session: None,
        }
    }

    pub fn session_logger(&self) -> &SessionLogger {
        &self.logger
    }

    /// Handle for cancelling the in-flight session.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.in_progress),
            bus: self.bus.clone(),
        }
    }

    /// Begin a session: start audio capture. Everything after the
    /// capture-started completion is driven by [`run`](Self::run).
    pub fn start(&mut self, params: SessionParams) -> DialResult<CancelHandle> {
        if self.in_progress.load(Ordering::SeqCst) {
            match self.reentry_policy {
                ReentryPolicy::ForceReset => {
                    warn!("recognition already in progress, resetting");
                    self.finish(Outcome::Canceled);
                }
                ReentryPolicy::Reject => {
                    warn!("recognition already in progress, rejecting");
                }
            }
            return Err(DialError::AlreadyInProgress);
        }

        let codec = params.codec.unwrap_or(self.default_codec);
        info!("starting session with codec {}", codec.as_str());

        // discard completions left over from an aborted session
        while self.rx.try_recv().is_ok() {}
        self.in_progress.store(true, Ordering::SeqCst);

        let mut session = Session {
            contacts_source: Some(params.contacts),
            contacts: Vec::new(),
            codec,
            fingerprint: None,
            artifact: None,
            audio: params.audio,
            call_log: params.call_log,
            observer: params.observer,
            state: SessionState::StartingAudio,
            stream: None,
            pending: None,
            builder: None,
            batch_index: 0,
        };

        match session.audio.start(&self.bus) {
            Ok(stream) => session.stream = Some(stream),
            Err(e) => {
                self.in_progress.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
        self.session = Some(session);
        Ok(self.cancel_handle())
    }

    /// Consume completion events until the session reaches a terminal
    /// outcome.
    pub async fn run(&mut self) -> Outcome {
        loop {
            let Some(event) = self.rx.recv().await else {
                return self.finish(Outcome::Error(DialError::Internal(
                    "event channel closed".to_string(),
                )));
            };
            if let Some(outcome) = self.on_event(event) {
                return outcome;
            }
        }
    }

    fn on_event(&mut self, event: EngineEvent) -> Option<Outcome> {
        // single cancellation guard: every completion passes through here
        if !self.in_progress.load(Ordering::SeqCst) {
            info!("session canceled");
            return Some(self.finish(Outcome::Canceled));
        }
        debug!("event: {event:?}");

        match event {
            // stale sentinel from a cancel that lost the race to a restart
            EngineEvent::Cancelled => None,

            EngineEvent::AudioStarted => self.on_audio_started(),
            EngineEvent::AudioError(e) => Some(self.fail(DialError::Audio(e))),

            EngineEvent::GrammarLoaded => self.on_grammar_loaded(),
            EngineEvent::SlotsReset => self.on_slots_reset(),
            EngineEvent::BatchAdded => self.on_batch_done(),
            EngineEvent::BatchRejected { index, reason } => {
                warn!("batch {index} rejected: {reason}");
                self.on_batch_done()
            }
            EngineEvent::SlotsCompiled => self.on_slots_compiled(),
            EngineEvent::GrammarSaved(path) => self.on_grammar_saved(path),
            EngineEvent::GrammarError(e) => Some(self.fail(DialError::GrammarBuild(e))),

            EngineEvent::RecognitionResult(hypotheses) => Some(self.on_result(hypotheses)),
            EngineEvent::RecognitionFailure(reason) => Some(self.on_failure(reason)),
            EngineEvent::RecognizerError(e) => Some(self.fail(DialError::Recognizer(e))),
        }
    }

    /// Capture is up: configure the recognizer, fetch contacts, and
    /// decide between the retained grammar, a cached artifact, and a
    /// cold build.
    fn on_audio_started(&mut self) -> Option<Outcome> {
        let Some(session) = self.session.as_mut() else {
            return self.unexpected("AudioStarted");
        };
        if session.state != SessionState::StartingAudio {
            return self.unexpected("AudioStarted");
        }
        session.observer.on_audio_started();
        let codec = session.codec;

        if self.codec != Some(codec) {
            let baseline = self.grammar_dir.join(codec.baseline_file());
            info!("configuring recognizer for {}", codec.as_str());
            if let Err(e) = self.recognizer.configure(&baseline) {
                return Some(self.fail(e));
            }
            // a codec change invalidates any retained grammar
            if let Some(mut old) = self.grammar.take() {
                old.unload();
            }
            self.fingerprint = None;
            self.codec = Some(codec);
        }
        self.recognizer.reset_acoustic_state();

        let Some(source) = session.contacts_source.take() else {
            return self.unexpected("AudioStarted");
        };
        let contacts = match source.contacts() {
            Ok(contacts) => contacts,
            Err(e) => return Some(self.fail(e)),
        };
        let fp = fingerprint(&contacts);
        info!("{} contacts, fingerprint {fp:x}", contacts.len());
        session.contacts = contacts;
        session.fingerprint = Some(fp);
        session.artifact = Some(self.cache.artifact_path(fp));

        if self.grammar.is_some() && self.fingerprint == Some(fp) {
            debug!("reusing retained grammar for {fp:x}");
            return self.recognize();
        }

        if let Some(artifact) = self.cache.lookup(fp) {
            info!("loading cached grammar {}", artifact.display());
            let mut grammar = match self.recognizer.new_grammar(&artifact) {
                Ok(grammar) => grammar,
                Err(e) => return Some(self.fail(e)),
            };
            grammar.load(&self.bus);
            session.state = SessionState::LoadingArtifact;
            session.pending = Some(grammar);
            return None;
        }

        // cold build: clear out predecessors so at most one artifact
        // ever exists, then stuff the template
        if let Err(e) = self.cache.ensure_dir() {
            return Some(self.fail(e));
        }
        self.cache.purge();
        let template = self.grammar_dir.join(TEMPLATE_GRAMMAR);
        info!("no cached grammar, building from {}", template.display());
        let mut grammar = match self.recognizer.new_grammar(&template) {
            Ok(grammar) => grammar,
            Err(e) => return Some(self.fail(e)),
        };
        grammar.load(&self.bus);
        session.state = SessionState::LoadingTemplate;
        session.pending = Some(grammar);
        None
    }

    fn on_grammar_loaded(&mut self) -> Option<Outcome> {
        let Some(session) = self.session.as_mut() else {
            return self.unexpected("GrammarLoaded");
        };
        match session.state {
            SessionState::LoadingArtifact => {
                // the artifact is ready to use as-is; promote and go
                let pending = session.pending.take();
                let fp = session.fingerprint;
                if let Some(mut old) = std::mem::replace(&mut self.grammar, pending) {
                    old.unload();
                }
                self.fingerprint = fp;
                self.recognize()
            }
            SessionState::LoadingTemplate => {
                session.state = SessionState::ResettingSlots;
                let Some(pending) = session.pending.as_mut() else {
                    return self.unexpected("GrammarLoaded");
                };
                pending.reset_all_slots(&self.bus);
                None
            }
            _ => self.unexpected("GrammarLoaded"),
        }
    }

    fn on_slots_reset(&mut self) -> Option<Outcome> {
        let Some(session) = self.session.as_mut() else {
            return self.unexpected("SlotsReset");
        };
        if session.state != SessionState::ResettingSlots {
            return self.unexpected("SlotsReset");
        }
        let builder = GrammarBuilder::new(&session.contacts);
        debug!("{} name entries to stuff", builder.len());
        session.builder = Some(builder);
        session.batch_index = 0;
        self.push_batch()
    }

    fn on_batch_done(&mut self) -> Option<Outcome> {
        let Some(session) = self.session.as_ref() else {
            return self.unexpected("BatchAdded");
        };
        if session.state != SessionState::AddingBatches {
            return self.unexpected("BatchAdded");
        }
        self.push_batch()
    }

    /// Stuff the next name batch, or compile once the builder is drained.
    fn push_batch(&mut self) -> Option<Outcome> {
        let Some(session) = self.session.as_mut() else {
            return self.unexpected("batch step");
        };
        let Some(builder) = session.builder.as_mut() else {
            return self.unexpected("batch step");
        };
        match builder.next_batch() {
            Some(batch) => {
                session.state = SessionState::AddingBatches;
                debug!("stuffing batch {} ({} entries)", session.batch_index, batch.len());
                session.batch_index += 1;
                let Some(pending) = session.pending.as_mut() else {
                    return self.unexpected("batch step");
                };
                pending.add_item_batch(&batch, &self.bus);
                None
            }
            None => {
                session.state = SessionState::Compiling;
                let Some(pending) = session.pending.as_mut() else {
                    return self.unexpected("compile step");
                };
                pending.compile_all_slots(&self.bus);
                None
            }
        }
    }

    fn on_slots_compiled(&mut self) -> Option<Outcome> {
        let Some(session) = self.session.as_mut() else {
            return self.unexpected("SlotsCompiled");
        };
        if session.state != SessionState::Compiling {
            return self.unexpected("SlotsCompiled");
        }
        let Some(artifact) = session.artifact.clone() else {
            return self.unexpected("SlotsCompiled");
        };
        session.state = SessionState::Saving;
        let Some(pending) = session.pending.as_mut() else {
            return self.unexpected("SlotsCompiled");
        };
        pending.save(&artifact, &self.bus);
        None
    }

    fn on_grammar_saved(&mut self, path: PathBuf) -> Option<Outcome> {
        let Some(session) = self.session.as_mut() else {
            return self.unexpected("GrammarSaved");
        };
        if session.state != SessionState::Saving {
            return self.unexpected("GrammarSaved");
        }
        info!("grammar saved to {}", path.display());
        let pending = session.pending.take();
        let fp = session.fingerprint;
        if let Some(mut old) = std::mem::replace(&mut self.grammar, pending) {
            old.unload();
        }
        self.fingerprint = fp;
        self.recognize()
    }

    /// Hand the audio stream and the current grammar to the recognizer.
    fn recognize(&mut self) -> Option<Outcome> {
        let Some(session) = self.session.as_mut() else {
            return self.unexpected("recognize step");
        };
        session.state = SessionState::Recognizing;
        let Some(stream) = session.stream.as_ref() else {
            return self.unexpected("recognize step");
        };
        let Some(grammar) = self.grammar.as_mut() else {
            return self.unexpected("recognize step");
        };
        debug!("recognizing");
        self.recognizer.recognize(stream, grammar.as_mut(), &self.bus);
        None
    }

    fn on_result(&mut self, hypotheses: Vec<Hypothesis>) -> Outcome {
        let Some(session) = self.session.as_ref() else {
            return self.fail(DialError::Internal("result without a session".to_string()));
        };
        info!("{} hypotheses", hypotheses.len());

        let actions = interpret(&hypotheses, session.call_log.as_ref());
        for action in &actions {
            info!("derived action: {action}");
        }
        self.logger.log(
            &session_header(session, &format!("hypotheses={}", hypotheses.len())),
            &session.contacts,
            &hypotheses,
            &actions,
        );

        let outcome = if actions.is_empty() {
            Outcome::Failure("no usable action in any hypothesis".to_string())
        } else {
            Outcome::Success(actions)
        };
        self.finish(outcome)
    }

    fn on_failure(&mut self, reason: String) -> Outcome {
        info!("recognition failed: {reason}");
        if let Some(session) = self.session.as_ref() {
            self.logger.log(
                &session_header(session, &format!("failure={reason}")),
                &session.contacts,
                &[],
                &[],
            );
        }
        self.finish(Outcome::Failure(reason))
    }

    fn fail(&mut self, err: DialError) -> Outcome {
        warn!("session error: {err}");
        if let Some(session) = self.session.as_ref() {
            self.logger.log(
                &session_header(session, &format!("error={err}")),
                &session.contacts,
                &[],
                &[],
            );
        }
        self.finish(Outcome::Error(err))
    }

    fn unexpected(&mut self, event: &str) -> Option<Outcome> {
        Some(self.fail(DialError::Internal(format!(
            "unexpected {event} completion"
        ))))
    }

    /// Tear down the in-flight session and report the outcome. The
    /// retained grammar survives; an unfinished build does not.
    fn finish(&mut self, outcome: Outcome) -> Outcome {
        if let Some(mut session) = self.session.take() {
            session.audio.stop();
            if let Some(mut pending) = session.pending.take() {
                pending.unload();
            }
            session.observer.on_outcome(&outcome);
        }
        self.recognizer.stop();
        self.in_progress.store(false, Ordering::SeqCst);
        outcome
    }
}

fn session_header(session: &Session, detail: &str) -> String {
    let fp = session
        .fingerprint
        .map(|fp| format!("{fp:x}"))
        .unwrap_or_else(|| "none".to_string());
    format!(
        "codec={} fingerprint={fp} {detail}",
        session.codec.as_str()
    )
}
