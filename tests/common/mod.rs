//! Shared test fixtures: isolated engine directories plus a recognizer
//! mock that records every collaborator operation in order.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::{NamedTempFile, TempDir};

use voxdial::actions::Hypothesis;
use voxdial::audio::AudioStream;
use voxdial::engine::{EngineSettings, ReentryPolicy};
use voxdial::error::DialResult;
use voxdial::events::{EngineEvent, EventBus};
use voxdial::grammar::SlotEntry;
use voxdial::srec::{Codec, Grammar, Recognizer};

pub type OpLog = Arc<Mutex<Vec<String>>>;

pub fn record(ops: &OpLog, entry: impl Into<String>) {
    ops.lock().unwrap().push(entry.into());
}

pub struct TestContext {
    pub grammar_dir: TempDir,
    pub cache_dir: TempDir,
    pub log_dir: TempDir,
    pub audio: NamedTempFile,
    pub ops: OpLog,
}

impl TestContext {
    pub fn new() -> Self {
        let audio = NamedTempFile::new().expect("Failed to create audio file");
        std::fs::write(audio.path(), b"RIFF").expect("Failed to write audio file");
        Self {
            grammar_dir: TempDir::new().expect("Failed to create grammar dir"),
            cache_dir: TempDir::new().expect("Failed to create cache dir"),
            log_dir: TempDir::new().expect("Failed to create log dir"),
            audio,
            ops: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn settings(&self) -> EngineSettings {
        EngineSettings {
            grammar_dir: self.grammar_dir.path().to_path_buf(),
            cache_dir: self.cache_dir.path().to_path_buf(),
            log_dir: self.log_dir.path().to_path_buf(),
            codec: Codec::Pcm16Bit11K,
            reentry_policy: ReentryPolicy::ForceReset,
        }
    }

    pub fn recognizer(&self, hypotheses: Vec<Hypothesis>) -> Box<MockRecognizer> {
        Box::new(MockRecognizer {
            ops: self.ops.clone(),
            hypotheses,
            hold_save: false,
            reject_batch: None,
        })
    }

    /// The ops recorded so far, clearing the log.
    pub fn take_ops(&self) -> Vec<String> {
        std::mem::take(&mut *self.ops.lock().unwrap())
    }

    pub fn cached_artifacts(&self) -> Vec<PathBuf> {
        let mut artifacts: Vec<PathBuf> = std::fs::read_dir(self.cache_dir.path())
            .expect("Failed to read cache dir")
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.to_string_lossy().ends_with(".g2g"))
            .collect();
        artifacts.sort();
        artifacts
    }
}

pub struct MockRecognizer {
    ops: OpLog,
    hypotheses: Vec<Hypothesis>,
    /// When set, `save` records its op but never completes, leaving the
    /// session parked mid-build.
    pub hold_save: bool,
    /// When set, the grammar refuses the batch at this index instead of
    /// acknowledging it.
    pub reject_batch: Option<usize>,
}

impl Recognizer for MockRecognizer {
    fn configure(&mut self, baseline: &Path) -> DialResult<()> {
        let file = baseline
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        record(&self.ops, format!("configure {file}"));
        Ok(())
    }

    fn reset_acoustic_state(&mut self) {
        record(&self.ops, "reset-acoustic");
    }

    fn new_grammar(&mut self, path: &Path) -> DialResult<Box<dyn Grammar>> {
        let kind = if path.ends_with("grammars/voxdial.g2g") {
            "template"
        } else {
            "artifact"
        };
        record(&self.ops, format!("new-grammar {kind}"));
        Ok(Box::new(MockGrammar {
            ops: self.ops.clone(),
            hold_save: self.hold_save,
            reject_batch: self.reject_batch,
            batches_seen: 0,
        }))
    }

    fn recognize(&mut self, _stream: &AudioStream, _grammar: &mut dyn Grammar, bus: &EventBus) {
        record(&self.ops, "recognize");
        if self.hypotheses.is_empty() {
            bus.send(EngineEvent::RecognitionFailure("no speech".to_string()))
                .ok();
        } else {
            bus.send(EngineEvent::RecognitionResult(self.hypotheses.clone()))
                .ok();
        }
    }

    fn stop(&mut self) {
        record(&self.ops, "stop");
    }
}

pub struct MockGrammar {
    ops: OpLog,
    hold_save: bool,
    reject_batch: Option<usize>,
    batches_seen: usize,
}

impl Grammar for MockGrammar {
    fn load(&mut self, bus: &EventBus) {
        record(&self.ops, "load");
        bus.send(EngineEvent::GrammarLoaded).ok();
    }

    fn reset_all_slots(&mut self, bus: &EventBus) {
        record(&self.ops, "reset-slots");
        bus.send(EngineEvent::SlotsReset).ok();
    }

    fn add_item_batch(&mut self, entries: &[SlotEntry], bus: &EventBus) {
        let index = self.batches_seen;
        self.batches_seen += 1;
        if self.reject_batch == Some(index) {
            record(&self.ops, format!("reject {}", entries.len()));
            bus.send(EngineEvent::BatchRejected {
                index,
                reason: "slot full".to_string(),
            })
            .ok();
            return;
        }
        record(&self.ops, format!("batch {}", entries.len()));
        bus.send(EngineEvent::BatchAdded).ok();
    }

    fn compile_all_slots(&mut self, bus: &EventBus) {
        record(&self.ops, "compile");
        bus.send(EngineEvent::SlotsCompiled).ok();
    }

    fn save(&mut self, path: &Path, bus: &EventBus) {
        record(&self.ops, "save");
        if self.hold_save {
            return;
        }
        std::fs::write(path, b"g2g\0mock").expect("Failed to write artifact");
        bus.send(EngineEvent::GrammarSaved(path.to_path_buf())).ok();
    }

    fn unload(&mut self) {
        record(&self.ops, "unload");
    }
}
