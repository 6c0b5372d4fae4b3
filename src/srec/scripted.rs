//! Scripted recognizer backend
//!
//! Replays a fixed n-best list loaded from a JSON file instead of running
//! acoustic recognition. Grammar operations are acknowledged immediately;
//! `save` writes a real placeholder artifact so the cache behaves exactly
//! as it would with the native service. Used by the CLI driver and in
//! offline tests.

use super::{Grammar, Recognizer};
use crate::actions::Hypothesis;
use crate::audio::AudioStream;
use crate::error::{DialError, DialResult};
use crate::events::{EngineEvent, EventBus};
use crate::grammar::SlotEntry;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct ScriptedRecognizer {
    hypotheses: Vec<Hypothesis>,
}

impl ScriptedRecognizer {
    pub fn new(hypotheses: Vec<Hypothesis>) -> Self {
        Self { hypotheses }
    }

    /// Load a JSON array of hypotheses.
    pub fn from_file(path: &Path) -> DialResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DialError::Recognizer(format!("cannot read script {}: {e}", path.display()))
        })?;
        let hypotheses: Vec<Hypothesis> = serde_json::from_str(&content)?;
        info!(
            "loaded {} scripted hypotheses from {}",
            hypotheses.len(),
            path.display()
        );
        Ok(Self { hypotheses })
    }
}

impl Recognizer for ScriptedRecognizer {
    fn configure(&mut self, baseline: &Path) -> DialResult<()> {
        debug!("scripted configure with {}", baseline.display());
        Ok(())
    }

    fn reset_acoustic_state(&mut self) {}

    fn new_grammar(&mut self, path: &Path) -> DialResult<Box<dyn Grammar>> {
        Ok(Box::new(ScriptedGrammar {
            source: path.to_path_buf(),
        }))
    }

    fn recognize(&mut self, _stream: &AudioStream, _grammar: &mut dyn Grammar, bus: &EventBus) {
        if self.hypotheses.is_empty() {
            bus.send(EngineEvent::RecognitionFailure(
                "no speech in script".to_string(),
            ))
            .ok();
        } else {
            bus.send(EngineEvent::RecognitionResult(self.hypotheses.clone()))
                .ok();
        }
    }

    fn stop(&mut self) {}
}

struct ScriptedGrammar {
    source: PathBuf,
}

impl Grammar for ScriptedGrammar {
    fn load(&mut self, bus: &EventBus) {
        debug!("scripted grammar load {}", self.source.display());
        bus.send(EngineEvent::GrammarLoaded).ok();
    }

    fn reset_all_slots(&mut self, bus: &EventBus) {
        bus.send(EngineEvent::SlotsReset).ok();
    }

    fn add_item_batch(&mut self, entries: &[SlotEntry], bus: &EventBus) {
        debug!("scripted grammar accepts batch of {}", entries.len());
        bus.send(EngineEvent::BatchAdded).ok();
    }

    fn compile_all_slots(&mut self, bus: &EventBus) {
        bus.send(EngineEvent::SlotsCompiled).ok();
    }

    fn save(&mut self, path: &Path, bus: &EventBus) {
        match std::fs::write(path, b"g2g\0scripted") {
            Ok(()) => {
                bus.send(EngineEvent::GrammarSaved(path.to_path_buf())).ok();
            }
            Err(e) => {
                bus.send(EngineEvent::GrammarError(format!(
                    "cannot save {}: {e}",
                    path.display()
                )))
                .ok();
            }
        }
    }

    fn unload(&mut self) {
        debug!("scripted grammar unload {}", self.source.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"[{{"confidence": 0.9, "literal": "call jack jones", "semantic": "CALL 10 11 12 13 14 15"}}]"#
        )
        .unwrap();
        file.flush().unwrap();

        let rec = ScriptedRecognizer::from_file(file.path()).expect("script");
        assert_eq!(rec.hypotheses.len(), 1);
        assert_eq!(rec.hypotheses[0].literal, "call jack jones");
    }

    #[test]
    fn test_from_file_malformed() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").unwrap();
        file.flush().unwrap();
        assert!(ScriptedRecognizer::from_file(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_recognize_empty_script_fails() {
        let (bus, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut rec = ScriptedRecognizer::new(Vec::new());
        let mut grammar = ScriptedGrammar {
            source: PathBuf::from("unused.g2g"),
        };
        rec.recognize(
            &AudioStream::File(PathBuf::from("unused.wav")),
            &mut grammar,
            &bus,
        );
        assert!(matches!(
            rx.recv().await,
            Some(EngineEvent::RecognitionFailure(_))
        ));
    }
}
