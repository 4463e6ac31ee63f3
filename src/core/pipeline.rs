use super::audio_processor::{AudioProcessor, ProcessorInfo};
use super::error::ApmError;
use super::sample_format::{decode_pcm16_le, encode_pcm16_le};
use alloc::boxed::Box;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use log::{error, info, warn};

/// Identity and stage list of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineInfo {
    pub name: String,
    pub processors: Vec<ProcessorInfo>,
}

impl PipelineInfo {
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }
}

/// A chain of audio processors.
///
/// Each chunk travels through the processors in registration order. A stage
/// that drops the chunk ends the chain and the whole chunk is dropped. A
/// stage that fails is logged and the chunk leaves the pipeline as it was
/// before that stage; the stream itself never stops.
pub struct AudioPipeline {
    name: String,
    processors: Vec<Box<dyn AudioProcessor + Send>>,
}

impl AudioPipeline {
    /// Creates an empty pipeline.
    pub fn new(name: impl Into<String>) -> Self {
        AudioPipeline {
            name: name.into(),
            processors: Vec::new(),
        }
    }

    /// Appends a processor to the chain.
    pub fn and(mut self, processor: impl AudioProcessor + Send + 'static) -> Self {
        self.add_processor(Box::new(processor));
        self
    }

    /// Appends an already boxed processor.
    pub fn add_processor(&mut self, processor: Box<dyn AudioProcessor + Send>) -> &mut Self {
        info!("{}: added processor '{}'", self.name, processor.name());
        self.processors.push(processor);
        self
    }

    /// Removes the first processor called `processor_name`.
    ///
    /// Returns `false` (and logs a warning) when no such processor exists.
    pub fn remove_processor(&mut self, processor_name: &str) -> bool {
        match self
            .processors
            .iter()
            .position(|p| p.name() == processor_name)
        {
            Some(index) => {
                let removed = self.processors.remove(index);
                info!("{}: removed processor '{}'", self.name, removed.name());
                true
            }
            None => {
                warn!("{}: processor '{}' not found", self.name, processor_name);
                false
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Names of the processors in execution order.
    pub fn processor_names(&self) -> impl Iterator<Item = &str> {
        self.processors.iter().map(|p| p.name())
    }

    /// Runs one chunk through every processor.
    ///
    /// Returns `None` when a stage dropped the chunk.
    pub fn process(&mut self, chunk: &[i16]) -> Option<Vec<i16>> {
        let mut current = chunk.to_vec();

        for processor in &mut self.processors {
            match processor.process(&current) {
                Ok(Some(next)) if next.len() == current.len() => current = next,
                Ok(Some(next)) => {
                    let err = ApmError::LengthChanged {
                        stage: processor.name().to_string(),
                        expected: current.len(),
                        actual: next.len(),
                    };
                    error!("{}: {}", self.name, err);
                    break;
                }
                Ok(None) => return None,
                Err(err) => {
                    error!(
                        "{}: error in processor '{}': {}",
                        self.name,
                        processor.name(),
                        err
                    );
                    break;
                }
            }
        }

        Some(current)
    }

    /// Runs one chunk of little-endian PCM16 bytes through the pipeline.
    ///
    /// A payload that is not a whole number of samples is logged and handed
    /// back untouched.
    pub fn process_chunk(&mut self, bytes: &[u8]) -> Option<Vec<u8>> {
        let samples = match decode_pcm16_le(bytes) {
            Ok(samples) => samples,
            Err(err) => {
                error!("{}: error processing audio chunk: {}", self.name, err);
                return Some(bytes.to_vec());
            }
        };

        self.process(&samples).map(|out| encode_pcm16_le(&out))
    }

    /// Resets every processor. Call between independent recordings.
    pub fn reset_all_states(&mut self) {
        for processor in &mut self.processors {
            processor.reset_state();
        }
        info!("{}: reset all processor states", self.name);
    }

    /// Returns the pipeline name and a description of every stage.
    pub fn describe(&self) -> PipelineInfo {
        PipelineInfo {
            name: self.name.clone(),
            processors: self.processors.iter().map(|p| p.describe()).collect(),
        }
    }

    /// Returns an ASCII rendering of the chain.
    pub fn get_graph(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("{} Start\n", self.name));
        output.push_str("  |\n  v\n");

        for p in self.processors.iter() {
            let info = p.describe();
            let params: Vec<String> = info
                .params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            output.push_str(&format!("{} ({})\n", info.name, params.join(", ")));
            output.push_str("  |\n  v\n");
        }

        output.push_str("Output\n");
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio_processor::ProcessResult;
    use alloc::vec;

    struct AddOne {
        initialized: bool,
    }

    impl AudioProcessor for AddOne {
        fn name(&self) -> &str {
            "AddOne"
        }
        fn initialize(&mut self) {
            self.initialized = true;
        }
        fn is_initialized(&self) -> bool {
            self.initialized
        }
        fn process(&mut self, chunk: &[i16]) -> ProcessResult {
            self.initialize();
            Ok(Some(chunk.iter().map(|s| s + 1).collect()))
        }
        fn reset_state(&mut self) {}
        fn describe(&self) -> ProcessorInfo {
            ProcessorInfo {
                name: "AddOne".to_string(),
                initialized: self.initialized,
                params: vec![("step", "1".to_string())],
            }
        }
    }

    struct Failing;

    impl AudioProcessor for Failing {
        fn name(&self) -> &str {
            "Failing"
        }
        fn initialize(&mut self) {}
        fn is_initialized(&self) -> bool {
            true
        }
        fn process(&mut self, _chunk: &[i16]) -> ProcessResult {
            Err(ApmError::NonFiniteSample { index: 0 })
        }
        fn reset_state(&mut self) {}
        fn describe(&self) -> ProcessorInfo {
            ProcessorInfo {
                name: "Failing".to_string(),
                initialized: true,
                params: Vec::new(),
            }
        }
    }

    struct Dropping;

    impl AudioProcessor for Dropping {
        fn name(&self) -> &str {
            "Dropping"
        }
        fn initialize(&mut self) {}
        fn is_initialized(&self) -> bool {
            true
        }
        fn process(&mut self, _chunk: &[i16]) -> ProcessResult {
            Ok(None)
        }
        fn reset_state(&mut self) {}
        fn describe(&self) -> ProcessorInfo {
            ProcessorInfo {
                name: "Dropping".to_string(),
                initialized: true,
                params: Vec::new(),
            }
        }
    }

    struct Truncating;

    impl AudioProcessor for Truncating {
        fn name(&self) -> &str {
            "Truncating"
        }
        fn initialize(&mut self) {}
        fn is_initialized(&self) -> bool {
            true
        }
        fn process(&mut self, chunk: &[i16]) -> ProcessResult {
            Ok(Some(chunk[..chunk.len() / 2].to_vec()))
        }
        fn reset_state(&mut self) {}
        fn describe(&self) -> ProcessorInfo {
            ProcessorInfo {
                name: "Truncating".to_string(),
                initialized: true,
                params: Vec::new(),
            }
        }
    }

    fn add_one() -> AddOne {
        AddOne { initialized: false }
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let mut pipeline = AudioPipeline::new("Empty");
        assert!(pipeline.is_empty());
        let bytes = vec![0x01, 0x80, 0xFF, 0x7F, 0x00, 0x00];
        assert_eq!(pipeline.process_chunk(&bytes), Some(bytes.clone()));
        assert_eq!(pipeline.process(&[5, -5]), Some(vec![5, -5]));
    }

    #[test]
    fn test_processors_run_in_order() {
        let mut pipeline = AudioPipeline::new("Chain").and(add_one()).and(add_one());
        assert_eq!(pipeline.len(), 2);
        assert_eq!(pipeline.process(&[0, 10]), Some(vec![2, 12]));
    }

    #[test]
    fn test_drop_short_circuits() {
        let mut pipeline = AudioPipeline::new("Drop")
            .and(add_one())
            .and(Dropping)
            .and(Failing);
        assert_eq!(pipeline.process(&[1, 2, 3]), None);
        assert_eq!(pipeline.process_chunk(&[0, 0]), None);
    }

    #[test]
    fn test_drop_is_distinct_from_empty_chunk() {
        let mut pipeline = AudioPipeline::new("Empty chunk").and(add_one());
        assert_eq!(pipeline.process(&[]), Some(vec![]));
    }

    #[test]
    fn test_fault_returns_buffer_before_failing_stage() {
        let mut pipeline = AudioPipeline::new("Fault")
            .and(add_one())
            .and(Failing)
            .and(add_one());
        assert_eq!(pipeline.process(&[0, 1]), Some(vec![1, 2]));
    }

    #[test]
    fn test_length_change_is_contained() {
        let mut pipeline = AudioPipeline::new("Length")
            .and(add_one())
            .and(Truncating)
            .and(add_one());
        assert_eq!(pipeline.process(&[0, 1, 2, 3]), Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn test_odd_byte_payload_passes_through() {
        let mut pipeline = AudioPipeline::new("Odd").and(add_one());
        let bytes = vec![1, 2, 3];
        assert_eq!(pipeline.process_chunk(&bytes), Some(bytes.clone()));
    }

    #[test]
    fn test_process_chunk_round_trips_bytes() {
        let mut pipeline = AudioPipeline::new("Bytes").and(add_one());
        let out = pipeline.process_chunk(&encode_pcm16_le(&[-2, 100])).unwrap();
        assert_eq!(decode_pcm16_le(&out).unwrap(), vec![-1, 101]);
    }

    #[test]
    fn test_remove_processor_by_name() {
        let mut pipeline = AudioPipeline::new("Remove").and(add_one()).and(Dropping);
        assert!(pipeline.remove_processor("Dropping"));
        assert!(!pipeline.remove_processor("Dropping"));
        assert_eq!(pipeline.processor_names().collect::<Vec<_>>(), vec!["AddOne"]);
        assert_eq!(pipeline.process(&[1]), Some(vec![2]));
    }

    #[test]
    fn test_describe_and_graph() {
        let mut pipeline = AudioPipeline::new("Info").and(add_one());
        pipeline.process(&[0]);
        let info = pipeline.describe();
        assert_eq!(info.name, "Info");
        assert_eq!(info.processor_count(), 1);
        assert!(info.processors[0].initialized);

        let graph = pipeline.get_graph();
        assert!(graph.starts_with("Info Start"));
        assert!(graph.contains("AddOne (step=1)"));
        assert!(graph.ends_with("Output\n"));
    }
}
