//! Example encoding
//!
//! Opcode traces are hex-decoded into one example per line; raw blobs are
//! concatenated and cut into consecutive windows of exactly `features`
//! bytes, dropping the trailing remainder.

use log::debug;

use crate::error::{DatasetError, Result};
use crate::input::reader::{OpcodeLine, RawSamples};
use crate::persistence::dataset_store::Example;

/// Encodes one run's samples into examples of a fixed width
#[derive(Clone, Debug)]
pub struct ExampleEncoder {
    features: usize,
}

impl ExampleEncoder {
    /// Create an encoder producing examples of `features` bytes
    pub fn new(features: usize) -> Result<Self> {
        if features == 0 {
            return Err(DatasetError::InvalidConfig(
                "features must be a positive number of bytes".to_string(),
            ));
        }
        Ok(Self { features })
    }

    /// Encode every sample of a run, preserving input order
    pub fn encode(&self, samples: &RawSamples) -> Result<Vec<Example>> {
        let examples = match samples {
            RawSamples::Function(lines) => lines
                .iter()
                .map(|line| self.encode_opcodes(line))
                .collect::<Result<Vec<_>>>()?,
            RawSamples::Raw(blobs) => self.chunk_raw(blobs),
        };
        debug!(
            "encoded {} samples into {} examples of {} bytes",
            samples.len(),
            examples.len(),
            self.features
        );
        Ok(examples)
    }

    /// Decode a comma separated opcode line such as `DE,AD,C0,DE`
    ///
    /// Every token must be exactly two hex digits; one trailing comma is
    /// tolerated. The decoded length must equal the feature count.
    pub fn encode_opcodes(&self, line: &OpcodeLine) -> Result<Example> {
        let malformed = |reason: String| DatasetError::MalformedInput {
            file: line.source.clone(),
            line: line.line,
            reason,
        };

        let body = line.text.strip_suffix(',').unwrap_or(&line.text);
        let mut digits = String::with_capacity(body.len());
        for (idx, token) in body.split(',').enumerate() {
            if token.len() != 2 {
                return Err(malformed(format!(
                    "token {} {:?} is not a two-digit hex byte",
                    idx + 1,
                    token
                )));
            }
            digits.push_str(token);
        }

        let bytes = hex::decode(&digits).map_err(|e| malformed(e.to_string()))?;
        if bytes.len() != self.features {
            return Err(malformed(format!(
                "decoded {} bytes, expected {}",
                bytes.len(),
                self.features
            )));
        }
        Ok(bytes)
    }

    /// Concatenate blobs and cut them into `features`-sized windows
    pub fn chunk_raw(&self, blobs: &[Vec<u8>]) -> Vec<Example> {
        let stream: Vec<u8> = blobs.concat();
        let examples: Vec<Example> = stream
            .chunks_exact(self.features)
            .map(|chunk| chunk.to_vec())
            .collect();
        let dropped = stream.len() % self.features;
        if dropped > 0 {
            debug!("dropping {} trailing bytes shorter than one example", dropped);
        }
        examples
    }
}
