use std::str::FromStr;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One acquisition tick of the optical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplePair {
    pub red: u32,
    pub infrared: u32,
}

impl SamplePair {
    pub fn new(red: u32, infrared: u32) -> Self {
        SamplePair { red, infrared }
    }
}

impl From<(u32, u32)> for SamplePair {
    fn from((red, infrared): (u32, u32)) -> Self {
        SamplePair { red, infrared }
    }
}

/// Parses the sensor line format `<red>,<ir>`. Anything after the infrared
/// digits is ignored.
impl FromStr for SamplePair {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let malformed = || Error::MalformedSample(line.to_string());

        let (red, rest) = line.trim().split_once(',').ok_or_else(malformed)?;
        if red.is_empty() || !red.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(malformed());
        }

        let red = red.parse().map_err(|_| malformed())?;
        let infrared = rest[..digits].parse().map_err(|_| malformed())?;
        Ok(SamplePair { red, infrared })
    }
}

/// Time-ordered samples of one acquisition window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleBatch {
    samples: Vec<SamplePair>,
}

impl SampleBatch {
    pub fn new(samples: Vec<SamplePair>) -> Self {
        SampleBatch { samples }
    }

    /// Builds a batch from raw sensor lines, skipping lines that do not parse.
    /// Returns the batch and the number of skipped lines.
    pub fn from_lines<I, S>(lines: I) -> (Self, usize)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut skipped = 0;
        let samples = lines
            .into_iter()
            .filter_map(|line| match line.as_ref().parse::<SamplePair>() {
                Ok(sample) => Some(sample),
                Err(_) => {
                    skipped += 1;
                    None
                }
            })
            .collect();
        (SampleBatch { samples }, skipped)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[SamplePair] {
        &self.samples
    }

    pub fn iter(&self) -> impl Iterator<Item = &SamplePair> {
        self.samples.iter()
    }

    pub fn red(&self) -> Array1<f64> {
        self.samples.iter().map(|s| s.red as f64).collect()
    }

    pub fn infrared(&self) -> Array1<f64> {
        self.samples.iter().map(|s| s.infrared as f64).collect()
    }
}

impl FromIterator<SamplePair> for SampleBatch {
    fn from_iter<T: IntoIterator<Item = SamplePair>>(iter: T) -> Self {
        SampleBatch {
            samples: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<SamplePair>> for SampleBatch {
    fn from(samples: Vec<SamplePair>) -> Self {
        SampleBatch { samples }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn parses_sensor_line() {
        assert_eq!("51234,60321".parse::<SamplePair>(), Ok(SamplePair::new(51234, 60321)));
        assert_eq!("  12,34\r".parse::<SamplePair>(), Ok(SamplePair::new(12, 34)));
        assert_eq!("12,34,56".parse::<SamplePair>(), Ok(SamplePair::new(12, 34)));
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in ["", "12", ",34", "12,", "a,34", "12,b", "-1,34", "12 ,34", "99999999999,1"] {
            assert!(
                matches!(line.parse::<SamplePair>(), Err(Error::MalformedSample(_))),
                "{:?} should not parse",
                line
            );
        }
    }

    #[test]
    fn batch_from_lines_skips_noise() {
        let lines = ["MAX30102 ready", "100,200", "", "101,201", "garbage", "102,202"];
        let (batch, skipped) = SampleBatch::from_lines(lines);
        assert_eq!(batch.len(), 3);
        assert_eq!(skipped, 3);
        assert_eq!(batch.red(), array![100.0, 101.0, 102.0]);
        assert_eq!(batch.infrared(), array![200.0, 201.0, 202.0]);
    }

    #[test]
    fn empty_batch() {
        let batch = SampleBatch::default();
        assert!(batch.is_empty());
        assert_eq!(batch.infrared().len(), 0);
    }
}
