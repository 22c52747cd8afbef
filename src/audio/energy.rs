use super::AudioFrameBlock;

/// Reduces a block of time-domain samples to a single RMS energy value.
///
/// Holds no state between ticks; the block size is only used to report what
/// the analyzer expects from its frame source.
#[derive(Debug, Clone)]
pub struct EnergyAnalyzer {
    block_size: usize,
}

impl EnergyAnalyzer {
    pub fn new(block_size: usize) -> Self {
        Self { block_size }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// RMS of a block of samples already centered on zero.
    pub fn analyze(&self, samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }

        let sum: f32 = samples.iter().map(|&x| x * x).sum();
        (sum / samples.len() as f32).sqrt()
    }

    pub fn analyze_block(&self, block: &AudioFrameBlock) -> f32 {
        self.analyze(&block.samples)
    }
}

impl Default for EnergyAnalyzer {
    fn default() -> Self {
        Self::new(super::DEFAULT_BLOCK_SIZE)
    }
}
