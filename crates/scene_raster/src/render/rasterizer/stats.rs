use std::time::Duration;

use bitflags::bitflags;

use crate::render::RenderError;

bitflags! {
    /// Slots a single draw had to rebind
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Rebinds: u32 {
        /// Graphics pipeline
        const PIPELINE = 1 << 0;
        /// Global set at set 0
        const GLOBAL_SET = 1 << 1;
        /// Material instance at set 1
        const MATERIAL_SET = 1 << 2;
        /// Vertex buffer at binding 0
        const VERTEX_BUFFER = 1 << 3;
        /// Index buffer
        const INDEX_BUFFER = 1 << 4;
        /// Per-object set at set 2
        const OBJECT_SET = 1 << 5;
    }
}

/// Counters for one recorded frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Indexed draws recorded
    pub draws: u32,
    /// Zero-index draws accepted without recording
    pub empty_draws: u32,
    /// Pipeline binds
    pub pipeline_binds: u32,
    /// Global set binds
    pub global_set_binds: u32,
    /// Material instance binds
    pub material_binds: u32,
    /// Vertex buffer binds
    pub vertex_buffer_binds: u32,
    /// Index buffer binds
    pub index_buffer_binds: u32,
    /// Per-object set binds
    pub object_set_binds: u32,
    /// Time between `begin` and `end`
    pub recording_time: Duration,
}

impl FrameStats {
    pub(crate) fn record(&mut self, rebinds: Rebinds) {
        let count = |flag| u32::from(rebinds.contains(flag));
        self.pipeline_binds += count(Rebinds::PIPELINE);
        self.global_set_binds += count(Rebinds::GLOBAL_SET);
        self.material_binds += count(Rebinds::MATERIAL_SET);
        self.vertex_buffer_binds += count(Rebinds::VERTEX_BUFFER);
        self.index_buffer_binds += count(Rebinds::INDEX_BUFFER);
        self.object_set_binds += count(Rebinds::OBJECT_SET);
        self.draws += 1;
    }

    /// Binds of any kind
    pub fn total_binds(&self) -> u32 {
        self.pipeline_binds
            + self.global_set_binds
            + self.material_binds
            + self.vertex_buffer_binds
            + self.index_buffer_binds
            + self.object_set_binds
    }
}

/// Outcome of a recorded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameReport {
    /// Frames recorded before this one
    pub frame: u64,
    /// Counters
    pub stats: FrameStats,
    /// First draw error; a tainted frame must not be presented
    pub failure: Option<RenderError>,
}

impl FrameReport {
    /// Whether the frame can be presented
    pub fn is_clean(&self) -> bool {
        self.failure.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_counts_each_flag() {
        let mut stats = FrameStats::default();
        stats.record(Rebinds::PIPELINE | Rebinds::GLOBAL_SET | Rebinds::MATERIAL_SET);
        stats.record(Rebinds::empty());

        assert_eq!(stats.draws, 2);
        assert_eq!(stats.pipeline_binds, 1);
        assert_eq!(stats.material_binds, 1);
        assert_eq!(stats.vertex_buffer_binds, 0);
        assert_eq!(stats.total_binds(), 3);
    }
}
