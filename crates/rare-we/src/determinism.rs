use rare_core::RngHandle;

/// Tag separating the resampling streams from other uses of the master seed.
const RESAMPLE_STREAM: u64 = 0x5A5A_5A5A_5A5A_5A5A;

/// Generator for the split/merge decisions of `cycle`.
///
/// Depends only on the master seed and the cycle index, so a run resumed from
/// a checkpoint draws the same numbers as an uninterrupted one.
pub fn resample_rng(master_seed: u64, cycle: usize) -> RngHandle {
    RngHandle::for_substream(master_seed ^ RESAMPLE_STREAM, cycle as u64)
}
