#![allow(clippy::needless_range_loop)]

pub mod fixed;
pub mod indicators;
pub mod kernels;
pub mod neighbors;
pub mod pipeline;
pub mod range;
pub mod scaling;
pub mod utilities;

pub use fixed::{Q15_MAX, Q15_MIN, Q15_SCALE};
pub use indicators::dfa::{dfa, DfaBuilder, DfaInput, DfaOutput, DfaParams};
pub use indicators::lyapunov::{
    lyapunov, LyapunovBuilder, LyapunovInput, LyapunovOutput, LyapunovParams,
};
pub use neighbors::{NeighborStrategy, PhaseSpace};
pub use pipeline::{
    CoordinatorConfig, IndicatorKind, ProcessingResult, StageCoordinator, StageKind,
};
pub use range::{RangeMonitor, RangeStatus};
pub use scaling::{ScalingEngine, ScalingStrategy};

#[cfg(all(test, not(target_arch = "wasm32")))]
mod _rayon_one_big_stack {
    use ctor::ctor;
    use rayon::ThreadPoolBuilder;

    #[ctor]
    fn init_rayon_pool() {
        let _ = ThreadPoolBuilder::new()
            .num_threads(1)
            .stack_size(8 * 1024 * 1024)
            .build_global();
    }
}
