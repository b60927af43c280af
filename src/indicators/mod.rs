pub mod dfa;
pub mod lyapunov;

pub use dfa::{dfa, DfaBuilder, DfaError, DfaInput, DfaOutput, DfaParams};
pub use lyapunov::{
    lyapunov, lyapunov_with_kernel, LyapunovBuilder, LyapunovError, LyapunovInput, LyapunovOutput,
    LyapunovParams,
};
