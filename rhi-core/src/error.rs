//! Error taxonomy (spec §7): contract violations are programmer errors and
//! abort; runtime conditions are ordinary `Result`s.

/// A programmer error: invalid state transition, missing usage flag,
/// out-of-range binding, unbalanced debug label, etc.
///
/// These are not meant to be caught and handled — [`fatal`] logs and
/// aborts, matching the C++ original's "log-and-abort" behavior (spec §7).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContractViolation {
    #[error("command `{command}` is not valid in encoder state `{state}`")]
    WrongEncoderState {
        command: &'static str,
        state: &'static str,
    },
    #[error("buffer usage {actual:?} does not include required usage {required:?}")]
    MissingBufferUsage {
        required: rhi_types::BufferUsage,
        actual: rhi_types::BufferUsage,
    },
    #[error("texture usage {actual:?} does not include required usage {required:?}")]
    MissingTextureUsage {
        required: rhi_types::TextureUsage,
        actual: rhi_types::TextureUsage,
    },
    #[error("bind set layout has no binding {binding}")]
    NoSuchBinding { binding: u32 },
    #[error("EndDebugLabel called with no matching BeginDebugLabel")]
    UnbalancedDebugLabel,
    #[error("push constant size {size} is not a multiple of 4")]
    PushConstantSizeNotAligned { size: u32 },
    #[error("push constant range [{offset}, {end}) exceeds pipeline layout's range of size {layout_size}")]
    PushConstantOutOfRange {
        offset: u32,
        end: u32,
        layout_size: u32,
    },
    #[error("SetBindSet/SetPushConstant called before a pipeline was set")]
    NoPipelineSet,
    #[error("subresource range is out of bounds for its parent texture")]
    SubresourceOutOfBounds,
    #[error("{0}")]
    Other(String),
}

/// Log-and-abort sink for [`ContractViolation`]s (spec §7).
///
/// In debug builds this panics with full context so tests can assert on
/// it via `#[should_panic]`; a release build would still want the message
/// on stderr before aborting, which `panic!` already provides through the
/// default panic hook.
#[track_caller]
pub fn fatal(violation: ContractViolation) -> ! {
    log::error!("contract violation: {violation}");
    panic!("contract violation: {violation}");
}

/// Runtime condition surfaced from async buffer mapping (spec §7 class 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapStatus {
    Success,
    /// The map request was superseded or never issued.
    None,
    DeviceLost,
    DestroyedBeforeCallback,
}

/// Runtime condition surfaced from swapchain acquire (spec §7 class 2,
/// out-of-core but part of the closed status set applications observe).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapChainAcquireStatus {
    Success,
    Suboptimal,
    Timeout,
    Outdated,
    SurfaceLost,
    Error,
}

/// Wraps a [`rhi_hal::DeviceError`] for operations that can also fail for
/// core-level runtime reasons (e.g. command-arena allocation failure).
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Device(#[from] rhi_hal::DeviceError),
    #[error("command allocator is out of memory")]
    CommandAllocatorOom,
    #[error("upload staging ring buffer has no free space for a {requested}-byte allocation")]
    StagingRingExhausted { requested: u64 },
    #[error("adapter does not support required features: {missing:?}")]
    UnsupportedFeatures { missing: rhi_types::Features },
}
