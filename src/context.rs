//! Shared construction context
//!
//! A [`ProgramContext`] holds everything that is shared between programs built side by side:
//! the global id allocator, the extern resolver hook, the [`BuildConfig`] and the cancellation
//! flag. It is handed to every [`crate::ssa::Program`] through an `Arc`.

use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

use crate::{
    ssa::{GlobalId, SsaType},
    BuildConfig,
};

/// Allocates globally unique instruction ids
///
/// The engine never assumes the ids are dense or reusable. A persistence layer can plug in
/// its own allocator to keep ids stable across runs.
pub trait IdAllocator: Send + Sync + fmt::Debug {
    /// Returns a fresh id which has never been returned before
    fn allocate(&self) -> GlobalId;
}

/// Lock-free [`IdAllocator`] backed by an atomic counter
#[derive(Debug)]
pub struct AtomicIdAllocator {
    next: AtomicU64,
}

impl AtomicIdAllocator {
    /// Creates an allocator handing out ids starting at `first`
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl Default for AtomicIdAllocator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

impl IdAllocator for AtomicIdAllocator {
    fn allocate(&self) -> GlobalId {
        GlobalId::new(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// A host-provided binding for a name that no function declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternBinding {
    /// Name the binding resolves to (library function, builtin, global object)
    pub name: String,
    /// Static type of the binding
    pub ty: SsaType,
}

impl ExternBinding {
    /// Creates a new extern binding
    pub fn new(name: impl Into<String>, ty: SsaType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Hook consulted when a read falls through the entry block of a function without finding
/// a local or captured binding
pub trait ExternResolver: Send + Sync {
    /// Returns the host binding for `name`, or `None` if the host does not know it
    fn try_build_extern_value(&self, name: &str) -> Option<ExternBinding>;
}

impl<F> ExternResolver for F
where
    F: Fn(&str) -> Option<ExternBinding> + Send + Sync,
{
    fn try_build_extern_value(&self, name: &str) -> Option<ExternBinding> {
        self(name)
    }
}

/// State shared by all programs that are built together
///
/// # Example
///
/// ```rust
/// use ssakit::{BuildConfig, ExternBinding, ProgramContext};
/// use ssakit::ssa::SsaType;
///
/// let context = ProgramContext::new(BuildConfig::default())
///     .with_extern_resolver(|name: &str| {
///         (name == "print").then(|| ExternBinding::new("print", SsaType::Any))
///     })
///     .into_shared();
///
/// assert!(context.try_build_extern_value("print").is_some());
/// assert!(context.try_build_extern_value("missing").is_none());
/// ```
pub struct ProgramContext {
    config: BuildConfig,
    ids: Box<dyn IdAllocator>,
    externs: Option<Box<dyn ExternResolver>>,
    cancelled: AtomicBool,
}

impl ProgramContext {
    /// Creates a context with the given configuration and an [`AtomicIdAllocator`]
    #[must_use]
    pub fn new(config: BuildConfig) -> Self {
        Self {
            config,
            ids: Box::new(AtomicIdAllocator::default()),
            externs: None,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Replaces the id allocator
    #[must_use]
    pub fn with_id_allocator(mut self, allocator: impl IdAllocator + 'static) -> Self {
        self.ids = Box::new(allocator);
        self
    }

    /// Installs the extern resolver hook
    #[must_use]
    pub fn with_extern_resolver(mut self, resolver: impl ExternResolver + 'static) -> Self {
        self.externs = Some(Box::new(resolver));
        self
    }

    /// Wraps the context into an `Arc` so it can be shared between programs
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Returns the build configuration
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Allocates a fresh global instruction id
    pub fn allocate_id(&self) -> GlobalId {
        self.ids.allocate()
    }

    /// Asks the host for a binding of `name`
    pub fn try_build_extern_value(&self, name: &str) -> Option<ExternBinding> {
        self.externs
            .as_ref()
            .and_then(|resolver| resolver.try_build_extern_value(name))
    }

    /// Requests cancellation of every build using this context
    ///
    /// Builders notice the request when they switch to another block and stop emitting.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Returns true once [`ProgramContext::cancel`] has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for ProgramContext {
    fn default() -> Self {
        Self::new(BuildConfig::default())
    }
}

impl fmt::Debug for ProgramContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramContext")
            .field("config", &self.config)
            .field("ids", &self.ids)
            .field("externs", &self.externs.is_some())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
