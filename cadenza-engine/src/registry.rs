//! Extension registries for handlers, providers, tools, and callbacks.
//!
//! All four registries share one contract: `register` inserts or replaces
//! (last registration wins, with a diagnostic on override) and lookup is by
//! exact name. The bundle is dependency-injected into the executor rather
//! than living in module globals. Registration is expected at bootstrap; the
//! locks make late registration safe, not encouraged.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, Weak};

use async_trait::async_trait;
use tracing::{debug, warn};

use cadenza_core::handler::StepHandler;

use crate::handlers;
use crate::provider::{ModelProvider, SiumaiProvider, TokenUsage};
use crate::tool::{EchoTool, Tool};

/// A named registry of shared implementations.
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T: ?Sized> Registry<T> {
    /// Create an empty registry; `kind` labels diagnostics.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register an implementation under a name. Replaces any existing
    /// registration with a warning; the last write wins.
    pub fn register(&self, name: impl Into<String>, implementation: Arc<T>) {
        let name = name.into();
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if entries.insert(name.clone(), implementation).is_some() {
            warn!("Replacing existing {} registration '{}'", self.kind, name);
        } else {
            debug!("Registered {} '{}'", self.kind, name);
        }
    }

    /// Look up an implementation by exact name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<T>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(name)
            .map(Arc::clone)
    }

    /// Whether a name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .contains_key(name)
    }

    /// Sorted list of registered names, for diagnostics.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl<T: ?Sized> std::fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kind", &self.kind)
            .field("names", &self.names())
            .finish()
    }
}

/// Payload passed to lifecycle callbacks by streaming primitives.
#[derive(Debug, Clone)]
pub enum CallbackEvent {
    /// The stream completed successfully.
    Finish {
        /// Full generated text
        text: String,
        /// Token usage for the generation
        usage: TokenUsage,
    },
    /// The stream failed after the response was returned.
    Error {
        /// Rendered error message
        message: String,
    },
}

/// A named lifecycle hook referenced from manifest config (e.g. `onFinish`).
#[async_trait]
pub trait LifecycleCallback: Send + Sync {
    /// Invoke the callback with a lifecycle event.
    async fn invoke(&self, event: CallbackEvent);
}

/// Resolves agent ids to manifest paths for the `call-agent` primitive.
///
/// Agent discovery is a host concern; the engine only consults whatever
/// locator the host registered.
pub trait AgentLocator: Send + Sync {
    /// Return the manifest path for an agent id, if known.
    fn locate(&self, agent_id: &str) -> Option<PathBuf>;
}

/// Locator mapping `<root>/<agent_id>.yaml`.
#[derive(Debug, Clone)]
pub struct DirectoryLocator {
    root: PathBuf,
}

impl DirectoryLocator {
    /// Create a locator rooted at a directory of manifest files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AgentLocator for DirectoryLocator {
    fn locate(&self, agent_id: &str) -> Option<PathBuf> {
        // Reject ids that could escape the root directory.
        if agent_id.contains('/') || agent_id.contains("..") {
            return None;
        }
        let path = self.root.join(format!("{agent_id}.yaml"));
        path.is_file().then_some(path)
    }
}

/// The registry bundle shared by one engine instance.
pub struct Registries {
    /// Step type → handler
    pub handlers: Registry<dyn StepHandler>,
    /// Provider name → model factory
    pub providers: Registry<dyn ModelProvider>,
    /// Tool name → tool
    pub tools: Registry<dyn Tool>,
    /// Callback name → lifecycle hook
    pub callbacks: Registry<dyn LifecycleCallback>,
    locator: RwLock<Option<Arc<dyn AgentLocator>>>,
}

impl Registries {
    /// Create an empty bundle (no handlers, providers, or tools).
    #[must_use]
    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            handlers: Registry::new("handler"),
            providers: Registry::new("provider"),
            tools: Registry::new("tool"),
            callbacks: Registry::new("callback"),
            locator: RwLock::new(None),
        })
    }

    /// Create a bundle wired with the core primitives, the siumai providers,
    /// and the built-in tools.
    #[must_use]
    pub fn with_builtins() -> Arc<Self> {
        let registries = Self::empty();

        registries
            .providers
            .register("openai", Arc::new(SiumaiProvider::openai()));
        registries
            .providers
            .register("anthropic", Arc::new(SiumaiProvider::anthropic()));
        registries
            .providers
            .register("ollama", Arc::new(SiumaiProvider::ollama()));

        registries.tools.register("echo", Arc::new(EchoTool::new()));

        handlers::register_builtins(&registries);

        registries
    }

    /// Register the agent locator consulted by `call-agent`.
    pub fn set_locator(&self, locator: Arc<dyn AgentLocator>) {
        let mut slot = self.locator.write().expect("locator lock poisoned");
        if slot.replace(locator).is_some() {
            warn!("Replacing existing agent locator registration");
        }
    }

    /// The registered agent locator, if any.
    #[must_use]
    pub fn locator(&self) -> Option<Arc<dyn AgentLocator>> {
        self.locator
            .read()
            .expect("locator lock poisoned")
            .clone()
    }

    /// Upgrade a weak bundle reference held by a built-in handler.
    pub(crate) fn upgrade(weak: &Weak<Self>) -> cadenza_core::Result<Arc<Self>> {
        weak.upgrade().ok_or_else(|| {
            cadenza_core::CadenzaError::execution("registry bundle dropped while handler was live")
        })
    }
}

impl std::fmt::Debug for Registries {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registries")
            .field("handlers", &self.handlers.names())
            .field("providers", &self.providers.names())
            .field("tools", &self.tools.names())
            .field("callbacks", &self.callbacks.names())
            .finish()
    }
}
