use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::assemble::channel::{ChannelRegistry, ChannelStrategy};
use crate::assemble::Assembler;
use crate::creative::RenderFallback;
use crate::guard::frequency::{COUNTER_TTL, STORE_TIMEOUT};
use crate::guard::{CounterStore, FrequencyGuard, MemoryCounterStore, PacingGuard, PACING_ROTATION_PERIOD};
use crate::template::TemplateCache;

/// Holds the process-wide shared state behind every `Context` handle:
/// the template cache, the channel-strategy registry, both admission guards
/// and the published render-fallback snapshot.
#[derive(Debug)]
pub(crate) struct ContextInner {
  templates: TemplateCache,
  channels: ChannelRegistry,
  frequency: FrequencyGuard,
  pacing: Arc<PacingGuard>,
  /// Replaced wholesale by the out-of-band config sync; requests read one
  /// consistent snapshot.
  render_fallback: ArcSwap<RenderFallback>,
  shutdown: CancellationToken,
  rotation_task: Mutex<Option<JoinHandle<()>>>,
}

/// Entry point owning all shared serving state. Cheap to clone; all clones
/// see the same caches, registries and guards.
///
/// Construction spawns the pacing rotation task, so a `Context` must be
/// built inside a Tokio runtime.
#[derive(Debug, Clone)]
pub struct Context {
  inner: Arc<ContextInner>,
}

impl Context {
  /// A context with defaults: in-memory counter store, empty channel
  /// registry, 15-minute pacing windows. Production callers use
  /// [`Context::builder`].
  pub fn new() -> Self {
    Self::builder().build()
  }

  pub fn builder() -> ContextBuilder {
    ContextBuilder::default()
  }

  pub fn templates(&self) -> &TemplateCache {
    &self.inner.templates
  }

  pub fn channels(&self) -> &ChannelRegistry {
    &self.inner.channels
  }

  pub fn frequency(&self) -> &FrequencyGuard {
    &self.inner.frequency
  }

  pub fn pacing(&self) -> &PacingGuard {
    &self.inner.pacing
  }

  /// The current render-fallback snapshot. Held for the duration of a batch.
  pub fn render_fallback(&self) -> Arc<RenderFallback> {
    self.inner.render_fallback.load_full()
  }

  /// Publishes a new render-fallback table via atomic swap. In-flight
  /// requests keep the snapshot they already hold.
  pub fn publish_render_fallback(&self, fallback: RenderFallback) {
    self.inner.render_fallback.store(Arc::new(fallback));
    debug!("render fallback snapshot published");
  }

  pub fn assembler(&self) -> Assembler {
    Assembler::new(self.clone())
  }

  /// Stops the background rotation task. Idempotent.
  pub async fn shutdown(&self) {
    self.inner.shutdown.cancel();
    let task = self.inner.rotation_task.lock().take();
    if let Some(task) = task {
      let _ = task.await;
    }
  }
}

impl Default for Context {
  fn default() -> Self {
    Self::new()
  }
}

/// Configures and builds a [`Context`].
pub struct ContextBuilder {
  store: Arc<dyn CounterStore>,
  channels: ChannelRegistry,
  rotation_period: Duration,
  store_timeout: Duration,
  counter_ttl: Duration,
}

impl Default for ContextBuilder {
  fn default() -> Self {
    Self {
      store: Arc::new(MemoryCounterStore::new()),
      channels: ChannelRegistry::new(),
      rotation_period: PACING_ROTATION_PERIOD,
      store_timeout: STORE_TIMEOUT,
      counter_ttl: COUNTER_TTL,
    }
  }
}

impl ContextBuilder {
  /// Swaps in the production counter store client.
  pub fn counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
    self.store = store;
    self
  }

  /// Registers a channel strategy under its channel code.
  pub fn channel(mut self, code: impl Into<String>, strategy: Arc<dyn ChannelStrategy>) -> Self {
    self.channels.register(code, strategy);
    self
  }

  pub fn rotation_period(mut self, period: Duration) -> Self {
    self.rotation_period = period;
    self
  }

  pub fn store_timeout(mut self, timeout: Duration) -> Self {
    self.store_timeout = timeout;
    self
  }

  pub fn counter_ttl(mut self, ttl: Duration) -> Self {
    self.counter_ttl = ttl;
    self
  }

  pub fn build(self) -> Context {
    let pacing = Arc::new(PacingGuard::new());
    let shutdown = CancellationToken::new();
    let rotation_task = pacing.start_rotation(self.rotation_period, shutdown.clone());

    Context {
      inner: Arc::new(ContextInner {
        templates: TemplateCache::new(),
        channels: self.channels,
        frequency: FrequencyGuard::with_timings(self.store, self.store_timeout, self.counter_ttl),
        pacing,
        render_fallback: ArcSwap::from_pointee(RenderFallback::new()),
        shutdown,
        rotation_task: Mutex::new(Some(rotation_task)),
      }),
    }
  }
}
