//! Debounced live quotes for one input form.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use safeswap_builder::MetaTxBuilder;
use safeswap_types::{format_amount, Result, Token, U256};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct DebounceConfig {
    pub delay_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self { delay_ms: 1_000 }
    }
}

/// Indicative output shown next to the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteDisplay {
    pub src: Token,
    pub dst: Token,
    pub amount_in: U256,
    pub amount_out: U256,
    /// `amount_out` in `dst` units, e.g. "0.0031".
    pub formatted: String,
}

/// Trailing-edge debouncer: only the last input within the delay is quoted,
/// and a response for a superseded input is never shown.
pub struct QuoteDebouncer {
    builder: Arc<MetaTxBuilder>,
    config: DebounceConfig,
    generation: Arc<AtomicU64>,
    pending: Mutex<Option<JoinHandle<()>>>,
    display: Arc<watch::Sender<Option<QuoteDisplay>>>,
}

impl QuoteDebouncer {
    pub fn new(builder: Arc<MetaTxBuilder>, config: DebounceConfig) -> Self {
        let (display, _) = watch::channel(None);
        Self {
            builder,
            config,
            generation: Arc::new(AtomicU64::new(0)),
            pending: Mutex::new(None),
            display: Arc::new(display),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<QuoteDisplay>> {
        self.display.subscribe()
    }

    pub fn latest(&self) -> Option<QuoteDisplay> {
        self.display.borrow().clone()
    }

    fn abort_pending(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(handle) = pending.take() {
                handle.abort();
            }
        }
    }

    /// Register a new input. Must be called within a Tokio runtime.
    ///
    /// A zero amount clears the display immediately.
    pub fn input(&self, src: Token, dst: Token, amount: U256) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.abort_pending();

        if amount.is_zero() {
            self.display.send_replace(None);
            return;
        }

        let builder = Arc::clone(&self.builder);
        let current = Arc::clone(&self.generation);
        let display = Arc::clone(&self.display);
        let delay = Duration::from_millis(self.config.delay_ms);

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let result = builder.quote(&src, &dst, amount).await;
            publish(&display, &current, generation, src, dst, amount, result);
        });

        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(handle);
        }
    }

    /// Drop any pending request and clear the display.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_pending();
        self.display.send_replace(None);
    }
}

/// Show a quote result unless a newer input arrived while it was in flight.
///
/// Superseded tasks are normally aborted first; this covers a response that
/// completes before the abort lands. Returns whether the display changed.
fn publish(
    display: &watch::Sender<Option<QuoteDisplay>>,
    current: &AtomicU64,
    generation: u64,
    src: Token,
    dst: Token,
    amount: U256,
    result: Result<U256>,
) -> bool {
    if current.load(Ordering::SeqCst) != generation {
        debug!(generation, "discarding superseded quote");
        return false;
    }
    match result {
        Ok(amount_out) => {
            display.send_replace(Some(QuoteDisplay {
                src,
                dst,
                amount_in: amount,
                amount_out,
                formatted: format_amount(amount_out, dst.decimals),
            }));
        }
        Err(e) => {
            warn!(src = src.symbol, dst = dst.symbol, error = %e, "quote failed");
            display.send_replace(None);
        }
    }
    true
}

impl Drop for QuoteDebouncer {
    fn drop(&mut self) {
        self.abort_pending();
    }
}
