//! The three-slot hand-off between a producer that recomputes fields
//! continuously and a consumer that displays them on its own clock.
//!
//! Three buffers circulate.  At any moment one is *producing* (owned
//! by the `Producer`, being written by a kernel), one is *ready*
//! (inside the exchange, holding the newest complete field or a stale
//! one), and one is *consumed* (owned by the `Consumer`, being read).
//! Buffers change roles only by swapping under the exchange's lock:
//!
//! - a finished pass swaps producing and ready, and marks ready fresh;
//! - a consumer step swaps ready and consumed, if ready is fresh.
//!
//! Ownership enforces the roles: the producing and consumed buffers
//! are moved into their owners, so neither side can reach the other's
//! buffer.  The lock is held for a swap and a few words of
//! bookkeeping, never for a pass.  A fresh field the consumer has not
//! picked up is swapped out by the next finished pass: the newest
//! field always wins, and nothing queues.

use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::cancel::CancelToken;
use crate::field::Field;
use crate::kernel::{Kernel, Pass};
use crate::viewport::{Position, Viewport};
use crate::Result;

struct Shared {
    ready: Field,
    fresh: bool,
    elapsed: Option<Duration>,
    published: u64,
    requested: Position,
}

/// The state the producer and consumer share.  Only reachable through
/// the two ends returned by `FieldExchange::new`.
pub struct FieldExchange {
    shared: Mutex<Shared>,
}

impl FieldExchange {
    /// Allocates the three buffers for `viewport`'s grid and returns
    /// the two ends of the exchange.  The producer starts out
    /// rendering `viewport`.
    pub fn new(viewport: Viewport) -> (Producer, Consumer) {
        let (w, h) = (viewport.width(), viewport.height());
        let exchange = Arc::new(FieldExchange {
            shared: Mutex::new(Shared {
                ready: Field::for_slot(w, h, 1),
                fresh: false,
                elapsed: None,
                published: 0,
                requested: viewport.position(),
            }),
        });
        let producer = Producer {
            exchange: exchange.clone(),
            field: Field::for_slot(w, h, 0),
            viewport,
            generation: 0,
        };
        let consumer = Consumer {
            exchange,
            field: Field::for_slot(w, h, 2),
        };
        (producer, consumer)
    }

    // Every critical section is a swap plus plain stores, so a panic
    // on the other side cannot have left the state half-updated.
    fn lock(&self) -> MutexGuard<Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The producing end: owns the buffer being written and the viewport
/// it is being written for.
pub struct Producer {
    exchange: Arc<FieldExchange>,
    field: Field,
    viewport: Viewport,
    generation: u64,
}

impl Producer {
    /// The viewport the next pass will render.
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Number of passes published so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Runs one pass into the producing buffer and, if it completes,
    /// publishes it.  A cancelled pass publishes nothing; its buffer
    /// simply gets overwritten by the next pass.
    pub fn pass<K: Kernel + ?Sized>(&mut self, kernel: &K, cancel: &CancelToken) -> Pass {
        let started = Instant::now();
        let pass = kernel.run(&self.viewport, &mut self.field, cancel);
        if pass == Pass::Complete {
            self.publish(started.elapsed());
        }
        pass
    }

    /// Runs passes back to back until `cancel` fires, then hands the
    /// producer back so a new loop can reuse its buffer.
    pub fn run<K: Kernel + ?Sized>(mut self, kernel: &K, cancel: &CancelToken) -> Producer {
        debug!("producer loop starting with kernel `{}`", kernel.name());
        while !cancel.is_cancelled() {
            if self.pass(kernel, cancel) == Pass::Cancelled {
                break;
            }
        }
        debug!("producer loop stopped after {} passes", self.generation);
        self
    }

    fn publish(&mut self, elapsed: Duration) {
        self.generation += 1;
        self.field.stamp(self.generation, self.viewport.position());

        let mut shared = self.exchange.lock();
        mem::swap(&mut self.field, &mut shared.ready);
        shared.fresh = true;
        shared.elapsed = Some(elapsed);
        shared.published = self.generation;
        if shared.requested != self.viewport.position() {
            if let Ok(next) = self.viewport.with_position(shared.requested) {
                self.viewport = next;
            }
        }
        drop(shared);

        trace!("published pass {} ({:?})", self.generation, elapsed);
    }
}

/// What a consumer step hands out.
#[derive(Debug)]
pub struct Frame<'a> {
    /// The newest field the consumer holds.
    pub field: &'a Field,
    /// Duration of the most recently published pass, if any.
    pub elapsed: Option<Duration>,
    /// Did this step swap in a new field?
    pub fresh: bool,
}

/// The consuming end: owns the buffer being read, and can ask the
/// producer to look somewhere else.
pub struct Consumer {
    exchange: Arc<FieldExchange>,
    field: Field,
}

impl Consumer {
    /// Picks up the newest published field, if there is one the
    /// consumer has not seen; otherwise the previous field is handed
    /// out again.  Never waits for a pass to finish.
    pub fn step(&mut self) -> Frame<'_> {
        let (fresh, elapsed) = {
            let mut shared = self.exchange.lock();
            let fresh = shared.fresh;
            if fresh {
                mem::swap(&mut self.field, &mut shared.ready);
                shared.fresh = false;
            }
            (fresh, shared.elapsed)
        };
        Frame {
            field: &self.field,
            elapsed,
            fresh,
        }
    }

    /// The field picked up by the latest step.
    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Asks the producer to render `position` from its next pass on.
    /// The pass in flight keeps its old position.
    pub fn request(&self, position: Position) -> Result<()> {
        position.validate()?;
        self.exchange.lock().requested = position;
        Ok(())
    }

    /// The most recently requested position.
    pub fn requested(&self) -> Position {
        self.exchange.lock().requested
    }

    /// How many passes the producer has published so far.
    pub fn published(&self) -> u64 {
        self.exchange.lock().published
    }
}
