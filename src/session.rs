//! A running session: a producer thread recomputing the field with
//! the selected kernel, and a consumer end for whoever displays it.
//!
//! Switching kernels stops the producer cooperatively (it polls its
//! cancellation token once per row), takes back its buffer, and starts
//! a fresh loop with the new kernel on the same buffers.

use std::panic;
use std::thread::{self, JoinHandle};

use log::info;

use crate::cancel::CancelToken;
use crate::capability;
use crate::exchange::{Consumer, FieldExchange, Frame, Producer};
use crate::kernel::KernelVariant;
use crate::viewport::{Position, Viewport};
use crate::{Error, Result};

/// Everything fixed at session start.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    /// Cells per row.
    pub grid_width: usize,
    /// Rows.
    pub grid_height: usize,
    /// Iteration cap for every pass.
    pub max_iterations: u32,
    /// Where the first pass looks.
    pub position: Position,
    /// Kernel to start with, by name; `None` picks the best usable one.
    pub kernel: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> SessionConfig {
        SessionConfig {
            grid_width: 1024,
            grid_height: 768,
            max_iterations: 256,
            position: Position::default(),
            kernel: None,
        }
    }
}

impl SessionConfig {
    /// The viewport the first pass renders.
    pub fn viewport(&self) -> Result<Viewport> {
        Viewport::new(
            self.position,
            self.grid_width,
            self.grid_height,
            self.max_iterations,
        )
    }
}

struct Running {
    cancel: CancelToken,
    handle: JoinHandle<Producer>,
}

/// A producer thread plus the consumer end of its exchange.  Dropping
/// the session stops the producer and waits for it.
pub struct Session {
    consumer: Consumer,
    running: Option<Running>,
    idle: Option<Producer>,
    kernel: KernelVariant,
    viewport: Viewport,
}

impl Session {
    /// Validates the configuration, selects the kernel, allocates the
    /// buffers, and starts producing.
    pub fn start(config: &SessionConfig) -> Result<Session> {
        let viewport = config.viewport()?;
        let kernel = capability::select(config.kernel.as_ref().map(String::as_str), &viewport)?;
        let (producer, consumer) = FieldExchange::new(viewport);
        let mut session = Session {
            consumer,
            running: None,
            idle: Some(producer),
            kernel,
            viewport,
        };
        session.resume()?;
        info!(
            "session started: {}x{} grid, {} iterations, kernel `{}`",
            viewport.width(),
            viewport.height(),
            viewport.max_iterations(),
            kernel
        );
        Ok(session)
    }

    /// The kernel the producer is running.
    pub fn kernel(&self) -> KernelVariant {
        self.kernel
    }

    /// The grid and iteration cap the session was started with.
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// One consumer step; see `Consumer::step`.
    pub fn frame(&mut self) -> Frame<'_> {
        self.consumer.step()
    }

    /// Passes published since the session started.
    pub fn published(&self) -> u64 {
        self.consumer.published()
    }

    /// Move the view.  Takes effect from the producer's next pass.
    pub fn request(&self, position: Position) -> Result<()> {
        self.consumer.request(position)
    }

    /// The latest requested position.
    pub fn requested(&self) -> Position {
        self.consumer.requested()
    }

    /// Replace the running kernel.  The pass in flight is abandoned;
    /// the field the consumer holds stays valid and keeps being
    /// handed out until the new kernel publishes.  If the new kernel
    /// cannot fill the grid, nothing changes.
    pub fn switch_to(&mut self, kernel: KernelVariant) -> Result<()> {
        kernel.check(&self.viewport)?;
        if kernel == self.kernel && self.running.is_some() {
            return Ok(());
        }
        self.stop();
        info!("switching kernel from `{}` to `{}`", self.kernel, kernel);
        self.kernel = kernel;
        self.resume()
    }

    /// Switch to the next kernel that can fill the grid, in menu order.
    pub fn cycle(&mut self) -> Result<KernelVariant> {
        let next = self.kernel.next_usable(&self.viewport);
        self.switch_to(next)?;
        Ok(next)
    }

    /// Cancel the producer and wait for it to hand its buffer back.
    /// A producer that died of a panic takes the session down with it.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            match running.handle.join() {
                Ok(producer) => self.idle = Some(producer),
                Err(cause) => panic::resume_unwind(cause),
            }
        }
    }

    fn resume(&mut self) -> Result<()> {
        let producer = match self.idle.take() {
            Some(producer) => producer,
            None => return Ok(()),
        };
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let kernel = self.kernel;
        let handle = thread::Builder::new()
            .name(format!("producer-{}", kernel))
            .spawn(move || producer.run(&kernel, &token))
            .map_err(Error::Spawn)?;
        self.running = Some(Running { cancel, handle });
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.cancel.cancel();
            // Re-raising a producer panic while dropping would abort.
            let _ = running.handle.join();
            info!("session stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn small(kernel: &str) -> SessionConfig {
        SessionConfig {
            grid_width: 64,
            grid_height: 48,
            max_iterations: 64,
            position: Position::new(-0.5, 0.0, 3.0),
            kernel: Some(kernel.to_string()),
        }
    }

    fn wait_for(session: &Session, published: u64) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while session.published() < published {
            assert!(Instant::now() < deadline, "producer stalled");
            thread::yield_now();
        }
    }

    #[test]
    fn default_config_matches_the_viewer() {
        let config = SessionConfig::default();
        assert_eq!((config.grid_width, config.grid_height), (1024, 768));
        assert_eq!(config.max_iterations, 256);
        assert_eq!(config.position, Position::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn bad_configs_do_not_start() {
        assert!(Session::start(&small("nope")).is_err());
        let mut odd = small("block");
        odd.grid_width = 60;
        match Session::start(&odd) {
            Err(Error::LaneMismatch { .. }) => {}
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("started on a bad grid"),
        }
    }

    #[test]
    fn frames_match_a_direct_computation() {
        let config = small("scalar");
        let mut session = Session::start(&config).unwrap();
        wait_for(&session, 1);
        let frame = session.frame();
        assert!(frame.fresh);
        assert!(frame.elapsed.is_some());
        let expected = KernelVariant::Scalar.compute(&config.viewport().unwrap());
        assert_eq!(frame.field.counts(), expected.counts());
    }

    #[test]
    fn switching_kernels_keeps_producing_the_same_field() {
        let config = small("scalar");
        let expected = KernelVariant::Scalar.compute(&config.viewport().unwrap());
        let mut session = Session::start(&config).unwrap();
        wait_for(&session, 1);

        session.switch_to(KernelVariant::Block).unwrap();
        assert_eq!(session.kernel(), KernelVariant::Block);
        let before = session.published();
        wait_for(&session, before + 2);
        assert_eq!(session.frame().field.counts(), expected.counts());
    }

    #[test]
    fn refused_switch_leaves_the_session_running() {
        let mut session = Session::start(&small("scalar")).unwrap();
        let mut narrow = small("scalar");
        narrow.grid_width = 12;
        let mut narrow = Session::start(&narrow).unwrap();
        assert!(narrow.switch_to(KernelVariant::Block).is_err());
        assert_eq!(narrow.kernel(), KernelVariant::Scalar);
        wait_for(&narrow, 1);

        let next = session.cycle().unwrap();
        assert_ne!(next, KernelVariant::Scalar);
        wait_for(&session, session.published() + 1);
    }

    #[test]
    fn requested_position_reaches_the_consumer() {
        let mut session = Session::start(&small("block")).unwrap();
        let there = Position::new(-1.25, 0.1, 0.5);
        session.request(there).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            assert!(Instant::now() < deadline, "position never adopted");
            if session.frame().field.position() == Some(there) {
                break;
            }
            thread::yield_now();
        }
    }

    #[test]
    fn stopped_session_can_resume() {
        let mut session = Session::start(&small("scalar")).unwrap();
        wait_for(&session, 1);
        session.stop();
        let stopped_at = session.published();
        session.switch_to(KernelVariant::Scalar).unwrap();
        wait_for(&session, stopped_at + 1);
    }
}
