use std::time::Duration;

use log::{error, info};

use crate::host_bridge::clock::Clock;
use crate::host_bridge::config::{BridgeConfig, DisplayProtocol, Pacing};
use crate::host_bridge::error::BridgeError;
use crate::host_bridge::guest::Guest;
use crate::host_bridge::session::{check_fault, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    /// Terminal. Running again needs a fresh session and scheduler.
    Stopped,
}

/// What one scheduling opportunity did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Opportunity {
    pub ticked: bool,
    pub repainted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    pub opportunities: u64,
    pub ticks: u64,
    pub repaints: u64,
}

/// Paces guest ticks against the host frame loop.
///
/// The host calls [`CycleScheduler::on_opportunity`] once per presented frame. Each call runs at
/// most one guest cycle, so a stalled host never triggers a burst of catch-up ticks; time lost
/// that way is not made up later.
pub struct CycleScheduler<K: Clock> {
    state: SchedulerState,
    pacing: Pacing,
    protocol: DisplayProtocol,
    clock: K,
    target_hz: u32,
    cycle_interval: Duration,
    last_cycle: Duration,
    stats: SchedulerStats,
}

impl<K: Clock> CycleScheduler<K> {
    pub fn new(config: &BridgeConfig, clock: K) -> Self {
        let target_hz = config.clock_hz.max(1);
        let cycle_interval = Duration::from_nanos(1_000_000_000 / u64::from(target_hz));

        Self {
            state: SchedulerState::Idle,
            pacing: config.pacing,
            protocol: config.protocol,
            clock,
            target_hz,
            cycle_interval,
            last_cycle: Duration::ZERO,
            stats: SchedulerStats::default(),
        }
    }

    pub fn run(&mut self) -> Result<(), BridgeError> {
        match self.state {
            SchedulerState::Idle => {
                info!(
                    "running rom: {:?} pacing at {} Hz",
                    self.pacing, self.target_hz
                );
                self.last_cycle = self.clock.now();
                self.state = SchedulerState::Running;
                Ok(())
            }
            SchedulerState::Running => Ok(()),
            SchedulerState::Stopped => Err(BridgeError::SchedulerStopped),
        }
    }

    /// No tick or paint happens after this returns.
    pub fn stop(&mut self) {
        if self.state != SchedulerState::Stopped {
            info!(
                "scheduler stopped after {} ticks, {} repaints",
                self.stats.ticks, self.stats.repaints
            );
        }
        self.state = SchedulerState::Stopped;
    }

    /// Stops scheduling and tears the guest down.
    pub fn shutdown<G: Guest>(&mut self, session: Session<G>) -> Result<G, BridgeError> {
        self.stop();
        session.shutdown()
    }

    pub fn on_opportunity<G: Guest>(
        &mut self,
        session: &mut Session<G>,
    ) -> Result<Opportunity, BridgeError> {
        if self.state != SchedulerState::Running {
            return Ok(Opportunity::default());
        }
        self.stats.opportunities += 1;

        if self.pacing == Pacing::TimerDriven {
            let now = self.clock.now();
            if now.saturating_sub(self.last_cycle) < self.cycle_interval {
                return Ok(Opportunity::default());
            }
            self.last_cycle = now;
        }

        let outcome = self.run_cycle(session);
        if let Err(cycle_error) = &outcome {
            if cycle_error.is_session_fatal() {
                error!("aborting session: {cycle_error}");
                self.stop();
            }
        }
        outcome
    }

    fn run_cycle<G: Guest>(&mut self, session: &mut Session<G>) -> Result<Opportunity, BridgeError> {
        session.tick()?;
        self.stats.ticks += 1;
        check_fault(session.guest_mut())?;

        let mut outcome = Opportunity {
            ticked: true,
            repainted: false,
        };
        if !session.draw_flag()? {
            return Ok(outcome);
        }

        match self.protocol {
            DisplayProtocol::Bulk => {
                let grid = session.decode_framebuffer()?;
                let host = session.guest_mut().host_mut();
                match host.screen_mut().paint_full(&grid) {
                    Ok(()) => outcome.repainted = true,
                    // The surface keeps its last valid frame.
                    Err(paint_error) => host.report(paint_error),
                }
            }
            DisplayProtocol::Incremental => {
                // Pixels pushed during `tick` are already on the surface.
                session.render()?;
                check_fault(session.guest_mut())?;
                outcome.repainted = true;
            }
        }

        if outcome.repainted {
            self.stats.repaints += 1;
        }
        Ok(outcome)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    pub fn cycle_interval(&self) -> Duration {
        self.cycle_interval
    }
}
