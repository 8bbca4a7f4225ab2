//! The concentrator context
//!
//! One [`Concentrator`] owns the configuration, lifecycle state, RX FIFO and
//! TX slot of a virtual board. Handles are cheap to clone and share the same
//! board, so a receive loop and a transmit path can run on different tasks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::config::{BoardConfig, ConfigStore, IfChainConfig, RfChainConfig, TxGainEntry};
use crate::error::{HalError, Result};
use crate::frontend::{ProgrammedRegisters, RadioFrontEnd, VirtualFrontEnd, PLL_LOCK_MAX_ATTEMPTS};
use crate::packet::{RxFrame, TxPacket};
use crate::regmath::{board_registers, if_chain_registers, rf_chain_registers};
use crate::rx::{RxBatch, RxPipeline};
use crate::state::ConcentratorState;
use crate::status::{self, StatusChannel, StatusCode};
use crate::time::{MonotonicClock, TimeSource, TriggerCounter};
use crate::tx::{ScheduledTx, TxPhase, TxScheduler};
use crate::types::{IF_CHAIN_NB, RF_CHAIN_NB};

#[derive(Debug)]
struct Inner {
    state: ConcentratorState,
    config: ConfigStore,
    clock: Arc<dyn TimeSource>,
    frontend: Box<dyn RadioFrontEnd>,
    counter: Option<TriggerCounter>,
    registers: ProgrammedRegisters,
    rx: RxPipeline,
    tx: TxScheduler,
}

impl Inner {
    /// Session time (µs since start), or the error a non-running board gives
    fn session_now(&self) -> Result<u64> {
        match (self.state, self.counter) {
            (ConcentratorState::Running, Some(counter)) => Ok(counter.elapsed_us(&*self.clock)),
            (ConcentratorState::Faulted, _) => Err(HalError::HardwareFault(
                "concentrator faulted during start, stop it first".into(),
            )),
            _ => Err(HalError::NotRunning),
        }
    }

    fn ensure_configurable(&self) -> Result<()> {
        if self.state.accepts_config() {
            Ok(())
        } else {
            warn!("configuration rejected while {}", self.state);
            Err(HalError::InvalidArgument(format!(
                "configuration is locked while {}",
                self.state
            )))
        }
    }

    /// Track Unconfigured/Configured after a setter succeeded
    fn refresh_config_state(&mut self) {
        if matches!(
            self.state,
            ConcentratorState::Unconfigured | ConcentratorState::Configured
        ) {
            self.state = if self.config.is_configured() {
                ConcentratorState::Configured
            } else {
                ConcentratorState::Unconfigured
            };
        }
    }

    fn program(&mut self) -> Result<ProgrammedRegisters> {
        let mut programmed = ProgrammedRegisters::default();

        let board = board_registers(self.config.board());
        self.frontend.program_board(&board)?;
        programmed.board = Some(board);

        let rf_chains: Vec<(u8, RfChainConfig)> =
            self.config.enabled_rf_chains().map(|(i, c)| (i, *c)).collect();
        for (chain, rf) in rf_chains {
            let regs = rf_chain_registers(&rf)?;
            let mut locked = false;
            for attempt in 1..=PLL_LOCK_MAX_ATTEMPTS {
                self.frontend.program_rf_chain(chain, &regs)?;
                if self.frontend.pll_locked(chain) {
                    debug!("radio {} PLL locked on attempt {}", chain, attempt);
                    locked = true;
                    break;
                }
                warn!("radio {} PLL not locked (attempt {})", chain, attempt);
            }
            if !locked {
                return Err(HalError::HardwareFault(format!(
                    "radio {chain} PLL failed to lock after {PLL_LOCK_MAX_ATTEMPTS} attempts"
                )));
            }
            programmed.rf_chains[chain as usize] = Some(regs);
        }

        let if_chains: Vec<(u8, IfChainConfig)> =
            self.config.enabled_if_chains().map(|(i, c)| (i, *c)).collect();
        for (chain, conf) in if_chains {
            let regs = if_chain_registers(&conf);
            self.frontend.program_if_chain(chain, &regs)?;
            programmed.if_chains[chain as usize] = Some(regs);
        }

        Ok(programmed)
    }
}

/// Shared handle to a virtual concentrator
#[derive(Debug, Clone)]
pub struct Concentrator {
    inner: Arc<Mutex<Inner>>,
}

impl Default for Concentrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Concentrator {
    /// Concentrator on the system clock with a virtual front-end
    pub fn new() -> Self {
        Self::with_parts(MonotonicClock::new(), VirtualFrontEnd::new())
    }

    /// Concentrator on a custom clock
    pub fn with_clock(clock: impl TimeSource + 'static) -> Self {
        Self::with_parts(clock, VirtualFrontEnd::new())
    }

    pub fn with_parts(
        clock: impl TimeSource + 'static,
        frontend: impl RadioFrontEnd + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: ConcentratorState::Unconfigured,
                config: ConfigStore::new(),
                clock: Arc::new(clock),
                frontend: Box::new(frontend),
                counter: None,
                registers: ProgrammedRegisters::default(),
                rx: RxPipeline::new(),
                tx: TxScheduler::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ==================== Configuration ====================

    pub fn set_board_config(&self, conf: BoardConfig) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_configurable()?;
        inner.config.set_board_config(conf)?;
        inner.refresh_config_state();
        Ok(())
    }

    pub fn set_rf_chain_config(&self, chain: u8, conf: RfChainConfig) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_configurable()?;
        inner.config.set_rf_chain_config(chain, conf)?;
        inner.refresh_config_state();
        Ok(())
    }

    pub fn set_if_chain_config(&self, chain: u8, conf: IfChainConfig) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_configurable()?;
        inner.config.set_if_chain_config(chain, conf)?;
        inner.refresh_config_state();
        Ok(())
    }

    pub fn set_tx_gain_lut(&self, entries: &[TxGainEntry]) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_configurable()?;
        inner.config.set_tx_gain_lut(entries)
    }

    /// Apply a whole configuration; stops at the first rejected setting
    pub fn apply_config(&self, config: &ConfigStore) -> Result<()> {
        let mut inner = self.lock();
        inner.ensure_configurable()?;
        let mut next = inner.config.clone();
        next.set_board_config(*config.board())?;
        for (chain, rf) in config.enabled_rf_chains() {
            next.set_rf_chain_config(chain, *rf)?;
        }
        for chain in 0..IF_CHAIN_NB as u8 {
            if let Some(conf) = config.if_chain(chain) {
                next.set_if_chain_config(chain, *conf)?;
            }
        }
        for chain in 0..RF_CHAIN_NB as u8 {
            if let Some(rf) = config.rf_chain(chain).filter(|rf| !rf.enable) {
                next.set_rf_chain_config(chain, *rf)?;
            }
        }
        next.set_tx_gain_lut(config.tx_gain_lut().entries())?;
        inner.config = next;
        inner.refresh_config_state();
        Ok(())
    }

    // ==================== Lifecycle ====================

    /// Program the radios and start the trigger counter
    pub fn start(&self) -> Result<()> {
        let mut inner = self.lock();
        match inner.state {
            ConcentratorState::Running => return Err(HalError::AlreadyRunning),
            ConcentratorState::Faulted => {
                return Err(HalError::HardwareFault(
                    "concentrator faulted, stop it before restarting".into(),
                ))
            }
            _ => {}
        }
        if !inner.config.is_configured() {
            error!("start refused: no enabled RF chain or IF chain");
            return Err(HalError::NotConfigured(
                "at least one RF chain and one IF chain must be enabled".into(),
            ));
        }
        let clksrc = inner.config.board().clksrc;
        let clk_enabled = inner
            .config
            .rf_chain(clksrc)
            .map(|rf| rf.enable)
            .unwrap_or(false);
        if !clk_enabled {
            error!("start refused: clock source radio {} is disabled", clksrc);
            return Err(HalError::NotConfigured(format!(
                "clock source radio {clksrc} is not enabled"
            )));
        }

        inner.frontend.reset();
        let programmed = match inner.program() {
            Ok(programmed) => programmed,
            Err(e) => {
                error!("start failed: {}", e);
                inner.state = ConcentratorState::Faulted;
                return Err(e);
            }
        };

        inner.registers = programmed;
        inner.counter = Some(TriggerCounter::start(&*inner.clock));
        inner.rx.clear();
        inner.tx.abort();
        inner.state = ConcentratorState::Running;
        info!(
            "concentrator started: {} RF chain(s), {} IF chain(s)",
            inner.config.enabled_rf_chains().count(),
            inner.config.enabled_if_chains().count()
        );
        Ok(())
    }

    /// Stop the board; the configuration is kept
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.lock();
        if !inner.state.is_stoppable() {
            return Err(HalError::NotRunning);
        }
        if let Some(tx) = inner.tx.abort() {
            warn!("stop: dropping TX scheduled at count {}", tx.start_count_us);
        }
        let pending = inner.rx.len();
        if pending > 0 {
            debug!("stop: discarding {} unread RX packet(s)", pending);
        }
        inner.rx.clear();
        inner.frontend.reset();
        inner.registers = ProgrammedRegisters::default();
        inner.counter = None;
        inner.state = ConcentratorState::Stopped;
        info!("concentrator stopped");
        Ok(())
    }

    // ==================== Radio ====================

    /// Fetch up to `max` received packets, oldest first
    ///
    /// Empty when nothing is pending or the board is not running.
    pub fn receive(&self, max: u8) -> RxBatch {
        let mut inner = self.lock();
        if !inner.state.is_running() {
            return RxBatch::empty();
        }
        inner.rx.drain(max)
    }

    /// Schedule a packet for transmission
    ///
    /// Returns the trigger counter value at which it goes on air.
    pub fn send(&self, packet: TxPacket) -> Result<u32> {
        let mut inner = self.lock();
        let now = inner.session_now()?;
        let Inner { config, tx, .. } = &mut *inner;
        let scheduled = tx.submit(packet, config, now)?;
        Ok(scheduled.start_count_us)
    }

    /// Query RX or TX status
    pub fn status(&self, channel: StatusChannel) -> StatusCode {
        let mut inner = self.lock();
        let phase = match inner.session_now() {
            Ok(now) => inner.tx.phase(now),
            Err(_) => TxPhase::Free,
        };
        status::report(channel, inner.state, phase, inner.config.board().full_duplex)
    }

    /// Drop the scheduled or emitting packet, if any
    pub fn abort_tx(&self) -> Result<()> {
        let mut inner = self.lock();
        if !inner.state.is_stoppable() {
            return Err(HalError::NotRunning);
        }
        if let Some(tx) = inner.tx.abort() {
            info!("TX at count {} aborted", tx.start_count_us);
        }
        Ok(())
    }

    /// Current value of the 32-bit µs trigger counter
    pub fn trigger_count(&self) -> Result<u32> {
        self.lock().session_now().map(|elapsed| elapsed as u32)
    }

    /// Feed a demodulated frame into the RX pipeline
    ///
    /// Returns whether the frame was queued; dropped frames are counted in
    /// [`Concentrator::rx_dropped`].
    pub fn inject(&self, frame: RxFrame) -> Result<bool> {
        let mut inner = self.lock();
        let now = inner.session_now()?;
        let emitting = inner.tx.phase(now) == TxPhase::Emitting;
        let count_us = now as u32;
        let Inner { config, rx, .. } = &mut *inner;
        let suspended = emitting && !config.board().full_duplex;
        rx.ingest(frame, config, count_us, suspended)
    }

    // ==================== Inspection ====================

    pub fn state(&self) -> ConcentratorState {
        self.lock().state
    }

    /// Snapshot of the configuration
    pub fn config(&self) -> ConfigStore {
        self.lock().config.clone()
    }

    /// Register images programmed by the last successful start
    pub fn registers(&self) -> ProgrammedRegisters {
        self.lock().registers
    }

    /// Packet currently in the TX slot
    pub fn tx_in_flight(&self) -> Option<ScheduledTx> {
        let mut inner = self.lock();
        if let Ok(now) = inner.session_now() {
            inner.tx.phase(now);
        }
        inner.tx.in_flight().cloned()
    }

    /// Frames dropped by the RX pipeline since creation
    pub fn rx_dropped(&self) -> u64 {
        self.lock().rx.dropped()
    }

    /// Packets waiting to be received
    pub fn rx_pending(&self) -> usize {
        self.lock().rx.len()
    }
}
