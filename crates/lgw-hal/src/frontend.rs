//! Radio front-end seam
//!
//! `start` writes register images through a [`RadioFrontEnd`] and waits for
//! each PLL to lock. [`VirtualFrontEnd`] records what was written and can be
//! told to lock late or never.

use std::fmt;

use tracing::trace;

use crate::error::{HalError, Result};
use crate::regmath::{BoardRegisters, IfChainRegisters, RfChainRegisters};
use crate::types::{IF_CHAIN_NB, RF_CHAIN_NB};

/// Times a radio is reprogrammed before its PLL is declared dead
pub const PLL_LOCK_MAX_ATTEMPTS: u32 = 5;

/// Something registers can be written to
pub trait RadioFrontEnd: fmt::Debug + Send {
    /// Program the board-wide modem settings
    fn program_board(&mut self, regs: &BoardRegisters) -> Result<()>;

    /// Program one radio; each call is one PLL lock attempt
    fn program_rf_chain(&mut self, rf_chain: u8, regs: &RfChainRegisters) -> Result<()>;

    /// Program one demodulator path
    fn program_if_chain(&mut self, if_chain: u8, regs: &IfChainRegisters) -> Result<()>;

    /// Whether the PLL of a radio reports lock
    fn pll_locked(&mut self, rf_chain: u8) -> bool;

    /// Power everything down and forget programmed state
    fn reset(&mut self);
}

/// Register images in effect while running
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgrammedRegisters {
    pub board: Option<BoardRegisters>,
    pub rf_chains: [Option<RfChainRegisters>; RF_CHAIN_NB],
    pub if_chains: [Option<IfChainRegisters>; IF_CHAIN_NB],
}

/// PLL behavior of a virtual radio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PllBehavior {
    /// Locks on the first attempt
    #[default]
    Locks,
    /// Locks on the given attempt (1-based)
    LocksAfter(u32),
    /// Never locks
    NeverLocks,
}

/// In-memory front-end
#[derive(Debug, Clone, Default)]
pub struct VirtualFrontEnd {
    pll: [PllBehavior; RF_CHAIN_NB],
    attempts: [u32; RF_CHAIN_NB],
    regs: ProgrammedRegisters,
}

impl VirtualFrontEnd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the PLL behavior of one radio
    pub fn with_pll(mut self, rf_chain: u8, behavior: PllBehavior) -> Self {
        if let Some(slot) = self.pll.get_mut(rf_chain as usize) {
            *slot = behavior;
        }
        self
    }

    /// Register images written so far
    pub fn registers(&self) -> &ProgrammedRegisters {
        &self.regs
    }

    /// Programming attempts on a radio since the last reset
    pub fn attempts(&self, rf_chain: u8) -> u32 {
        self.attempts.get(rf_chain as usize).copied().unwrap_or(0)
    }
}

fn out_of_range(what: &str, chain: u8) -> HalError {
    HalError::HardwareFault(format!("no {what} chain {chain} on this board"))
}

impl RadioFrontEnd for VirtualFrontEnd {
    fn program_board(&mut self, regs: &BoardRegisters) -> Result<()> {
        self.regs.board = Some(*regs);
        trace!("board programmed: LoRa sync word 0x{:02X}", regs.lora_sync_word);
        Ok(())
    }

    fn program_rf_chain(&mut self, rf_chain: u8, regs: &RfChainRegisters) -> Result<()> {
        let idx = rf_chain as usize;
        let slot = self
            .regs
            .rf_chains
            .get_mut(idx)
            .ok_or_else(|| out_of_range("RF", rf_chain))?;
        *slot = Some(*regs);
        self.attempts[idx] += 1;
        trace!(
            "radio {} programmed: freq 0x{:02X}{:02X}{:02X} (attempt {})",
            rf_chain,
            regs.freq_msb,
            regs.freq_mid,
            regs.freq_lsb,
            self.attempts[idx]
        );
        Ok(())
    }

    fn program_if_chain(&mut self, if_chain: u8, regs: &IfChainRegisters) -> Result<()> {
        let slot = self
            .regs
            .if_chains
            .get_mut(if_chain as usize)
            .ok_or_else(|| out_of_range("IF", if_chain))?;
        *slot = Some(*regs);
        trace!("IF{} programmed: offset reg {}", if_chain, regs.freq_reg);
        Ok(())
    }

    fn pll_locked(&mut self, rf_chain: u8) -> bool {
        let idx = rf_chain as usize;
        if idx >= RF_CHAIN_NB || self.regs.rf_chains[idx].is_none() {
            return false;
        }
        match self.pll[idx] {
            PllBehavior::Locks => true,
            PllBehavior::LocksAfter(n) => self.attempts[idx] >= n,
            PllBehavior::NeverLocks => false,
        }
    }

    fn reset(&mut self) {
        self.regs = ProgrammedRegisters::default();
        self.attempts = [0; RF_CHAIN_NB];
    }
}
