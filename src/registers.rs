use {std::fmt, tracing::debug};

pub const POOL_SIZE: usize = 8;
pub const ARG_REGISTER_COUNT: usize = 4;

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum Register {
    Temp(u8),
    Saved(u8),
    Arg(u8),
    V0,
    Sp,
    Fp,
    Gp,
    Ra,
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Register::Temp(n) => write!(f, "$t{}", n),
            Register::Saved(n) => write!(f, "$s{}", n),
            Register::Arg(n) => write!(f, "$a{}", n),
            Register::V0 => write!(f, "$v0"),
            Register::Sp => write!(f, "$sp"),
            Register::Fp => write!(f, "$fp"),
            Register::Gp => write!(f, "$gp"),
            Register::Ra => write!(f, "$ra"),
        }
    }
}

#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum PoolKind {
    Temporary,
    Local,
}

impl PoolKind {
    fn register(&self, index: usize) -> Register {
        match self {
            PoolKind::Temporary => Register::Temp(index as u8),
            PoolKind::Local => Register::Saved(index as u8),
        }
    }

    fn index_of(&self, reg: Register) -> Option<usize> {
        match (self, reg) {
            (PoolKind::Temporary, Register::Temp(n)) | (PoolKind::Local, Register::Saved(n))
                if (n as usize) < POOL_SIZE =>
            {
                Some(n as usize)
            }
            _ => None,
        }
    }
}

/// Runtime stack traffic the caller has to emit to keep a register's older values safe.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum StackTraffic {
    /// Push the register's current value before handing it out again.
    Spill(Register),

    /// Pop the register's previous value back into it.
    Restore(Register),
}

#[derive(Clone, Copy, Debug, Default)]
struct Slot {
    in_use: bool,

    /// Values of this register currently parked on the runtime stack.
    spilled: usize,
}

/// A fixed set of registers, each one backed by its own stack of spilled values.
#[derive(Debug)]
pub struct RegisterPool {
    kind: PoolKind,
    slots: [Slot; POOL_SIZE],
}

impl RegisterPool {
    pub fn new(kind: PoolKind) -> RegisterPool {
        RegisterPool {
            kind,
            slots: [Slot::default(); POOL_SIZE],
        }
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn acquire(&mut self) -> (Register, Option<StackTraffic>) {
        if let Some(index) = self.slots.iter().position(|slot| !slot.in_use) {
            self.slots[index].in_use = true;
            return (self.kind.register(index), None);
        }

        // Everything is taken. Evict whichever register has been evicted the fewest times so far.
        let mut victim = 0;
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.spilled < self.slots[victim].spilled {
                victim = index;
            }
        }

        self.slots[victim].spilled += 1;
        let reg = self.kind.register(victim);
        debug!(%reg, depth = self.slots[victim].spilled, "spill");
        (reg, Some(StackTraffic::Spill(reg)))
    }

    pub fn release(&mut self, reg: Register) -> Option<StackTraffic> {
        let slot = &mut self.slots[self.kind.index_of(reg)?];

        if slot.spilled > 0 {
            slot.spilled -= 1;
            debug!(%reg, depth = slot.spilled, "restore");
            Some(StackTraffic::Restore(reg))
        } else {
            slot.in_use = false;
            None
        }
    }

    pub fn in_use_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use).count()
    }

    pub fn spill_depth(&self, reg: Register) -> usize {
        self.kind.index_of(reg).map_or(0, |index| self.slots[index].spilled)
    }

    /// Forgets all assignments. Only valid once no values are parked on the stack.
    pub fn reset(&mut self) {
        debug_assert!(self.slots.iter().all(|slot| slot.spilled == 0));
        self.slots = [Slot::default(); POOL_SIZE];
    }
}
