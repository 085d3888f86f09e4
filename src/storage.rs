use {
    crate::{ast::VarType, symtab::Shape},
    std::convert::TryFrom,
    tracing::debug,
};

pub const INT_SIZE: i32 = 4;
pub const CHAR_SIZE: i32 = 1;
pub const POINTER_SIZE: i32 = 4;
pub const WORD_ALIGNMENT: i32 = 4;
pub const MAX_PARAMS: usize = 4;

/// $ra, $fp and $s0-$s7, saved by every function prologue.
pub const SAVED_REGISTER_BYTES: i32 = 40;

/// $t0-$t7 and $a0-$a3, saved around every call.
pub const CALL_SAVE_BYTES: i32 = 48;

/// Upper bound on the locals of one function. Spills and call saves go on top.
pub const MAX_FRAME_BYTES: i32 = i32::MAX / 2;

pub fn pad_to_alignment(num: i32, align: i32) -> i32 {
    ((num + align - 1) / align) * align
}

fn checked_pad(num: i32) -> Option<i32> {
    num.checked_add(WORD_ALIGNMENT - 1)
        .map(|padded| padded / WORD_ALIGNMENT * WORD_ALIGNMENT)
}

fn array_bytes(var_type: VarType, dimension: u32) -> Option<i32> {
    var_type.size().checked_mul(i32::try_from(dimension).ok()?)
}

/// Where a local ended up and how far the stack pointer has to move to make room for it.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Allocation {
    pub offset: i32,
    pub bytes: i32,
}

/// Hands out storage offsets. Globals grow up from $gp. Parameters and locals grow down
/// from $fp, which sits where the stack pointer was when the function was entered.
///
/// Allocations that would not fit come back as `None`.
#[derive(Debug, Default)]
pub struct StorageAllocator {
    global_offset: i32,

    /// Lowest offset from $fp handed out so far in the current function.
    frame_offset: i32,

    /// Bytes between $fp and $sp, i.e. $sp == $fp - stack_offset at runtime.
    stack_offset: i32,

    param_bytes: i32,
}

impl StorageAllocator {
    pub fn new() -> StorageAllocator {
        StorageAllocator::default()
    }

    pub fn global_offset(&self) -> i32 {
        self.global_offset
    }

    pub fn frame_offset(&self) -> i32 {
        self.frame_offset
    }

    pub fn stack_offset(&self) -> i32 {
        self.stack_offset
    }

    pub fn param_bytes(&self) -> i32 {
        self.param_bytes
    }

    pub fn allocate_global(&mut self, var_type: VarType, shape: Shape) -> Option<i32> {
        let (offset, size) = match shape {
            Shape::Scalar if var_type == VarType::Char => (self.global_offset, CHAR_SIZE),
            Shape::Scalar | Shape::ArrayParam => (checked_pad(self.global_offset)?, INT_SIZE),
            Shape::Array(dimension) => {
                (checked_pad(self.global_offset)?, array_bytes(var_type, dimension)?)
            }
        };

        self.global_offset = offset.checked_add(size)?;
        debug!(offset, total = self.global_offset, "global");
        Some(offset)
    }

    pub fn begin_function(&mut self) {
        self.frame_offset = 0;
        self.stack_offset = 0;
        self.param_bytes = 0;
    }

    fn align_frame(&mut self) {
        self.frame_offset = -pad_to_alignment(-self.frame_offset, WORD_ALIGNMENT);
    }

    /// Parameter slots sit just below $fp in declaration order. Callers enforce the
    /// parameter limit.
    pub fn allocate_param(&mut self, var_type: VarType, is_array: bool) -> i32 {
        let size = if is_array { POINTER_SIZE } else { var_type.size() };
        if size == WORD_ALIGNMENT {
            self.align_frame();
        }

        self.frame_offset -= size;
        debug!(offset = self.frame_offset, "param");
        self.frame_offset
    }

    /// Rounds the parameter area up to a whole number of words and returns its size.
    pub fn finish_params(&mut self) -> i32 {
        self.align_frame();
        self.param_bytes = -self.frame_offset;
        self.param_bytes
    }

    /// After the prologue, $sp sits below the parameter area and the saved registers.
    pub fn enter_body(&mut self) {
        self.stack_offset = self.param_bytes + SAVED_REGISTER_BYTES;
        self.frame_offset = -self.stack_offset;
    }

    /// Lines the next local up with the current stack pointer. Returns the frame offset to
    /// restore at block exit.
    pub fn enter_block(&mut self) -> i32 {
        self.frame_offset = -self.stack_offset;
        self.frame_offset
    }

    pub fn allocate_local(&mut self, var_type: VarType, shape: Shape) -> Option<Allocation> {
        let start = self.frame_offset;

        // The frame stays under MAX_FRAME_BYTES, so aligning it cannot overflow.
        let word_aligned = -pad_to_alignment(-start, WORD_ALIGNMENT);
        let (aligned, size) = match shape {
            Shape::Scalar if var_type == VarType::Char => (start, CHAR_SIZE),
            Shape::Scalar | Shape::ArrayParam => (word_aligned, INT_SIZE),
            Shape::Array(dimension) => (word_aligned, array_bytes(var_type, dimension)?),
        };

        let offset = aligned.checked_sub(size)?;
        let bytes = start - offset;
        let stack_offset = self.stack_offset.checked_add(bytes)?;
        if stack_offset > MAX_FRAME_BYTES {
            return None;
        }

        self.frame_offset = offset;
        self.stack_offset = stack_offset;
        debug!(offset, bytes, "local");
        Some(Allocation { offset, bytes })
    }

    /// Restores word alignment after a run of locals. Returns how many bytes of padding were
    /// added.
    pub fn pad_locals(&mut self) -> i32 {
        let start = self.frame_offset;
        self.align_frame();
        let bytes = start - self.frame_offset;
        self.stack_offset += bytes;
        bytes
    }

    pub fn push(&mut self, bytes: i32) {
        self.stack_offset += bytes;
    }

    pub fn pop(&mut self, bytes: i32) {
        self.stack_offset -= bytes;
    }

    /// How far $sp must move up to get back to where it was when a block with this entry
    /// offset began.
    pub fn unwind_distance(&self, entry_frame_offset: i32) -> i32 {
        self.stack_offset + entry_frame_offset
    }

    /// Leaves a block: everything it allocated is released. Returns the distance $sp moves
    /// up.
    pub fn exit_block(&mut self, entry_frame_offset: i32) -> i32 {
        let distance = self.unwind_distance(entry_frame_offset);
        self.stack_offset = -entry_frame_offset;
        self.frame_offset = entry_frame_offset;
        distance
    }
}
