//! A small load/store target for unit tests.
//!
//! Registers `r0`..`r7` each own one register unit; `w0` and `w2` are wide
//! registers over the pairs `r0:r1` and `r2:r3`. `fp` is the frame pointer
//! and `sp` the stack pointer.

use crate::machine::{InstrFlags, Reg, TargetBuilder, TargetInfo};

pub fn toy_target() -> TargetInfo {
    TargetBuilder::new("toy")
        .register("r0")
        .register("r1")
        .register("r2")
        .register("r3")
        .register("r4")
        .register("r5")
        .register("r6")
        .register("r7")
        .super_register("w0", &["r0", "r1"])
        .super_register("w2", &["r2", "r3"])
        .register("fp")
        .register("sp")
        .frame_pointer("fp")
        .stack_pointer("sp")
        .instruction("LI", InstrFlags::empty())
        .instruction("LA", InstrFlags::empty())
        .instruction("LG", InstrFlags::empty())
        .instruction("LDC", InstrFlags::MAY_LOAD | InstrFlags::INVARIANT_LOAD)
        .instruction("LD", InstrFlags::MAY_LOAD)
        .instruction("ST", InstrFlags::MAY_STORE)
        .instruction("ADD", InstrFlags::empty())
        .instruction("COPY", InstrFlags::empty())
        .instruction("CALL", InstrFlags::CALL)
        .instruction("BR", InstrFlags::TERMINATOR | InstrFlags::BRANCH)
        .instruction("RET", InstrFlags::TERMINATOR | InstrFlags::RETURN)
        .instruction("IMPLICIT_DEF", InstrFlags::IMPLICIT_DEF)
        .instruction("INLINEASM", InstrFlags::INLINE_ASM)
        .build()
        .unwrap()
}

pub fn reg(target: &TargetInfo, name: &str) -> Reg {
    target.register_named(name).unwrap()
}
