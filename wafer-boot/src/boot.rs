// SPDX-License-Identifier: MIT
// Copyright (c) 2026 ADNT Sarl <info@adnt.io>

//! Hand-off to the application: vector-table checks, peripheral quiesce,
//! and the jump itself.

use wafer_common::handoff::VectorTable;

use crate::layout::MemoryLayout;

/// Read the first two vector-table words at `addr`.
fn read_vector_table(addr: u32) -> VectorTable {
    unsafe {
        VectorTable {
            initial_sp: (addr as *const u32).read_volatile(),
            reset_vector: (addr as *const u32).offset(1).read_volatile(),
        }
    }
}

/// The resident application's vector table, if there is one worth
/// jumping to. An erased or half-written region fails this check.
pub fn resident_image(layout: &MemoryLayout) -> Option<VectorTable> {
    let table = read_vector_table(layout.app_start);
    if table.is_plausible(layout.ram, layout.app_flash()) {
        Some(table)
    } else {
        None
    }
}

/// Jump to the application if the region holds a plausible image,
/// otherwise halt. Never returns either way.
pub fn run_handoff(layout: &MemoryLayout) -> ! {
    match resident_image(layout) {
        Some(table) => {
            defmt::println!(
                "Jumping to application at 0x{:08x} (sp=0x{:08x})",
                layout.app_start,
                table.initial_sp
            );
            unsafe { jump(layout.app_start, table) }
        }
        None => {
            defmt::println!("No bootable application image, halting");
            halt()
        }
    }
}

/// Dead end for the unbootable cases: geometry fault, or a failed update
/// with no valid resident image. Interrupts stay off; only a reset (and
/// a fresh card) gets the device out of here.
pub fn halt() -> ! {
    cortex_m::interrupt::disable();
    loop {
        cortex_m::asm::wfi();
    }
}

/// # Safety
/// `vector_base` must hold the application's vector table; `table` must
/// have passed the plausibility check.
unsafe fn jump(vector_base: u32, table: VectorTable) -> ! {
    prepare_for_handoff();
    relocate_vector_table(vector_base);
    jump_to_application(table.initial_sp, table.reset_vector)
}

/// Quiesce everything the bootloader started so the application can
/// reinitialize its peripherals from a clean slate.
unsafe fn prepare_for_handoff() {
    // Disable all interrupts
    cortex_m::interrupt::disable();

    // Clear all pending interrupts in NVIC
    const NVIC_ICPR: *mut u32 = 0xE000_E280 as *mut u32;
    NVIC_ICPR.write_volatile(0xFFFF_FFFF);

    // Disable all NVIC interrupts
    const NVIC_ICER: *mut u32 = 0xE000_E180 as *mut u32;
    NVIC_ICER.write_volatile(0xFFFF_FFFF);
}

unsafe fn relocate_vector_table(vector_base: u32) {
    const SCB_VTOR: *mut u32 = 0xE000_ED08 as *mut u32;
    SCB_VTOR.write_volatile(vector_base);

    cortex_m::asm::dsb();
    cortex_m::asm::isb();
}

unsafe fn jump_to_application(initial_sp: u32, reset_vector: u32) -> ! {
    core::arch::asm!(
        "msr msp, {sp}",
        "cpsie i",  // Re-enable interrupts before jumping (application expects PRIMASK=0)
        "bx {reset}",
        sp = in(reg) initial_sp,
        reset = in(reg) reset_vector,
        options(noreturn)
    );
}
