#![no_main]

use libfuzzer_sys::fuzz_target;

use bytevm::{Vm, VmConfig};

fuzz_target!(|data: &[u8]| {
    // Interpret the input as little-endian bytecode words
    let code: Vec<i32> = data
        .chunks_exact(4)
        .map(|w| i32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .collect();

    let config = VmConfig::default()
        .with_heap_size(4096)
        .with_instruction_budget(Some(10_000));
    let Ok(mut vm) = Vm::new(config) else {
        return;
    };
    vm.load(code);
    for value in [3, -1, 0] {
        vm.provide_input(value);
    }
    vm.set_pause_on_exception(true);
    if let Some(addr) = data.first() {
        vm.set_breakpoint(*addr as usize);
    }

    // Errors are expected; panics are not
    let mut outcome = vm.run(false);
    let mut resumes = 0;
    while let Ok(step) = &outcome {
        if !step.is_paused() || resumes > 64 {
            break;
        }
        let _ = vm.evaluate_watches();
        let _ = vm.stack_trace();
        outcome = vm.step_over();
        resumes += 1;
    }
});
