#![no_main]

use libfuzzer_sys::fuzz_target;

use bytevm::bytecode::{assemble, disassemble};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    // Both parsing and listing must reject bad input without panicking
    if let Ok(code) = assemble(source) {
        let _ = disassemble(&code);
    }
});
