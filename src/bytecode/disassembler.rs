//! Bytecode disassembler for debugging.

use std::fmt::Write;

use crate::bytecode::instruction::{lookup, read_operands, Definition};

/// Disassemble an instruction stream into human-readable output.
///
/// One instruction per line: a four-digit decimal offset, the mnemonic, and
/// the decoded operands separated by spaces:
///
/// ```text
/// 0000 OpAdd
/// 0001 OpConstant 2
/// 0004 OpConstant 65535
/// ```
pub fn disassemble(ins: &[u8]) -> String {
    let mut out = String::new();
    let mut offset = 0;

    while offset < ins.len() {
        let def = match lookup(ins[offset]) {
            Ok(def) => def,
            Err(err) => {
                writeln!(out, "ERROR: {}", err).unwrap();
                offset += 1;
                continue;
            }
        };

        let (operands, read) = read_operands(def, &ins[offset + 1..]);
        writeln!(out, "{:04} {}", offset, fmt_instruction(def, &operands)).unwrap();
        offset += 1 + read;
    }
    out
}

fn fmt_instruction(def: &Definition, operands: &[usize]) -> String {
    let operand_count = def.operand_widths.len();
    if operands.len() != operand_count {
        return format!(
            "ERROR: operand len {} does not match defined {}\n",
            operands.len(),
            operand_count
        );
    }

    match operand_count {
        0 => def.name.to_string(),
        1 => format!("{} {}", def.name, operands[0]),
        2 => format!("{} {} {}", def.name, operands[0], operands[1]),
        _ => format!("ERROR: unhandled operand count for {}\n", def.name),
    }
}
