//! Assembly: pseudo-op lowering, constant-pool packing, and label/offset
//! resolution, composed into one [`assemble`] entry point.

pub mod layout;
pub mod lower;
pub mod pool;

use std::collections::HashMap;

use crate::error::CodegenError;
use crate::mir::MirProgram;
use crate::template::TemplateValue;

#[derive(Debug, Clone, Copy, Default)]
pub struct AssemblerConfig {
    pub match_algod_bytecode: bool,
}

#[derive(Debug, Clone)]
pub struct AssembledProgram {
    pub bytecode: Vec<u8>,
    pub label_positions: HashMap<String, u32>,
}

pub fn assemble(
    program: &MirProgram,
    template_vars: &HashMap<String, TemplateValue>,
    compiled_refs: &HashMap<(String, String), Vec<u8>>,
    config: AssemblerConfig,
) -> Result<AssembledProgram, CodegenError> {
    let lowered = lower::lower_mir_program(program, template_vars, compiled_refs)?;
    let packed = pool::pack_constants(lowered, config.match_algod_bytecode);
    let label_positions = layout::compute_label_positions(&packed)?;
    let bytecode = layout::encode(&packed, &label_positions)?;
    Ok(AssembledProgram { bytecode, label_positions })
}
