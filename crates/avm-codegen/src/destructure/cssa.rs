//! Conversion to conventional SSA: for every phi argument, append a copy
//! into a fresh, edge-local temporary at the end of the contributing
//! predecessor block, then rewrite the phi to reference that temporary
//! instead of the original value. Every value a phi ever sees is, after
//! this pass, live nowhere else -- which is exactly what lets
//! `destructure::coalesce` merge a phi's congruence class without running
//! a general interference check.

use avm_ir::{Assignment, BlockId, OpSource, Register, Subroutine};

/// Marker infix tagging CSSA-introduced edge temporaries, so
/// `coalesce::coalesce_locals` can recognize which copies are safe to fold
/// without consulting a liveness-based interference graph.
pub(crate) const EDGE_TEMP_MARKER: &str = "phi_edge";

pub fn convert_to_cssa(sub: &Subroutine) -> Subroutine {
    let mut out = sub.clone();
    for i in 0..out.body.len() {
        if out.body[i].phis.is_empty() {
            continue;
        }
        let mut phis = out.body[i].phis.clone();
        for phi in &mut phis {
            for (pred, value) in &mut phi.args {
                let temp = Register::new(
                    format!("{}__{}_{}", phi.register.local_id, EDGE_TEMP_MARKER, pred.0),
                    phi.register.version,
                    phi.register.atype,
                );
                let copy = Assignment::single(temp.clone(), OpSource::Value(value.clone()));
                append_before_terminator(&mut out, *pred, copy);
                *value = avm_ir::Value::Register(temp);
            }
        }
        out.body[i].phis = phis;
    }
    out
}

fn append_before_terminator(sub: &mut Subroutine, block: BlockId, assignment: Assignment) {
    if let Some(b) = sub.block_mut(block) {
        b.ops.push(assignment);
    }
}
