//! Intrinsic calls, subroutine invocations, φ-nodes, and assignments.

use crate::id::BlockId;
use crate::optable::OpTable;
use crate::value::{AType, Value};
use crate::IrError;
use serde::{Deserialize, Serialize};

/// An immediate operand to an intrinsic op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Immediate {
    U8(u8),
    I8(i8),
    U64(u64),
    Str(String),
}

/// `(op_code, immediates, args)`. Arity must match the op's signature in
/// the op table; may produce 0, 1, or many outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intrinsic {
    pub op_code: String,
    pub immediates: Vec<Immediate>,
    pub args: Vec<Value>,
}

impl Intrinsic {
    pub fn new(op_code: impl Into<String>, args: Vec<Value>) -> Self {
        Intrinsic {
            op_code: op_code.into(),
            immediates: Vec::new(),
            args,
        }
    }

    pub fn with_immediates(mut self, immediates: Vec<Immediate>) -> Self {
        self.immediates = immediates;
        self
    }

    /// Checks this call's arity and argument types against the op table.
    pub fn validate(&self) -> Result<Vec<AType>, IrError> {
        let sig = OpTable::lookup(&self.op_code)?;
        if sig.stack_inputs.len() != self.args.len() {
            return Err(IrError::ArityMismatch {
                op_code: self.op_code.clone(),
                expected: sig.stack_inputs.len(),
                found: self.args.len(),
            });
        }
        for (slot, arg) in sig.stack_inputs.iter().zip(self.args.iter()) {
            if !slot.accepts(arg.atype()) {
                return Err(IrError::TypeMismatch {
                    loc: crate::error::SourceLocation::unknown(),
                    expected: format!("{:?}", slot.allowed),
                    found: arg.atype().to_string(),
                });
            }
        }
        Ok(sig.stack_outputs.clone())
    }
}

/// A call to another subroutine in the same program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeSubroutine {
    pub target: String,
    pub args: Vec<Value>,
}

/// `r = φ(v_1 from P_1, …, v_k from P_k)`: one arg per predecessor, in a
/// fixed order matching the owning block's `predecessors` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phi {
    pub register: crate::value::Register,
    pub args: Vec<(BlockId, Value)>,
}

impl Phi {
    /// True if every operand is the same value, or every operand is either
    /// the phi's own result or one single other value -- a trivial phi that
    /// can be replaced by that value outright.
    pub fn trivial_value(&self) -> Option<Value> {
        let mut unique: Option<&Value> = None;
        for (_, v) in &self.args {
            if let Value::Register(r) = v {
                if r == &self.register {
                    continue;
                }
            }
            match unique {
                None => unique = Some(v),
                Some(u) if u == v => {}
                Some(_) => return None,
            }
        }
        unique.cloned()
    }
}

/// What an [`Assignment`]'s right-hand side can be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpSource {
    Intrinsic(Intrinsic),
    Invoke(InvokeSubroutine),
    Value(Value),
}

/// `targets := source`. `targets` may be empty for a statement-level
/// intrinsic/invoke whose result is discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub targets: Vec<crate::value::Register>,
    pub source: OpSource,
}

impl Assignment {
    pub fn single(target: crate::value::Register, source: OpSource) -> Self {
        Assignment {
            targets: vec![target],
            source,
        }
    }

    pub fn discard(source: OpSource) -> Self {
        Assignment {
            targets: Vec::new(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{AType, Encoding, Register};

    #[test]
    fn intrinsic_validate_ok() {
        let i = Intrinsic::new("concat", vec![
            Value::bytes_const(vec![1], Encoding::Unknown),
            Value::bytes_const(vec![2], Encoding::Unknown),
        ]);
        assert_eq!(i.validate().unwrap(), vec![AType::Bytes]);
    }

    #[test]
    fn intrinsic_validate_arity_mismatch() {
        let i = Intrinsic::new("concat", vec![Value::bytes_const(vec![1], Encoding::Unknown)]);
        assert!(matches!(i.validate(), Err(IrError::ArityMismatch { .. })));
    }

    #[test]
    fn intrinsic_validate_type_mismatch() {
        let i = Intrinsic::new("concat", vec![Value::u64_const(1), Value::u64_const(2)]);
        assert!(matches!(i.validate(), Err(IrError::TypeMismatch { .. })));
    }

    #[test]
    fn phi_trivial_value_detects_single_distinct_operand() {
        let r = Register::new("x", 3, AType::U64);
        let phi = Phi {
            register: r.clone(),
            args: vec![
                (BlockId(0), Value::u64_const(5)),
                (BlockId(1), Value::Register(r.clone())),
            ],
        };
        assert_eq!(phi.trivial_value(), Some(Value::u64_const(5)));
    }

    #[test]
    fn phi_trivial_value_none_when_multiple_distinct() {
        let r = Register::new("x", 3, AType::U64);
        let phi = Phi {
            register: r,
            args: vec![
                (BlockId(0), Value::u64_const(5)),
                (BlockId(1), Value::u64_const(6)),
            ],
        };
        assert_eq!(phi.trivial_value(), None);
    }

    #[test]
    fn assignment_discard_has_no_targets() {
        let a = Assignment::discard(OpSource::Intrinsic(Intrinsic::new("assert", vec![Value::u64_const(1)])));
        assert!(a.targets.is_empty());
    }
}
