//! The typed-AST input boundary (AWST).
//!
//! This is the contract with the frontend (out of scope for this crate):
//! every expression node already carries a resolved type from the fixed
//! set named in the external interface. What's modeled here is the minimal
//! shape [`lower`](crate::lower) needs to drive SSA construction -- not a
//! full source-language AST.

use crate::error::SourceLocation;
use crate::value::{AType, Encoding};
use serde::{Deserialize, Serialize};

/// One of the frontend's fixed resolved types. Several map onto the same
/// VM primitive type (`bool`/`asset`/`application` onto `u64`;
/// `account`/`bigint` onto `bytes`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AwstType {
    U64,
    Bytes,
    Bool,
    Account,
    Asset,
    Application,
    BigInt,
    Void,
    Tuple(Vec<AwstType>),
}

impl AwstType {
    /// Lowers to the VM primitive stack type. `Void` has none.
    pub fn atype(&self) -> Option<AType> {
        match self {
            AwstType::U64 | AwstType::Bool | AwstType::Asset | AwstType::Application => {
                Some(AType::U64)
            }
            AwstType::Bytes | AwstType::Account | AwstType::BigInt => Some(AType::Bytes),
            AwstType::Void | AwstType::Tuple(_) => None,
        }
    }
}

/// A typed expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AwstExpr {
    IntLiteral(u64, SourceLocation),
    BytesLiteral(Vec<u8>, Encoding, SourceLocation),
    Var(String, AwstType, SourceLocation),
    Intrinsic {
        op_code: String,
        args: Vec<AwstExpr>,
        result_type: AwstType,
        loc: SourceLocation,
    },
    Call {
        target: String,
        args: Vec<AwstExpr>,
        result_type: AwstType,
        loc: SourceLocation,
    },
}

impl AwstExpr {
    pub fn loc(&self) -> &SourceLocation {
        match self {
            AwstExpr::IntLiteral(_, loc) => loc,
            AwstExpr::BytesLiteral(_, _, loc) => loc,
            AwstExpr::Var(_, _, loc) => loc,
            AwstExpr::Intrinsic { loc, .. } => loc,
            AwstExpr::Call { loc, .. } => loc,
        }
    }

    pub fn result_type(&self) -> AwstType {
        match self {
            AwstExpr::IntLiteral(..) => AwstType::U64,
            AwstExpr::BytesLiteral(..) => AwstType::Bytes,
            AwstExpr::Var(_, t, _) => t.clone(),
            AwstExpr::Intrinsic { result_type, .. } => result_type.clone(),
            AwstExpr::Call { result_type, .. } => result_type.clone(),
        }
    }
}

/// A typed statement node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AwstStmt {
    Let {
        name: String,
        value: AwstExpr,
        loc: SourceLocation,
    },
    Assign {
        name: String,
        value: AwstExpr,
        loc: SourceLocation,
    },
    ExprStmt(AwstExpr),
    If {
        cond: AwstExpr,
        then_body: Vec<AwstStmt>,
        else_body: Vec<AwstStmt>,
        loc: SourceLocation,
    },
    While {
        cond: AwstExpr,
        body: Vec<AwstStmt>,
        loc: SourceLocation,
    },
    Return(Vec<AwstExpr>, SourceLocation),
}

/// A typed function, one-to-one with an output [`crate::Subroutine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwstFunction {
    pub name: String,
    pub params: Vec<(String, AwstType)>,
    pub return_types: Vec<AwstType>,
    pub body: Vec<AwstStmt>,
}
