//! Driver-level errors: configuration and I/O failures that have no
//! `SourceLocation` of their own, plus the pipeline errors they wrap.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed AWST input in {path}: {source}")]
    MalformedAwst {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed template-variable file {path}: {detail}")]
    MalformedTemplateFile { path: String, detail: String },

    #[error("malformed --template-var {0:?}, expected NAME=VALUE")]
    MalformedTemplateArg(String),

    #[error("invalid optimization level {0}, expected 0, 1, or 2")]
    InvalidOptimizationLevel(u8),

    #[error("no function named \"main\" and no entry given")]
    NoMain,

    #[error("compile failed: {0}")]
    DiagnosticsFailed(String),

    #[error(transparent)]
    Ir(#[from] avm_ir::IrError),

    #[error(transparent)]
    Codegen(#[from] avm_codegen::CodegenError),
}
