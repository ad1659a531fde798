//! ARC4 contract metadata: the JSON sidecar written next to the assembled
//! TEAL/bytecode, describing a contract's method selectors and its
//! state-schema totals.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};

use avm_ir::StateTotals;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StateSchema {
    pub global_ints: u32,
    pub global_bytes: u32,
    pub local_ints: u32,
    pub local_bytes: u32,
}

impl From<StateTotals> for StateSchema {
    fn from(t: StateTotals) -> Self {
        StateSchema {
            global_ints: t.global_ints,
            global_bytes: t.global_bytes,
            local_ints: t.local_ints,
            local_bytes: t.local_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    pub signature: String,
    pub selector: Vec<u8>,
}

impl MethodSpec {
    pub fn new(signature: impl Into<String>) -> Self {
        let signature = signature.into();
        let name = signature.split('(').next().unwrap_or(&signature).to_string();
        let mut hasher = Sha512_256::new();
        hasher.update(signature.as_bytes());
        let digest = hasher.finalize();
        MethodSpec {
            name,
            signature,
            selector: digest[..4].to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractMetadata {
    pub name: String,
    pub methods: Vec<MethodSpec>,
    pub state_schema: StateSchema,
}
