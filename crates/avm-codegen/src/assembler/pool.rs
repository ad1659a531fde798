//! Constant-pool packing: every literal pushed two or more times across the
//! whole op stream moves into an `intcblock`/`bytecblock`, sorted by
//! descending frequency (ties broken by value, for determinism) and
//! truncated to 256 entries -- a single-byte index is all `intc`/`bytec`
//! ever need. Pushes that didn't make the pool stay as `pushint`/
//! `pushbytes`, optionally combined into one `pushints`/`pushbytess` per
//! run when the caller isn't trying to match algod's own bytecode layout.

use std::collections::HashMap;

use super::lower::AsmOp;

const MAX_POOL_SIZE: usize = 256;

pub fn pack_constants(ops: Vec<AsmOp>, match_algod_bytecode: bool) -> Vec<AsmOp> {
    let mut int_freq: HashMap<u64, usize> = HashMap::new();
    let mut bytes_freq: HashMap<Vec<u8>, usize> = HashMap::new();
    for op in &ops {
        match op {
            AsmOp::PushInt(v) => *int_freq.entry(*v).or_insert(0) += 1,
            AsmOp::PushBytes(b) => *bytes_freq.entry(b.clone()).or_insert(0) += 1,
            _ => {}
        }
    }

    let int_pool = select_pool(int_freq);
    let bytes_pool = select_pool(bytes_freq);

    let int_index: HashMap<u64, u8> = int_pool.iter().enumerate().map(|(i, v)| (*v, i as u8)).collect();
    let bytes_index: HashMap<Vec<u8>, u8> = bytes_pool.iter().enumerate().map(|(i, v)| (v.clone(), i as u8)).collect();

    let mut body = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            AsmOp::PushInt(v) => match int_index.get(&v) {
                Some(&idx) => body.push(AsmOp::Intc(idx)),
                None => body.push(AsmOp::PushInt(v)),
            },
            AsmOp::PushBytes(b) => match bytes_index.get(&b) {
                Some(&idx) => body.push(AsmOp::Bytec(idx)),
                None => body.push(AsmOp::PushBytes(b)),
            },
            other => body.push(other),
        }
    }

    if !match_algod_bytecode {
        body = combine_runs(body);
    }

    let mut out = Vec::new();
    if !int_pool.is_empty() {
        out.push(AsmOp::IntcBlock(int_pool));
    }
    if !bytes_pool.is_empty() {
        out.push(AsmOp::BytecBlock(bytes_pool));
    }
    out.extend(body);
    out
}

fn select_pool<K: Clone + Eq + std::hash::Hash + Ord>(freq: HashMap<K, usize>) -> Vec<K> {
    let mut entries: Vec<(K, usize)> = freq.into_iter().filter(|(_, n)| *n >= 2).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    entries.truncate(MAX_POOL_SIZE);
    entries.into_iter().map(|(k, _)| k).collect()
}

fn combine_runs(ops: Vec<AsmOp>) -> Vec<AsmOp> {
    let mut out = Vec::with_capacity(ops.len());
    let mut i = 0;
    while i < ops.len() {
        match &ops[i] {
            AsmOp::PushInt(_) => {
                let mut run = Vec::new();
                while let Some(AsmOp::PushInt(v)) = ops.get(i) {
                    run.push(*v);
                    i += 1;
                }
                if run.len() >= 2 {
                    out.push(AsmOp::PushInts(run));
                } else {
                    out.push(AsmOp::PushInt(run[0]));
                }
            }
            AsmOp::PushBytes(_) => {
                let mut run = Vec::new();
                while let Some(AsmOp::PushBytes(b)) = ops.get(i) {
                    run.push(b.clone());
                    i += 1;
                }
                if run.len() >= 2 {
                    out.push(AsmOp::PushBytess(run));
                } else {
                    out.push(AsmOp::PushBytes(run.into_iter().next().unwrap()));
                }
            }
            _ => {
                out.push(ops[i].clone());
                i += 1;
            }
        }
    }
    out
}
