use super::*;
use crate::types::hash::Hash;
use crate::utils::test_utils::utils::{ModuleBuilder, function, random_hash};
use crate::virtual_machine::module::{FunctionBody, ValueKind};
use crate::virtual_machine::parser::OpcodePolicy;
use crate::virtual_machine::resolver::CodeRegistry;
use crate::virtual_machine::storage::StorageDiff;
use super::gas::GasCategory;

use ValueKind::{F32, F64, I32, I64};

const CONTEXT: &ExecContext = &ExecContext {
    timestamp: 1_700_000_000,
};

const F64_ONE: [u8; 8] = [0, 0, 0, 0, 0, 0, 0xf0, 0x3f];

fn contract(functions: Vec<FunctionId>) -> Contract {
    Contract::new(random_hash(), random_hash(), functions).with_gas(gas::DEFAULT_GAS_LIMIT)
}

/// Executes `function` on a fresh machine with no callable functions.
fn execute_on(machine: &mut Machine, function: Arc<Function>, args: &[Value]) -> Result<Execution, VMError> {
    let registry = CodeRegistry::new();
    let contract = contract(vec![]);
    let env = Env {
        resolver: &registry,
        contract: &contract,
        context: CONTEXT,
    };
    machine.execute(&env, function, args)
}

fn run(
    params: &[ValueKind],
    results: &[ValueKind],
    locals: &[ValueKind],
    code: &[u8],
    args: &[Value],
) -> Result<Execution, VMError> {
    let mut machine = Machine::new(MachineConfig::default());
    execute_on(&mut machine, function(params, results, locals, code), args)
}

fn run_i32(code: &[u8]) -> i32 {
    match &run(&[], &[I32], &[], code, &[]).unwrap().results[..] {
        [Value::I32(v)] => *v,
        other => panic!("unexpected results {other:?}"),
    }
}

fn run_i64(code: &[u8]) -> i64 {
    match &run(&[], &[I64], &[], code, &[]).unwrap().results[..] {
        [Value::I64(v)] => *v,
        other => panic!("unexpected results {other:?}"),
    }
}

/// Registry, contract and machine for a whole module.
struct Deployed {
    registry: CodeRegistry,
    contract: Contract,
    machine: Machine,
    ids: Vec<FunctionId>,
}

impl Deployed {
    fn new(bytes: &[u8]) -> Self {
        let module = Module::decode(bytes).unwrap();
        let mut registry = CodeRegistry::new();
        let ids = registry
            .register_module(&module, OpcodePolicy::Reject)
            .unwrap();
        let machine = Machine::instantiate(&module, MachineConfig::default()).unwrap();
        Self {
            registry,
            contract: contract(ids.clone()),
            machine,
            ids,
        }
    }

    fn call(&mut self, index: usize, params: Vec<Value>) -> Result<Execution, VMError> {
        let env = Env {
            resolver: &self.registry,
            contract: &self.contract,
            context: CONTEXT,
        };
        let payload = CallPayload::new(self.ids[index], params);
        self.machine.invoke(&env, &payload)
    }
}

// ==================== Scenarios ====================

#[test]
fn add_two_locals() {
    let add = [0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b];
    let exec = run(&[I32, I32], &[I32], &[], &add, &[Value::I32(1), Value::I32(1)]).unwrap();
    assert_eq!(exec.results, vec![Value::I32(2)]);

    let exec = run(
        &[I32, I32],
        &[I32],
        &[],
        &add,
        &[Value::I32(0x7fff_ffff), Value::I32(1)],
    )
    .unwrap();
    assert_eq!(exec.results, vec![Value::I32(0x8000_0000u32 as i32)]);
}

#[test]
fn br_if_skips_rest_of_block() {
    // block { i32.const <cond>; br_if 0; i32.const 7; local.set 0 } local.get 0
    let code = |cond: u8| {
        vec![
            0x02, 0x40, 0x41, cond, 0x0d, 0x00, 0x41, 0x07, 0x21, 0x00, 0x0b, 0x20, 0x00, 0x0b,
        ]
    };
    let mut machine = Machine::new(MachineConfig::default());
    let exec = execute_on(&mut machine, function(&[], &[I32], &[I32], &code(1)), &[]).unwrap();
    assert_eq!(exec.results, vec![Value::I32(0)]);
    assert!(machine.stack().is_empty());

    let exec = run(&[], &[I32], &[I32], &code(0), &[]).unwrap();
    assert_eq!(exec.results, vec![Value::I32(7)]);
}

#[test]
fn loop_sums_zero_to_nine() {
    #[rustfmt::skip]
    let code = [
        0x02, 0x40,                         // block
        0x03, 0x40,                         //   loop
        0x20, 0x00, 0x41, 0x0a, 0x4e,       //     i >= 10
        0x0d, 0x01,                         //     br_if 1
        0x20, 0x01, 0x20, 0x00, 0x6a, 0x21, 0x01, // sum += i
        0x20, 0x00, 0x41, 0x01, 0x6a, 0x21, 0x00, // i += 1
        0x0c, 0x00,                         //     br 0
        0x0b,                               //   end
        0x0b,                               // end
        0x20, 0x01,
        0x0b,
    ];
    let exec = run(&[], &[I32], &[I32, I32], &code, &[]).unwrap();
    assert_eq!(exec.results, vec![Value::I32(45)]);
}

#[test]
fn recursive_float_factorial() {
    let mut code = vec![0x20, 0x00, 0x44];
    code.extend_from_slice(&F64_ONE);
    code.extend_from_slice(&[0x65, 0x04, 0x7c, 0x44]); // f64.le; if (result f64)
    code.extend_from_slice(&F64_ONE);
    code.extend_from_slice(&[0x05, 0x20, 0x00, 0x20, 0x00, 0x44]);
    code.extend_from_slice(&F64_ONE);
    code.extend_from_slice(&[0xa1, 0x10, 0x00, 0xa2, 0x0b, 0x0b]); // sub; call 0; mul

    let bytes = ModuleBuilder::new()
        .function(&[F64], &[F64], &[], &code)
        .build();
    let mut deployed = Deployed::new(&bytes);
    let exec = deployed.call(0, vec![Value::F64(5.0)]).unwrap();
    assert_eq!(exec.results, vec![Value::F64(120.0)]);
    assert!(exec.profile.get(GasCategory::Call) >= 4 * gas::CALL);
}

#[test]
fn integer_loop_factorial() {
    #[rustfmt::skip]
    let code = [
        0x41, 0x01, 0x21, 0x01,             // acc = 1
        0x02, 0x40, 0x03, 0x40,
        0x20, 0x00, 0x45, 0x0d, 0x01,       // n == 0 => break
        0x20, 0x01, 0x20, 0x00, 0x6c, 0x21, 0x01, // acc *= n
        0x20, 0x00, 0x41, 0x01, 0x6b, 0x21, 0x00, // n -= 1
        0x0c, 0x00,
        0x0b, 0x0b,
        0x20, 0x01,
        0x0b,
    ];
    let exec = run(&[I32], &[I32], &[I32], &code, &[Value::I32(4)]).unwrap();
    assert_eq!(exec.results, vec![Value::I32(24)]);
}

#[test]
fn storage_writes_coalesce_across_calls() {
    // global.set with the slot taken from the stack
    let store = [0x20, 0x00, 0x20, 0x01, 0x24, 0x7f, 0x0b];
    let bytes = ModuleBuilder::new()
        .function(&[I32, I64], &[], &[], &store)
        .build();
    let mut deployed = Deployed::new(&bytes);

    for slot in 0..3 {
        deployed
            .call(0, vec![Value::I32(slot), Value::I64(100 + slot as i64)])
            .unwrap();
    }
    let diff = deployed.machine.storage().diff();
    assert_eq!(diff.len(), 1);
    assert_eq!(diff[0].offset, 0);
    assert_eq!(diff[0].bytes.len(), 3 * 8);
    assert_eq!(diff[0].bytes[8..16], 101u64.to_le_bytes());

    deployed
        .call(0, vec![Value::I32(5), Value::I64(-1)])
        .unwrap();
    let diff = deployed.machine.storage_mut().commit();
    assert_eq!(diff.len(), 2);
    assert_eq!(
        diff[1],
        StorageDiff {
            offset: 40,
            bytes: vec![0xff; 8]
        }
    );
    assert!(deployed.machine.storage().diff().is_empty());
}

// ==================== Gas ====================

#[test]
fn exact_gas_budget_succeeds() {
    // six operations costing BASE each; end is free
    let code = [0x41, 0x00, 0x41, 0x00, 0x41, 0x00, 0x1a, 0x1a, 0x1a, 0x0b];
    let registry = CodeRegistry::new();
    let contract = contract(vec![]).with_gas(6 * gas::BASE);
    let env = Env {
        resolver: &registry,
        contract: &contract,
        context: CONTEXT,
    };
    let mut machine = Machine::new(MachineConfig::default());
    let exec = machine
        .execute(&env, function(&[], &[], &[], &code), &[])
        .unwrap();
    assert_eq!(exec.gas_used, 6);
    assert_eq!(machine.gas_remaining(), 0);

    let short = contract.clone().with_gas(6 * gas::BASE - 1);
    let env = Env {
        contract: &short,
        ..env
    };
    assert_eq!(
        machine.execute(&env, function(&[], &[], &[], &code), &[]),
        Err(VMError::OutOfGas {
            needed: 1,
            remaining: 0
        })
    );
}

#[test]
fn gas_profile_by_category() {
    let exec = run(
        &[I32, I32],
        &[I32],
        &[],
        &[0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b],
        &[Value::I32(2), Value::I32(3)],
    )
    .unwrap();
    assert_eq!(exec.gas_used, 2 * gas::BASE + gas::VERY_LOW);
    assert_eq!(exec.profile.get(GasCategory::Variable), 2 * gas::BASE);
    assert_eq!(exec.profile.get(GasCategory::Numeric), gas::VERY_LOW);
    assert_eq!(exec.profile.total(), exec.gas_used);
}

#[test]
fn machine_gas_limit_caps_contract_gas() {
    let registry = CodeRegistry::new();
    let contract = contract(vec![]).with_gas(u64::MAX);
    let env = Env {
        resolver: &registry,
        contract: &contract,
        context: CONTEXT,
    };
    let mut machine = Machine::new(MachineConfig::default().with_gas_limit(50));
    let infinite = function(&[], &[], &[], &[0x03, 0x40, 0x0c, 0x00, 0x0b, 0x0b]);
    assert!(matches!(
        machine.execute(&env, infinite, &[]),
        Err(VMError::OutOfGas { .. })
    ));
    assert_eq!(machine.gas_remaining(), 0);
}

// ==================== Arithmetic ====================

#[test]
fn division_by_zero_faults() {
    let mut machine = Machine::new(MachineConfig::default());
    for op in [0x6d, 0x6e, 0x6f, 0x70] {
        let f = function(&[], &[I32], &[], &[0x41, 0x07, 0x41, 0x00, op, 0x0b]);
        assert_eq!(execute_on(&mut machine, f, &[]), Err(VMError::DivisionByZero));
        assert!(machine.stack().is_empty());
    }
    for op in [0x7f, 0x80, 0x81, 0x82] {
        let f = function(&[], &[I64], &[], &[0x42, 0x07, 0x42, 0x00, op, 0x0b]);
        assert_eq!(execute_on(&mut machine, f, &[]), Err(VMError::DivisionByZero));
        assert!(machine.stack().is_empty());
    }
}

#[test]
fn signed_overflow_division_wraps() {
    // i32::MIN / -1
    assert_eq!(
        run_i32(&[0x41, 0x80, 0x80, 0x80, 0x80, 0x78, 0x41, 0x7f, 0x6d, 0x0b]),
        i32::MIN
    );
    // -7 % 2
    assert_eq!(run_i32(&[0x41, 0x79, 0x41, 0x02, 0x6f, 0x0b]), -1);
}

#[test]
fn unsigned_comparisons_use_zero_extension() {
    // -1 >=u 1
    assert_eq!(run_i32(&[0x41, 0x7f, 0x41, 0x01, 0x4f, 0x0b]), 1);
    // -1 >=s 1
    assert_eq!(run_i32(&[0x41, 0x7f, 0x41, 0x01, 0x4e, 0x0b]), 0);
    // i64: -1 >u 1
    assert_eq!(run_i32(&[0x42, 0x7f, 0x42, 0x01, 0x56, 0x0b]), 1);
}

#[test]
fn shifts_and_rotates_mask_amount() {
    // 1 << 33 == 2
    assert_eq!(run_i32(&[0x41, 0x01, 0x41, 0x21, 0x74, 0x0b]), 2);
    // rotl(0x80000000, 1) == 1
    assert_eq!(
        run_i32(&[0x41, 0x80, 0x80, 0x80, 0x80, 0x78, 0x41, 0x01, 0x77, 0x0b]),
        1
    );
    // i64 -8 >>s 1 == -4
    assert_eq!(run_i64(&[0x42, 0x78, 0x42, 0x01, 0x87, 0x0b]), -4);
}

#[test]
fn float_nan_is_canonical() {
    // f32: 0 / 0
    let mut code = vec![0x43, 0, 0, 0, 0, 0x43, 0, 0, 0, 0, 0x95, 0x0b];
    let exec = run(&[], &[F32], &[], &code, &[]).unwrap();
    match &exec.results[..] {
        [Value::F32(v)] => assert_eq!(v.to_bits(), CANONICAL_NAN_F32),
        other => panic!("unexpected results {other:?}"),
    }

    // f64: sqrt(-1)
    code = vec![0x44, 0, 0, 0, 0, 0, 0, 0xf0, 0xbf, 0x9f, 0x0b];
    let exec = run(&[], &[F64], &[], &code, &[]).unwrap();
    match &exec.results[..] {
        [Value::F64(v)] => assert_eq!(v.to_bits(), CANONICAL_NAN_F64),
        other => panic!("unexpected results {other:?}"),
    }
}

#[test]
fn reinterpret_keeps_bits() {
    // i32.reinterpret_f32(f32.const 1.0)
    assert_eq!(
        run_i32(&[0x43, 0x00, 0x00, 0x80, 0x3f, 0xbc, 0x0b]),
        1.0f32.to_bits() as i32
    );
}

#[test]
fn truncation_faults_and_saturates() {
    let nan = [0x44, 0, 0, 0, 0, 0, 0, 0xf8, 0x7f];
    let mut code = nan.to_vec();
    code.extend_from_slice(&[0xaa, 0x0b]);
    assert_eq!(
        run(&[], &[I32], &[], &code, &[]),
        Err(VMError::InvalidConversion {
            instruction: "i32.trunc_f64_s"
        })
    );

    // 1e10 saturates to i32::MAX, NaN to zero
    let mut code = vec![0x44];
    code.extend_from_slice(&1e10f64.to_bits().to_le_bytes());
    code.extend_from_slice(&[0xfc, 0x02, 0x0b]);
    assert_eq!(run_i32(&code), i32::MAX);
    let mut code = nan.to_vec();
    code.extend_from_slice(&[0xfc, 0x02, 0x0b]);
    assert_eq!(run_i32(&code), 0);

    // -3.7 truncates toward zero
    let mut code = vec![0x44];
    code.extend_from_slice(&(-3.7f64).to_bits().to_le_bytes());
    code.extend_from_slice(&[0xaa, 0x0b]);
    assert_eq!(run_i32(&code), -3);
}

// ==================== Control Flow ====================

#[test]
fn if_else_arms() {
    // if (param) { 10 } else { 20 }
    let code = [0x20, 0x00, 0x04, 0x7f, 0x41, 0x0a, 0x05, 0x41, 0x14, 0x0b, 0x0b];
    let f = function(&[I32], &[I32], &[], &code);
    let mut machine = Machine::new(MachineConfig::default());
    assert_eq!(
        execute_on(&mut machine, f.clone(), &[Value::I32(1)]).unwrap().results,
        vec![Value::I32(10)]
    );
    assert_eq!(
        execute_on(&mut machine, f, &[Value::I32(0)]).unwrap().results,
        vec![Value::I32(20)]
    );

    // if without else and a false condition skips to end
    assert_eq!(
        run_i32(&[0x41, 0x05, 0x41, 0x00, 0x04, 0x40, 0x00, 0x0b, 0x0b]),
        5
    );
}

#[test]
fn br_table_selects_depth() {
    #[rustfmt::skip]
    let code = [
        0x02, 0x40, 0x02, 0x40,
        0x20, 0x00, 0x0e, 0x01, 0x00, 0x01, // br_table [0] default 1
        0x0b,
        0x41, 0x0a, 0x21, 0x01,
        0x0b,
        0x20, 0x01, 0x0b,
    ];
    let f = function(&[I32], &[I32], &[I32], &code);
    let mut machine = Machine::new(MachineConfig::default());
    assert_eq!(
        execute_on(&mut machine, f.clone(), &[Value::I32(0)]).unwrap().results,
        vec![Value::I32(10)]
    );
    assert_eq!(
        execute_on(&mut machine, f, &[Value::I32(5)]).unwrap().results,
        vec![Value::I32(0)]
    );
}

#[test]
fn shrinking_region_is_a_consistency_fault() {
    // i32.const 5; block { drop } end
    assert_eq!(
        run(&[], &[], &[], &[0x41, 0x05, 0x02, 0x40, 0x1a, 0x0b, 0x0b], &[]),
        Err(VMError::StackConsistencyFault {
            ip: 3,
            entry: 1,
            exit: 0
        })
    );
}

#[test]
fn typed_block_keeps_only_its_result() {
    // 10; block (result i32) { 1; 2; br 0 } end; i32.add
    assert_eq!(
        run_i32(&[0x41, 0x0a, 0x02, 0x7f, 0x41, 0x01, 0x41, 0x02, 0x0c, 0x00, 0x0b, 0x6a, 0x0b]),
        12
    );
    // same, leaving the region through its end
    assert_eq!(
        run_i32(&[0x41, 0x0a, 0x02, 0x7f, 0x41, 0x01, 0x41, 0x02, 0x0b, 0x6a, 0x0b]),
        12
    );
    // br_if out of a nested block carries the top word to the outer label
    #[rustfmt::skip]
    let nested = [
        0x41, 0x0a,
        0x02, 0x7f, 0x41, 0x01, 0x41, 0x02,
        0x02, 0x40, 0x41, 0x03, 0x41, 0x01, 0x0d, 0x01, 0x0b,
        0x00,
        0x0b,
        0x6a, 0x0b,
    ];
    assert_eq!(run_i32(&nested), 13);
}

#[test]
fn loop_continue_resets_stack() {
    #[rustfmt::skip]
    let code = [
        0x41, 0x0a,
        0x03, 0x40,
        0x41, 0x09,                         // pushed every iteration
        0x20, 0x00, 0x41, 0x01, 0x6a, 0x22, 0x00, // i = i + 1
        0x41, 0x03, 0x48, 0x0d, 0x00,       // br_if 0 while i < 3
        0x0b,
        0x0b,
    ];
    let mut machine = Machine::new(MachineConfig::default());
    let exec = execute_on(&mut machine, function(&[], &[I32], &[I32], &code), &[]).unwrap();
    assert_eq!(exec.results, vec![Value::I32(10)]);
    assert!(machine.stack().is_empty());
}

/// Parses `code`, applies `edit` to the decoded function and runs it.
fn run_tampered(code: &[u8], edit: impl FnOnce(&mut Function)) -> Result<Execution, VMError> {
    let mut tampered = (*function(&[], &[], &[], code)).clone();
    edit(&mut tampered);
    let mut machine = Machine::new(MachineConfig::default());
    execute_on(&mut machine, Arc::new(tampered), &[])
}

#[test]
fn if_with_wrong_start_is_malformed() {
    // 1; if { nop } end
    let code = [0x41, 0x01, 0x04, 0x40, 0x01, 0x0b, 0x0b];
    let err = run_tampered(&code, |f| f.blocks[0].start_at = 0).unwrap_err();
    assert!(matches!(err, VMError::MalformedIf { ip: 1, .. }));
}

#[test]
fn if_with_else_past_end_is_malformed() {
    // 1; if { nop } else { nop } end
    let code = [0x41, 0x01, 0x04, 0x40, 0x01, 0x05, 0x01, 0x0b, 0x0b];
    let end_at = function(&[], &[], &[], &code).blocks[0].end_at;
    let err = run_tampered(&code, |f| f.blocks[0].else_at = Some(end_at)).unwrap_err();
    assert!(matches!(err, VMError::MalformedIf { ip: 1, .. }));

    let err = run_tampered(&code, |f| f.blocks[0].else_at = Some(end_at + 1)).unwrap_err();
    assert!(matches!(err, VMError::MalformedIf { ip: 1, .. }));
}

#[test]
fn else_of_another_region_is_malformed() {
    // 1; if { block {} end } else {} end
    let code = [0x41, 0x01, 0x04, 0x40, 0x02, 0x40, 0x0b, 0x05, 0x0b, 0x0b];
    let err = run_tampered(&code, |f| f.operations[4].instr = Instr::Else { block: 1 }).unwrap_err();
    assert!(matches!(err, VMError::MalformedIf { ip: 4, .. }));
}

#[test]
fn if_pointing_at_a_block_is_malformed() {
    let code = [0x41, 0x01, 0x04, 0x40, 0x01, 0x0b, 0x0b];
    let err = run_tampered(&code, |f| f.blocks[0].kind = BlockKind::Block).unwrap_err();
    assert!(matches!(err, VMError::MalformedIf { ip: 1, .. }));
}

#[test]
fn branch_beyond_open_regions_is_invalid() {
    assert_eq!(
        run(&[], &[], &[], &[0x0c, 0x00, 0x0b], &[]),
        Err(VMError::InvalidBranch { depth: 0, open: 0 })
    );
    assert_eq!(
        run(&[], &[], &[], &[0x02, 0x40, 0x0c, 0x03, 0x0b, 0x0b], &[]),
        Err(VMError::InvalidBranch { depth: 3, open: 1 })
    );
}

#[test]
fn return_keeps_declared_results() {
    assert_eq!(run_i32(&[0x41, 0x01, 0x41, 0x02, 0x41, 0x03, 0x0f, 0x0b]), 3);
    // return from inside a block
    assert_eq!(
        run_i32(&[0x02, 0x40, 0x41, 0x05, 0x0f, 0x0b, 0x41, 0x06, 0x0b]),
        5
    );
    assert_eq!(
        run(&[], &[I32], &[], &[0x0f, 0x0b], &[]),
        Err(VMError::StackUnderflow)
    );
}

#[test]
fn select_and_unreachable() {
    assert_eq!(run_i32(&[0x41, 0x0a, 0x41, 0x14, 0x41, 0x00, 0x1b, 0x0b]), 20);
    assert_eq!(run_i32(&[0x41, 0x0a, 0x41, 0x14, 0x41, 0x01, 0x1b, 0x0b]), 10);
    assert_eq!(
        run(&[], &[], &[], &[0x00, 0x0b], &[]),
        Err(VMError::Unreachable)
    );
}

// ==================== Calls ====================

#[test]
fn call_depth_is_bounded() {
    let bytes = ModuleBuilder::new()
        .function(&[], &[], &[], &[0x10, 0x00, 0x0b])
        .build();
    let module = Module::decode(&bytes).unwrap();
    let mut registry = CodeRegistry::new();
    let ids = registry
        .register_module(&module, OpcodePolicy::default())
        .unwrap();
    let contract = contract(ids.clone());
    let env = Env {
        resolver: &registry,
        contract: &contract,
        context: CONTEXT,
    };
    let mut machine = Machine::new(MachineConfig::default().with_max_call_depth(8));
    assert_eq!(
        machine.invoke(&env, &CallPayload::new(ids[0], vec![])),
        Err(VMError::CallDepthExceeded { max: 8 })
    );
}

#[test]
fn call_passes_params_in_order() {
    // f0(a, b) = a - b; f1() = f0(10, 3)
    let bytes = ModuleBuilder::new()
        .function(&[I32, I32], &[I32], &[], &[0x20, 0x00, 0x20, 0x01, 0x6b, 0x0b])
        .function(&[], &[I32], &[], &[0x41, 0x0a, 0x41, 0x03, 0x10, 0x00, 0x0b])
        .build();
    let mut deployed = Deployed::new(&bytes);
    assert_eq!(
        deployed.call(1, vec![]).unwrap().results,
        vec![Value::I32(7)]
    );
}

#[test]
fn call_to_undeclared_index_fails() {
    let bytes = ModuleBuilder::new()
        .function(&[], &[], &[], &[0x10, 0x04, 0x0b])
        .build();
    let mut deployed = Deployed::new(&bytes);
    assert_eq!(
        deployed.call(0, vec![]),
        Err(VMError::UnknownFunction {
            function: "#4".to_string()
        })
    );
}

#[test]
fn call_indirect_through_table() {
    let bytes = ModuleBuilder::new()
        .function(&[], &[I32], &[], &[0x41, 0x07, 0x0b])
        .function(&[], &[I32], &[], &[0x41, 0x09, 0x0b])
        .function(&[I32], &[I32], &[], &[0x20, 0x00, 0x11, 0x00, 0x00, 0x0b])
        .function(&[I32], &[I32], &[], &[0x20, 0x00, 0x11, 0x01, 0x00, 0x0b])
        .table(4)
        .elements(1, &[0, 1])
        .build();
    let mut deployed = Deployed::new(&bytes);

    assert_eq!(
        deployed.call(2, vec![Value::I32(1)]).unwrap().results,
        vec![Value::I32(7)]
    );
    assert_eq!(
        deployed.call(2, vec![Value::I32(2)]).unwrap().results,
        vec![Value::I32(9)]
    );
    assert_eq!(
        deployed.call(2, vec![Value::I32(0)]),
        Err(VMError::UndefinedTableElement { element: 0 })
    );
    assert_eq!(
        deployed.call(2, vec![Value::I32(9)]),
        Err(VMError::UndefinedTableElement { element: 9 })
    );
    assert_eq!(
        deployed.call(3, vec![Value::I32(1)]),
        Err(VMError::IndirectCallMismatch { element: 1 })
    );
}

#[test]
fn invoke_checks_declaration_and_params() {
    let bytes = ModuleBuilder::new()
        .function(&[I32, I32], &[I32], &[], &[0x20, 0x00, 0x20, 0x01, 0x6a, 0x0b])
        .build();
    let mut deployed = Deployed::new(&bytes);

    assert_eq!(
        deployed.call(0, vec![Value::I32(1)]),
        Err(VMError::ParamArityMismatch {
            expected: 2,
            actual: 1
        })
    );
    assert_eq!(
        deployed.call(0, vec![Value::I32(1), Value::I64(1)]),
        Err(VMError::ParamTypeMismatch {
            index: 1,
            expected: "i32",
            actual: "i64"
        })
    );

    let env = Env {
        resolver: &deployed.registry,
        contract: &deployed.contract,
        context: CONTEXT,
    };
    let stranger = FunctionId::of(b"stranger");
    assert!(matches!(
        deployed
            .machine
            .invoke(&env, &CallPayload::new(stranger, vec![])),
        Err(VMError::UnknownFunction { .. })
    ));

    let payload = CallPayload::new(deployed.ids[0], vec![Value::I32(40), Value::I32(2)]).encode();
    assert_eq!(
        deployed.machine.invoke_encoded(&env, &payload).unwrap().results,
        vec![Value::I32(42)]
    );
}

#[test]
fn unresolved_code_is_fatal() {
    let registry = CodeRegistry::new();
    let id = FunctionId::of(b"missing");
    let contract = contract(vec![id]);
    let env = Env {
        resolver: &registry,
        contract: &contract,
        context: CONTEXT,
    };
    let mut machine = Machine::new(MachineConfig::default());
    assert_eq!(
        machine.invoke(&env, &CallPayload::new(id, vec![])),
        Err(VMError::UnresolvedCode { id })
    );
}

// ==================== Stack and Locals ====================

#[test]
fn stack_height_is_bounded() {
    let code = [0x41, 0x01, 0x41, 0x01, 0x41, 0x01, 0x1a, 0x1a, 0x1a, 0x0b];
    let mut machine = Machine::new(MachineConfig::default().with_max_stack_height(2));
    assert_eq!(
        execute_on(&mut machine, function(&[], &[], &[], &code), &[]),
        Err(VMError::StackOverflow { max: 2 })
    );
}

#[test]
fn callee_cannot_pop_caller_values() {
    // f0() drops a value it never pushed
    let bytes = ModuleBuilder::new()
        .function(&[], &[], &[], &[0x1a, 0x0b])
        .function(&[], &[I32], &[], &[0x41, 0x01, 0x10, 0x00, 0x0b])
        .build();
    let mut deployed = Deployed::new(&bytes);
    assert_eq!(deployed.call(1, vec![]), Err(VMError::StackUnderflow));
}

#[test]
fn locals_are_bounds_checked() {
    assert_eq!(
        run(&[], &[], &[I64], &[0x20, 0x05, 0x1a, 0x0b], &[]),
        Err(VMError::LocalOutOfRange { index: 5, count: 1 })
    );
    // tee leaves the value on the stack
    assert_eq!(
        run(&[], &[I32], &[I32], &[0x41, 0x09, 0x22, 0x00, 0x0b], &[])
            .unwrap()
            .results,
        vec![Value::I32(9)]
    );
}

// ==================== Memory ====================

#[test]
fn data_segments_and_loads() {
    let bytes = ModuleBuilder::new()
        .function(&[], &[I32], &[], &[0x41, 0x10, 0x2d, 0x00, 0x00, 0x0b])
        .function(
            &[],
            &[I32],
            &[],
            &[
                0x41, 0x00, 0x41, 0xd2, 0x09, 0x36, 0x02, 0x00, // store 1234 at 0
                0x41, 0x00, 0x28, 0x02, 0x00, 0x0b,
            ],
        )
        .function(&[], &[I32], &[], &[0x41, 0x80, 0x80, 0x04, 0x28, 0x02, 0x00, 0x0b])
        .memory(1, Some(2))
        .data(16, b"hello")
        .build();
    let mut deployed = Deployed::new(&bytes);

    assert_eq!(
        deployed.call(0, vec![]).unwrap().results,
        vec![Value::I32(b'h' as i32)]
    );
    assert_eq!(
        deployed.call(1, vec![]).unwrap().results,
        vec![Value::I32(1234)]
    );
    assert_eq!(
        deployed.call(2, vec![]),
        Err(VMError::MemoryOutOfBounds {
            address: 65536,
            len: 4,
            size: 65536
        })
    );
}

#[test]
fn sign_extending_loads() {
    let mut machine = Machine::new(MachineConfig::default());
    *machine.memory_mut() = LinearMemory::new(1, 1);
    machine.memory_mut().write(0, &[0xfe, 0xff]).unwrap();

    let load8 = function(&[], &[I32], &[], &[0x41, 0x00, 0x2c, 0x00, 0x00, 0x0b]);
    assert_eq!(
        execute_on(&mut machine, load8, &[]).unwrap().results,
        vec![Value::I32(-2)]
    );
    let load16 = function(&[], &[I64], &[], &[0x41, 0x00, 0x33, 0x01, 0x00, 0x0b]);
    assert_eq!(
        execute_on(&mut machine, load16, &[]).unwrap().results,
        vec![Value::I64(0xfffe)]
    );
}

#[test]
fn memory_grows_to_its_limit() {
    let bytes = ModuleBuilder::new()
        .function(&[I32], &[I32], &[], &[0x20, 0x00, 0x40, 0x00, 0x0b])
        .function(&[], &[I32], &[], &[0x3f, 0x00, 0x0b])
        .memory(1, Some(2))
        .build();
    let mut deployed = Deployed::new(&bytes);

    assert_eq!(
        deployed.call(0, vec![Value::I32(1)]).unwrap().results,
        vec![Value::I32(1)]
    );
    assert_eq!(
        deployed.call(0, vec![Value::I32(5)]).unwrap().results,
        vec![Value::I32(-1)]
    );
    assert_eq!(
        deployed.call(1, vec![]).unwrap().results,
        vec![Value::I32(2)]
    );
}

#[test]
fn bulk_memory_ops() {
    let mut machine = Machine::new(MachineConfig::default());
    *machine.memory_mut() = LinearMemory::new(1, 1);
    #[rustfmt::skip]
    let code = [
        0x41, 0x00, 0x41, 0x2a, 0x41, 0x04, 0xfc, 0x0b, 0x00,       // fill [0, 4) with 42
        0x41, 0x02, 0x41, 0x00, 0x41, 0x04, 0xfc, 0x0a, 0x00, 0x00, // copy [0, 4) to 2
        0x0b,
    ];
    execute_on(&mut machine, function(&[], &[], &[], &code), &[]).unwrap();
    assert_eq!(machine.memory().slice(0, 7).unwrap(), &[42, 42, 42, 42, 42, 42, 0]);
}

#[test]
fn instantiate_rejects_oversized_memory() {
    let bytes = ModuleBuilder::new().memory(8, None).build();
    let module = Module::decode(&bytes).unwrap();
    assert!(matches!(
        Machine::instantiate(&module, MachineConfig::default().with_max_memory_pages(4)),
        Err(VMError::Instantiation { .. })
    ));
}

#[test]
fn globals_seed_storage_defaults() {
    let bytes = ModuleBuilder::new()
        .function(&[], &[I32], &[], &[0x23, 0x00, 0x0b])
        .global(I32, true, 11)
        .build();
    let mut deployed = Deployed::new(&bytes);
    assert_eq!(deployed.machine.storage().read(0), 11);
    assert_eq!(
        deployed.call(0, vec![]).unwrap().results,
        vec![Value::I32(11)]
    );
    assert!(deployed.machine.storage().changes().is_empty());
}

// ==================== Environment ====================

fn run_env(contract: &Contract, machine: &mut Machine, results: &[ValueKind], code: &[u8]) -> Result<Execution, VMError> {
    let registry = CodeRegistry::new();
    let env = Env {
        resolver: &registry,
        contract,
        context: CONTEXT,
    };
    machine.execute(&env, function(&[], results, &[], code), &[])
}

#[test]
fn environment_queries() {
    let contract = contract(vec![])
        .with_input(vec![1, 2, 3, 4])
        .with_value(7)
        .with_balance(99);
    let mut machine = Machine::new(MachineConfig::default());
    *machine.memory_mut() = LinearMemory::new(1, 1);

    let results = |m: &mut Machine, kind, code: &[u8]| run_env(&contract, m, &[kind], code).unwrap().results;
    assert_eq!(results(&mut machine, I32, &[0xe4, 0x0b]), vec![Value::I32(4)]);
    assert_eq!(results(&mut machine, I64, &[0xe5, 0x0b]), vec![Value::I64(7)]);
    assert_eq!(results(&mut machine, I64, &[0xe1, 0x0b]), vec![Value::I64(99)]);
    assert_eq!(
        results(&mut machine, I64, &[0xe3, 0x0b]),
        vec![Value::I64(CONTEXT.timestamp as i64)]
    );

    // copy input[1..3] to 8, then load it as a u16
    let copy = [0x41, 0x08, 0x41, 0x01, 0x41, 0x02, 0xe6, 0x41, 0x08, 0x2f, 0x01, 0x00, 0x0b];
    assert_eq!(results(&mut machine, I32, &copy), vec![Value::I32(0x0302)]);

    // caller hash written to memory
    let caller = [0x41, 0x00, 0xe2, 0x41, 0x00, 0x29, 0x03, 0x00, 0x0b];
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&contract.caller.as_slice()[..8]);
    assert_eq!(
        results(&mut machine, I64, &caller),
        vec![Value::I64(u64::from_le_bytes(prefix) as i64)]
    );
}

#[test]
fn input_copy_out_of_range() {
    let contract = contract(vec![]).with_input(vec![1, 2, 3, 4]);
    let mut machine = Machine::new(MachineConfig::default());
    *machine.memory_mut() = LinearMemory::new(1, 1);
    assert_eq!(
        run_env(
            &contract,
            &mut machine,
            &[],
            &[0x41, 0x00, 0x41, 0x03, 0x41, 0x02, 0xe6, 0x0b]
        ),
        Err(VMError::MemoryOutOfBounds {
            address: 3,
            len: 2,
            size: 4
        })
    );
}

#[test]
fn address_needs_memory() {
    let contract = contract(vec![]);
    let mut machine = Machine::new(MachineConfig::default());
    assert!(matches!(
        run_env(&contract, &mut machine, &[], &[0x41, 0x00, 0xe0, 0x0b]),
        Err(VMError::MemoryOutOfBounds { .. })
    ));
}

#[test]
fn call_by_hash() {
    let mut registry = CodeRegistry::new();
    let answer = registry
        .register(
            Signature::new(vec![], vec![I32]),
            &FunctionBody {
                locals: vec![],
                code: vec![0x41, 0x2a, 0x0b],
            },
            OpcodePolicy::Reject,
        )
        .unwrap();
    let caller = registry
        .register(
            Signature::new(vec![], vec![I32]),
            &FunctionBody {
                locals: vec![],
                code: vec![0x41, 0x00, 0xe7, 0x0b],
            },
            OpcodePolicy::Reject,
        )
        .unwrap();

    let mut machine = Machine::new(MachineConfig::default());
    *machine.memory_mut() = LinearMemory::new(1, 1);
    machine.memory_mut().write(0, answer.as_slice()).unwrap();

    let declared = contract(vec![caller, answer]);
    let env = Env {
        resolver: &registry,
        contract: &declared,
        context: CONTEXT,
    };
    assert_eq!(
        machine
            .invoke(&env, &CallPayload::new(caller, vec![]))
            .unwrap()
            .results,
        vec![Value::I32(42)]
    );

    let undeclared = contract(vec![caller]);
    let env = Env {
        contract: &undeclared,
        ..env
    };
    assert_eq!(
        machine.invoke(&env, &CallPayload::new(caller, vec![])),
        Err(VMError::UnknownFunction {
            function: answer.to_string()
        })
    );
}

#[test]
fn address_is_written_in_full() {
    let mut contract = contract(vec![]);
    contract.address = Hash([7u8; 32]);
    let mut machine = Machine::new(MachineConfig::default());
    *machine.memory_mut() = LinearMemory::new(1, 1);
    run_env(&contract, &mut machine, &[], &[0x41, 0x04, 0xe0, 0x0b]).unwrap();
    assert_eq!(machine.memory().slice(4, 32).unwrap(), &[7u8; 32]);
    assert_eq!(machine.memory().slice(36, 1).unwrap(), &[0]);
}
