//! Contract module runner CLI.
//!
//! Decodes a binary module, registers its functions and invokes one export.
//!
//! # Usage
//! ```text
//! contract_vm <module.wasm> <export> [OPTIONS]
//! ```
//!
//! # Arguments
//! - `module.wasm`: Binary module file
//! - `export`: Name of the exported function to invoke
//!
//! # Options
//! - `-a, --arg <kind:value>`: Parameter, repeatable (e.g. `i32:5`, `f64:1.5`)
//! - `-g, --gas <amount>`: Gas made available to the call
//! - `--max-depth <frames>`: Maximum call depth
//! - `--strict`: Reject unknown opcodes instead of skipping them
//! - `-v, --verbose`: Log invocation details (same as `--log-level debug`)
//! - `--log-level <level>`: Minimum log level (trace, debug, info, warn, error)
//!
//! # Examples
//! ```text
//! contract_vm add.wasm add --arg i32:1 --arg i32:2
//! contract_vm loop.wasm run --gas 5000 --strict
//! ```

use contract_vm::types::hash::Hash;
use contract_vm::utils::log::{self, Level};
use contract_vm::virtual_machine::contract::{CallPayload, Contract, ExecContext};
use contract_vm::virtual_machine::module::{ExternalKind, Module};
use contract_vm::virtual_machine::operation::Value;
use contract_vm::virtual_machine::parser::OpcodePolicy;
use contract_vm::virtual_machine::resolver::CodeRegistry;
use contract_vm::virtual_machine::vm::gas::DEFAULT_GAS_LIMIT;
use contract_vm::virtual_machine::vm::{Env, Machine, MachineConfig};
use contract_vm::{error, info};
use std::env;
use std::fs;
use std::process;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 || args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        process::exit(if args.len() < 3 { 1 } else { 0 });
    }

    let module_path = &args[1];
    let export = &args[2];
    let mut params: Vec<Value> = Vec::new();
    let mut gas = DEFAULT_GAS_LIMIT;
    let mut config = MachineConfig::default();
    let mut policy = OpcodePolicy::SkipUnknown;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            k @ ("--arg" | "-a") => {
                let raw = value_of(&args, i, k);
                params.push(Value::parse(raw).unwrap_or_else(|| {
                    error!("Invalid argument '{raw}': expected <i32|i64|f32|f64>:<value>");
                    process::exit(1);
                }));
                i += 2;
            }
            k @ ("--gas" | "-g") => {
                gas = number(value_of(&args, i, k), k);
                i += 2;
            }
            k @ "--max-depth" => {
                config = config.with_max_call_depth(number(value_of(&args, i, k), k));
                i += 2;
            }
            "--strict" => {
                policy = OpcodePolicy::Reject;
                i += 1;
            }
            "--verbose" | "-v" => {
                log::set_level(Level::Debug);
                i += 1;
            }
            k @ "--log-level" => {
                let raw = value_of(&args, i, k);
                let level = Level::parse(raw).unwrap_or_else(|| {
                    error!("Invalid log level '{raw}': expected trace, debug, info, warn or error");
                    process::exit(1);
                });
                log::set_level(level);
                i += 2;
            }
            other => {
                error!("Unexpected argument: {}\n", other);
                print_usage(&args[0]);
                process::exit(1);
            }
        }
    }

    let bytes = fs::read(module_path).unwrap_or_else(|e| {
        error!("Cannot read {module_path}: {e}");
        process::exit(1);
    });

    let module = Module::decode(&bytes).unwrap_or_else(|e| {
        error!("Decoding failed: {e}");
        process::exit(1);
    });

    let Some(index) = module.export(export, ExternalKind::Function) else {
        error!("Module has no exported function '{export}'");
        process::exit(1);
    };

    let mut registry = CodeRegistry::new();
    let ids = registry.register_module(&module, policy).unwrap_or_else(|e| {
        error!("Parsing failed: {e}");
        process::exit(1);
    });
    let Some(&id) = ids.get(index as usize) else {
        error!("Export '{export}' refers to function {index}, which has no body");
        process::exit(1);
    };

    let mut machine = Machine::instantiate(&module, config.with_gas_limit(gas)).unwrap_or_else(|e| {
        error!("{e}");
        process::exit(1);
    });

    let address = Hash::sha3().chain(&bytes).finalize();
    let contract = Contract::new(address, Hash::zero(), ids).with_gas(gas);
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    let context = ExecContext { timestamp };
    let env = Env {
        resolver: &registry,
        contract: &contract,
        context: &context,
    };

    info!("Invoking {export} ({id}) from {module_path}");
    let execution = match machine.invoke(&env, &CallPayload::new(id, params)) {
        Ok(execution) => execution,
        Err(e) => {
            error!("Execution failed: {e}");
            process::exit(1);
        }
    };

    let results: Vec<String> = execution.results.iter().map(Value::to_string).collect();
    info!("Results: [{}]", results.join(", "));
    info!("Gas used: {} / {gas}", execution.gas_used);
    for (category, amount) in execution.profile.iter().filter(|(_, amount)| *amount > 0) {
        info!("  {:<12} {amount}", category.as_str());
    }

    let diff = machine.storage_mut().commit();
    if diff.is_empty() {
        info!("Storage unchanged");
    }
    for run in &diff {
        let hex: String = run.bytes.iter().map(|b| format!("{b:02x}")).collect();
        info!("Storage @{}: {hex}", run.offset);
    }
}

fn value_of<'a>(args: &'a [String], i: usize, flag: &str) -> &'a str {
    match args.get(i + 1) {
        Some(value) => value.as_str(),
        None => {
            error!("{flag} requires an argument");
            process::exit(1);
        }
    }
}

fn number<T: FromStr>(raw: &str, flag: &str) -> T {
    raw.parse().unwrap_or_else(|_| {
        error!("Invalid value for {flag}: '{raw}' is not a valid number");
        process::exit(1);
    })
}

fn print_usage(program: &str) {
    eprintln!("Usage: {} <module.wasm> <export> [OPTIONS]", program);
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -a, --arg <kind:value>   Parameter (i32:5, i64:-1, f32:0.5, f64:2)");
    eprintln!("  -g, --gas <amount>       Gas for the call (default {DEFAULT_GAS_LIMIT})");
    eprintln!("      --max-depth <n>      Maximum call depth");
    eprintln!("      --strict             Reject unknown opcodes");
    eprintln!("  -v, --verbose            Log invocation details");
    eprintln!("      --log-level <level>  trace, debug, info, warn or error (default info)");
}
