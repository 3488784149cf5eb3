use lowbyte_core::ir::chunk::IrChunk;
use lowbyte_core::ir::options::CompilationOptions;
use lowbyte_core::ir::program::{BlockItem, IrBlock, IrSubroutine};
use lowbyte_core::ir::symbols::IrSymbolTable;
use lowbyte_core::ir::{IrProgram, Opcode, ins};
use lowbyte_core::vm::StackValue;
use lowbyte_core::{ErrorKind, Position, VirtualMachine, VmConfig, VmRunner, read_program};

const HEADER: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<PROGRAM NAME="test">
<OPTIONS>
compTarget=virtual
output=PRG
launcher=NONE
zeropage=DONTUSE
zpReserved=
zpAllowed=
loadAddress=$0000
optimize=false
floats=true
dontReinitGlobals=false
outputDir=.
</OPTIONS>
<ASMSYMBOLS>
</ASMSYMBOLS>
<VARIABLESNOINIT>
uword main.word zp=DONTCARE align=0
ubyte main.out zp=DONTCARE align=0
</VARIABLESNOINIT>
<VARIABLESWITHINIT>
</VARIABLESWITHINIT>
<MEMORYMAPPEDVARIABLES>
</MEMORYMAPPEDVARIABLES>
<MEMORYSLABS>
</MEMORYSLABS>
<INITGLOBALS>
<CODE LABEL="">
</CODE>
</INITGLOBALS>
<BLOCK NAME="main" ADDRESS="" LIBRARY="false" FORCEOUTPUT="false" NOPREFIXING="false" ALIGN="NONE" POS="[test.p8: line 1 col 1-4]">
<SUB NAME="main.start" RETURNTYPE="" POS="[test.p8: line 2 col 5-9]">
<PARAMS>
</PARAMS>
<CODE LABEL="main.start">
"#;

/// A document whose `main.start` holds `code`, followed by `rest` inside the main block.
fn document(code: &str, rest: &str) -> String {
    format!("{}{}\n</CODE>\n</SUB>\n{}</BLOCK>\n</PROGRAM>\n", HEADER, code.trim(), rest)
}

fn load(code: &str, rest: &str) -> VirtualMachine {
    let program = read_program(&document(code, rest)).expect("document parses");
    VirtualMachine::load(&program, VmConfig::default()).expect("program loads")
}

fn run(code: &str) -> VirtualMachine {
    let mut vm = load(code, "");
    vm.run().expect("program runs");
    vm
}

#[test]
fn store_word_then_return_halts_with_clean_stacks() {
    let vm = run("nop\nload.w r1,#12345\nstorem.w r1,@1000\nreturn");
    assert!(vm.is_halted());
    assert_eq!(vm.steps(), 4);
    assert_eq!(vm.pc(), 3);
    assert_eq!(vm.memory().read_word(1000).expect("in range"), 12345);
    assert_eq!(vm.memory().read_byte(1000).expect("in range"), 0x39);
    assert_eq!(vm.memory().read_byte(1001).expect("in range"), 0x30);
    assert!(vm.call_stack().is_empty());
    assert!(vm.value_stack().is_empty());
}

#[test]
fn divmod_pushes_quotient_then_remainder() {
    let mut vm = load("load.b r1,#7\ndivmod.b r1,#2", "");
    vm.run().expect("program runs");
    assert_eq!(vm.value_stack(), &[StackValue::Byte(3), StackValue::Byte(1)]);

    let vm = run("load.b r1,#7\ndivmod.b r1,#2\npop.b r2\npop.b r3\nreturn");
    assert_eq!(vm.register(2), 1);
    assert_eq!(vm.register(3), 3);
    assert!(vm.value_stack().is_empty());
}

#[test]
fn running_into_inline_binary_is_unsupported() {
    let mut vm = load("jump main.blob", "<BYTES LABEL=\"main.blob\">\n01 02 03\n</BYTES>\n");
    let err = vm.run().expect_err("binary data cannot execute");
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
    assert_eq!(vm.steps(), 1);
    assert!(!vm.is_halted());
}

#[test]
fn machine_code_subroutine_is_rejected_at_load() {
    let asmsub = concat!(
        "<ASMSUB NAME=\"main.poke\" ADDRESS=\"\" CLOBBERS=\"\" RETURNS=\"\" POS=\"[test.p8: line 9 col 5-8]\">\n",
        "<ASMPARAMS>\n",
        "</ASMPARAMS>\n",
        "<ASM LABEL=\"\" IR=\"false\">\n",
        "    lda #0\n",
        "    rts\n",
        "</ASM>\n",
        "</ASMSUB>\n",
    );
    let program = read_program(&document("call main.poke\nreturn", asmsub)).expect("document parses");
    let err = VirtualMachine::load(&program, VmConfig::default())
        .err()
        .expect("machine code cannot run");
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
}

fn ir_bodied_asmsub(address: &str) -> String {
    format!(
        concat!(
            "<ASMSUB NAME=\"main.seven\" ADDRESS=\"{}\" CLOBBERS=\"\" RETURNS=\"ubyte@A\" POS=\"[test.p8: line 9 col 5-9]\">\n",
            "<ASMPARAMS>\n",
            "</ASMPARAMS>\n",
            "<ASM LABEL=\"\" IR=\"true\">\n",
            "load.b r9,#7\n",
            "returnr.b r9\n",
            "</ASM>\n",
            "</ASMSUB>\n",
        ),
        address
    )
}

#[test]
fn machine_bound_subroutine_with_ir_body_is_rejected_at_load() {
    for address in ["", "$2000"] {
        let text = document("call.b r2,main.seven\nstorem.b r2,main.out\nreturn", &ir_bodied_asmsub(address));
        let program = read_program(&text).expect("document parses");
        let err = VirtualMachine::load(&program, VmConfig::default())
            .err()
            .expect("machine-bound subroutines never run");
        assert_eq!(err.kind(), ErrorKind::UnsupportedOperation, "address '{}'", address);
        assert!(err.message().contains("main.seven"), "{}", err.message());
    }
}

#[test]
fn call_and_returnr_deliver_into_the_result_register() {
    let double = concat!(
        "<SUB NAME=\"main.double\" RETURNTYPE=\"uword\" POS=\"[test.p8: line 5 col 5-10]\">\n",
        "<PARAMS>\n",
        "</PARAMS>\n",
        "<CODE LABEL=\"main.double\">\n",
        "loadm.w r1,main.word\n",
        "addr.w r1,r1\n",
        "returnr.w r1\n",
        "</CODE>\n",
        "</SUB>\n",
    );
    let mut vm = load(
        "load.w r4,#300\nstorem.w r4,main.word\ncall.w r5,main.double\nreturn",
        double,
    );
    vm.run().expect("program runs");
    assert_eq!(vm.register(5), 600);
    assert!(vm.call_stack().is_empty());
    assert!(vm.value_stack().is_empty());
}

#[test]
fn clamp_syscall_pops_max_min_value() {
    let vm = run("load.b r1,#200\npush.b r1\nload.b r2,#10\npush.b r2\nload.b r3,#100\npush.b r3\nsyscall #1\npop.b r4\nreturn");
    assert_eq!(vm.register(4), 100);
    assert!(vm.value_stack().is_empty());
}

#[test]
fn signed_clamp_syscall_respects_the_sign() {
    // -5 clamped to [-3, 3]
    let vm = run("load.b r1,#-5\npush.b r1\nload.b r2,#-3\npush.b r2\nload.b r3,#3\npush.b r3\nsyscall #2\npop.b r4\nreturn");
    assert_eq!(vm.register(4) & 0xff, 0xfd);
}

#[test]
fn unknown_syscall_is_unsupported() {
    let mut vm = load("syscall #99\nreturn", "");
    let err = vm.run().expect_err("no such syscall");
    assert_eq!(err.kind(), ErrorKind::UnsupportedOperation);
}

#[test]
fn step_limit_stops_an_endless_loop() {
    let program = read_program(&document("jump main.start", "")).expect("document parses");
    let config = VmConfig {
        max_steps: Some(50),
        ..VmConfig::default()
    };
    let mut vm = VirtualMachine::load(&program, config).expect("program loads");
    let err = vm.run().expect_err("loop never ends");
    assert_eq!(err.kind(), ErrorKind::MalformedProgram);
    assert_eq!(vm.steps(), 50);
}

#[test]
fn popping_an_empty_stack_is_malformed() {
    let mut vm = load("pop.b r1\nreturn", "");
    let err = vm.run().expect_err("stack is empty");
    assert_eq!(err.kind(), ErrorKind::MalformedProgram);
}

#[test]
fn memory_access_past_the_end_is_malformed() {
    let mut vm = load("load.w r1,#1\nstorem.w r1,@65535\nreturn", "");
    let err = vm.run().expect_err("word straddles the end of memory");
    assert_eq!(err.kind(), ErrorKind::MalformedProgram);
}

#[test]
fn float_arithmetic_round_trips_through_memory() {
    let vm = run("load.f fr1,#1.5\nadd.f fr1,#2.25\nstorem.f fr1,@2000\nloadm.f fr2,@2000\nreturn");
    assert_eq!(vm.fp_register(1), 3.75);
    assert_eq!(vm.fp_register(2), 3.75);
    assert_eq!(vm.memory().read_float(2000).expect("in range"), 3.75);
}

#[test]
fn compare_sets_carry_for_unsigned_greater_or_equal() {
    let vm = run("load.b r1,#200\ncmpi.b r1,#100\nreturn");
    assert!(vm.flags().carry);
    assert!(!vm.flags().zero);

    let vm = run("load.b r1,#5\ncmpi.b r1,#5\nreturn");
    assert!(vm.flags().carry);
    assert!(vm.flags().zero);
}

#[test]
fn byte_write_keeps_the_high_byte_of_a_register() {
    let vm = run("load.w r1,#4660\nload.b r1,#255\nreturn");
    assert_eq!(vm.register(1), 0x12ff);
}

#[test]
fn counted_loop_with_status_branch() {
    let vm = run("load.b r1,#10\nload.w r2,#0\n</CODE>\n<CODE LABEL=\"main.start.loop\">\nadd.w r2,#3\ndec.b r1\nbstne main.start.loop\nstorem.w r2,main.word\nreturn");
    let word = vm.address_of("main.word").expect("allocated");
    assert_eq!(vm.memory().read_word(word).expect("in range"), 30);
}

#[test]
fn unresolved_label_is_malformed_at_load() {
    let mut sub = IrSubroutine {
        label: "main.start".to_string(),
        parameters: Vec::new(),
        return_type: None,
        position: Position::dummy(),
        chunks: Vec::new(),
    };
    sub.chunks.push(IrChunk::code_with(
        Some("main.start".to_string()),
        vec![ins(Opcode::Jump).label("main.nowhere").finish()],
    ));
    let mut block = IrBlock::new("main", Position::dummy());
    block.children.push(BlockItem::Sub(sub));
    let mut program = IrProgram::new("broken", CompilationOptions::default(), IrSymbolTable::new());
    program.blocks.push(block);

    let err = VirtualMachine::load(&program, VmConfig::default())
        .err()
        .expect("label cannot resolve");
    assert_eq!(err.kind(), ErrorKind::MalformedProgram);
}

#[test]
fn runner_optimizes_before_loading() {
    let text = document("load.w r1,#5\nadd.w r1,#0\nadd.w r1,#1\nstorem.w r1,main.word\nreturn", "");
    let plain = VmRunner::new(VmConfig::default()).run_text(&text).expect("runs");
    let optimized = VmRunner::new(VmConfig::default())
        .optimized(true)
        .run_text(&text)
        .expect("runs");

    let word = plain.address_of("main.word").expect("allocated");
    assert_eq!(plain.memory().read_word(word).expect("in range"), 6);
    assert_eq!(optimized.memory().read_word(word).expect("in range"), 6);
    assert!(optimized.instruction_count() < plain.instruction_count());
    assert!(optimized.steps() < plain.steps());
}

#[test]
fn snapshot_lists_only_live_registers() {
    let vm = run("load.w r3,#77\nreturn");
    let snapshot = vm.snapshot();
    assert!(snapshot.halted);
    assert_eq!(snapshot.registers.get(&3), Some(&77));
    assert_eq!(snapshot.registers.len(), 1);
    let json = snapshot.to_json().expect("serializes");
    assert!(json.contains("\"halted\": true"));
}
