use lowbyte_core::ast::{BinaryOperator, NodeId, NodeKind, PtProgram, RpnItem};
use lowbyte_core::ir::options::CompilationOptions;
use lowbyte_core::ir::program::BlockOptions;
use lowbyte_core::ir::symbols::{ArrayElement, VariableInit};
use lowbyte_core::ir::{BinarySource, IrInstruction, IrProgram, Opcode, Syscall};
use lowbyte_core::types::{DataType, IrDataType, ZeropageWish};
use lowbyte_core::{ErrorKind, LowbyteErrorExt, Position, VirtualMachine, VmConfig, lower_program};

fn variable(tree: &mut PtProgram, name: &str, dt: DataType, init: Option<f64>) -> NodeId {
    tree.stmt(NodeKind::Variable {
        name: name.to_string(),
        dt,
        length: None,
        init: init.map(VariableInit::Scalar),
        zp_wish: ZeropageWish::DontCare,
        align: 0,
    })
}

fn array(tree: &mut PtProgram, name: &str, dt: DataType, values: &[f64]) -> NodeId {
    tree.stmt(NodeKind::Variable {
        name: name.to_string(),
        dt,
        length: Some(values.len() as u32),
        init: Some(VariableInit::Array(values.iter().map(|v| ArrayElement::Number(*v)).collect())),
        zp_wish: ZeropageWish::DontCare,
        align: 0,
    })
}

fn sub(tree: &mut PtProgram, name: &str, params: Vec<(String, DataType)>, return_type: Option<DataType>, body: Vec<NodeId>) -> NodeId {
    tree.stmt(NodeKind::Sub {
        name: name.to_string(),
        params,
        return_type,
        body,
    })
}

fn main_block(tree: &mut PtProgram, children: Vec<NodeId>) {
    let block = tree.stmt(NodeKind::Block {
        name: "main".to_string(),
        library: false,
        options: BlockOptions::default(),
        children,
    });
    tree.add_block(block);
}

fn assign(tree: &mut PtProgram, name: &str, dt: DataType, value: NodeId) -> NodeId {
    let target = tree.ident(dt, name);
    tree.stmt(NodeKind::Assignment { target, value })
}

fn options(optimize: bool) -> CompilationOptions {
    CompilationOptions {
        optimize,
        ..CompilationOptions::default()
    }
}

fn lower(tree: &PtProgram, options: CompilationOptions) -> IrProgram {
    lower_program(tree, options).expect("program lowers")
}

fn run(program: &IrProgram) -> VirtualMachine {
    let config = VmConfig {
        max_steps: Some(100_000),
        ..VmConfig::default()
    };
    let mut vm = VirtualMachine::load(program, config).expect("program loads");
    vm.run().expect("program runs");
    vm
}

fn byte_at(vm: &VirtualMachine, symbol: &str) -> u8 {
    let address = vm.address_of(symbol).expect("symbol has an address");
    vm.memory().read_byte(address).expect("address in range")
}

fn word_at(vm: &VirtualMachine, symbol: &str) -> u16 {
    let address = vm.address_of(symbol).expect("symbol has an address");
    vm.memory().read_word(address).expect("address in range")
}

fn float_at(vm: &VirtualMachine, symbol: &str) -> f64 {
    let address = vm.address_of(symbol).expect("symbol has an address");
    vm.memory().read_float(address).expect("address in range")
}

fn sub_instructions<'a>(program: &'a IrProgram, name: &str) -> Vec<&'a IrInstruction> {
    program
        .subroutines()
        .find(|sub| sub.label == name)
        .expect("subroutine exists")
        .chunks
        .iter()
        .flat_map(|chunk| chunk.instructions())
        .collect()
}

/// main.result = 6 * 7
fn product_program() -> PtProgram {
    let mut tree = PtProgram::new("product");
    let var = variable(&mut tree, "main.result", DataType::UWord, None);
    let left = tree.number(DataType::UWord, 6.0);
    let right = tree.number(DataType::UWord, 7.0);
    let value = tree.expr(
        NodeKind::Binary {
            left,
            op: BinaryOperator::Mul,
            right,
        },
        DataType::UWord,
    );
    let body = vec![assign(&mut tree, "main.result", DataType::UWord, value)];
    let start = sub(&mut tree, "main.start", Vec::new(), None, body);
    main_block(&mut tree, vec![var, start]);
    tree
}

#[test]
fn assignment_of_a_product_runs_to_the_expected_value() {
    let tree = product_program();
    for optimize in [false, true] {
        let program = lower(&tree, options(optimize));
        let vm = run(&program);
        assert_eq!(word_at(&vm, "main.result"), 42);
        assert!(vm.value_stack().is_empty());
    }
}

#[test]
fn subroutine_body_ends_with_an_implicit_return() {
    let program = lower(&product_program(), options(false));
    let body = sub_instructions(&program, "main.start");
    assert_eq!(body.last().map(|i| i.opcode()), Some(Opcode::Return));
    assert!(body.iter().any(|i| i.opcode() == Opcode::Storem && i.label() == Some("main.result")));
}

fn divmod_program() -> PtProgram {
    let mut tree = PtProgram::new("divmod");
    let q = variable(&mut tree, "main.q", DataType::UByte, None);
    let r = variable(&mut tree, "main.r", DataType::UByte, None);
    let number = tree.number(DataType::UByte, 17.0);
    let divisor = tree.number(DataType::UByte, 5.0);
    let q_target = tree.ident(DataType::UByte, "main.q");
    let r_target = tree.ident(DataType::UByte, "main.r");
    let call = tree.stmt(NodeKind::BuiltinCall {
        name: "divmod".to_string(),
        args: vec![number, divisor, q_target, r_target],
    });
    let start = sub(&mut tree, "main.start", Vec::new(), None, vec![call]);
    main_block(&mut tree, vec![q, r, start]);
    tree
}

#[test]
fn divmod_pops_the_remainder_before_the_quotient() {
    let program = lower(&divmod_program(), options(false));
    let body = sub_instructions(&program, "main.start");
    let at = body
        .iter()
        .position(|i| i.opcode() == Opcode::Divmod)
        .expect("divmod emitted");
    let number_reg = body[at].reg1();
    assert_eq!(body[at].immediate(), Some(5));
    assert_eq!(body[at + 1].opcode(), Opcode::Pop);
    assert_ne!(body[at + 1].reg1(), number_reg);
    assert_eq!(body[at + 2].opcode(), Opcode::Pop);
    assert_eq!(body[at + 2].reg1(), number_reg);

    let vm = run(&program);
    assert_eq!(byte_at(&vm, "main.q"), 3);
    assert_eq!(byte_at(&vm, "main.r"), 2);
}

#[test]
fn function_call_delivers_the_return_value() {
    let mut tree = PtProgram::new("calls");
    let result = variable(&mut tree, "main.result", DataType::UByte, None);

    let param = tree.ident(DataType::UByte, "main.twice.v");
    let two = tree.number(DataType::UByte, 2.0);
    let doubled = tree.expr(
        NodeKind::Binary {
            left: param,
            op: BinaryOperator::Mul,
            right: two,
        },
        DataType::UByte,
    );
    let ret = tree.stmt(NodeKind::Return { value: Some(doubled) });
    let twice = sub(
        &mut tree,
        "main.twice",
        vec![("main.twice.v".to_string(), DataType::UByte)],
        Some(DataType::UByte),
        vec![ret],
    );

    let arg = tree.number(DataType::UByte, 21.0);
    let call = tree.expr(
        NodeKind::FunctionCall {
            target: "main.twice".to_string(),
            args: vec![arg],
        },
        DataType::UByte,
    );
    let body = vec![assign(&mut tree, "main.result", DataType::UByte, call)];
    let start = sub(&mut tree, "main.start", Vec::new(), None, body);
    main_block(&mut tree, vec![result, start, twice]);

    let program = lower(&tree, options(true));
    let calls: Vec<_> = sub_instructions(&program, "main.start")
        .into_iter()
        .filter(|i| i.opcode() == Opcode::Call)
        .collect();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].label(), Some("main.twice"));

    let vm = run(&program);
    assert_eq!(byte_at(&vm, "main.result"), 42);
    assert!(vm.call_stack().is_empty());
}

#[test]
fn counted_repeat_runs_its_body_that_many_times() {
    let mut tree = PtProgram::new("repeat");
    let total = variable(&mut tree, "main.total", DataType::UByte, Some(0.0));
    let target = tree.ident(DataType::UByte, "main.total");
    let three = tree.number(DataType::UByte, 3.0);
    let add = tree.stmt(NodeKind::AugmentedAssignment {
        target,
        op: BinaryOperator::Add,
        value: three,
    });
    let count = tree.number(DataType::UByte, 5.0);
    let repeat = tree.stmt(NodeKind::Repeat {
        count: Some(count),
        body: vec![add],
    });
    let start = sub(&mut tree, "main.start", Vec::new(), None, vec![repeat]);
    main_block(&mut tree, vec![total, start]);

    let vm = run(&lower(&tree, options(false)));
    assert_eq!(byte_at(&vm, "main.total"), 15);
}

#[test]
fn for_loop_sums_an_inclusive_range() {
    let mut tree = PtProgram::new("forloop");
    let total = variable(&mut tree, "main.total", DataType::UByte, Some(0.0));
    let counter = variable(&mut tree, "main.i", DataType::UByte, None);

    let target = tree.ident(DataType::UByte, "main.total");
    let value = tree.ident(DataType::UByte, "main.i");
    let add = tree.stmt(NodeKind::AugmentedAssignment {
        target,
        op: BinaryOperator::Add,
        value,
    });
    let loop_var = tree.ident(DataType::UByte, "main.i");
    let from = tree.number(DataType::UByte, 1.0);
    let to = tree.number(DataType::UByte, 10.0);
    let for_loop = tree.stmt(NodeKind::For {
        variable: loop_var,
        from,
        to,
        step: 1,
        body: vec![add],
    });
    let start = sub(&mut tree, "main.start", Vec::new(), None, vec![for_loop]);
    main_block(&mut tree, vec![total, counter, start]);

    for optimize in [false, true] {
        let vm = run(&lower(&tree, options(optimize)));
        assert_eq!(byte_at(&vm, "main.total"), 55);
        assert_eq!(byte_at(&vm, "main.i"), 10);
    }
}

#[test]
fn if_else_takes_the_matching_branch() {
    let mut tree = PtProgram::new("branches");
    let a = variable(&mut tree, "main.a", DataType::UByte, Some(9.0));
    let result = variable(&mut tree, "main.result", DataType::UByte, None);

    let left = tree.ident(DataType::UByte, "main.a");
    let right = tree.number(DataType::UByte, 5.0);
    let condition = tree.expr(
        NodeKind::Binary {
            left,
            op: BinaryOperator::Gt,
            right,
        },
        DataType::Bool,
    );
    let one = tree.number(DataType::UByte, 1.0);
    let then_branch = vec![assign(&mut tree, "main.result", DataType::UByte, one)];
    let two = tree.number(DataType::UByte, 2.0);
    let else_branch = vec![assign(&mut tree, "main.result", DataType::UByte, two)];
    let branch = tree.stmt(NodeKind::If {
        condition,
        then_branch,
        else_branch,
    });
    let start = sub(&mut tree, "main.start", Vec::new(), None, vec![branch]);
    main_block(&mut tree, vec![a, result, start]);

    let vm = run(&lower(&tree, options(false)));
    assert_eq!(byte_at(&vm, "main.result"), 1);
}

#[test]
fn rpn_expression_leaves_a_balanced_value_stack() {
    let mut tree = PtProgram::new("rpn");
    let result = variable(&mut tree, "main.result", DataType::UWord, None);
    let a = tree.number(DataType::UWord, 100.0);
    let b = tree.number(DataType::UWord, 30.0);
    let c = tree.number(DataType::UWord, 2.0);
    let sub_op = RpnItem::Operator {
        op: BinaryOperator::Sub,
        result: DataType::UWord,
        operand1: DataType::UWord,
        operand2: DataType::UWord,
    };
    let mul_op = RpnItem::Operator {
        op: BinaryOperator::Mul,
        result: DataType::UWord,
        operand1: DataType::UWord,
        operand2: DataType::UWord,
    };
    // (100 - 30) * 2
    let items = vec![RpnItem::Operand(a), RpnItem::Operand(b), sub_op, RpnItem::Operand(c), mul_op];
    let rpn = tree.expr(NodeKind::Rpn { items }, DataType::UWord);
    let body = vec![assign(&mut tree, "main.result", DataType::UWord, rpn)];
    let start = sub(&mut tree, "main.start", Vec::new(), None, body);
    main_block(&mut tree, vec![result, start]);

    let program = lower(&tree, options(false));
    let body = sub_instructions(&program, "main.start");
    let pushes = body.iter().filter(|i| i.opcode() == Opcode::Push).count();
    let pops = body.iter().filter(|i| i.opcode() == Opcode::Pop).count();
    assert_eq!(pushes, pops);

    let vm = run(&program);
    assert_eq!(word_at(&vm, "main.result"), 140);
    assert!(vm.value_stack().is_empty());
}

#[test]
#[should_panic(expected = "RPN not balanced")]
fn unbalanced_rpn_is_a_compiler_defect() {
    let mut tree = PtProgram::new("broken");
    let result = variable(&mut tree, "main.result", DataType::UWord, None);
    let a = tree.number(DataType::UWord, 1.0);
    let b = tree.number(DataType::UWord, 2.0);
    let rpn = tree.expr(
        NodeKind::Rpn {
            items: vec![RpnItem::Operand(a), RpnItem::Operand(b)],
        },
        DataType::UWord,
    );
    let body = vec![assign(&mut tree, "main.result", DataType::UWord, rpn)];
    let start = sub(&mut tree, "main.start", Vec::new(), None, body);
    main_block(&mut tree, vec![result, start]);
    lower(&tree, options(false));
}

#[test]
#[should_panic(expected = "unknown builtin function")]
fn unknown_builtin_is_a_compiler_defect() {
    let mut tree = PtProgram::new("broken");
    let call = tree.stmt(NodeKind::BuiltinCall {
        name: "frobnicate".to_string(),
        args: Vec::new(),
    });
    let start = sub(&mut tree, "main.start", Vec::new(), None, vec![call]);
    main_block(&mut tree, vec![start]);
    lower(&tree, options(false));
}

#[test]
fn global_inits_store_initial_values() {
    let mut tree = PtProgram::new("inits");
    let a = variable(&mut tree, "main.a", DataType::UByte, Some(9.0));
    let z = variable(&mut tree, "main.z", DataType::UWord, Some(0.0));
    let start = sub(&mut tree, "main.start", Vec::new(), None, Vec::new());
    main_block(&mut tree, vec![a, z, start]);

    let program = lower(&tree, options(false));
    let inits = program.global_inits.instructions();
    assert!(inits.iter().any(|i| i.opcode() == Opcode::Storezm && i.label() == Some("main.z")));
    assert!(inits.iter().any(|i| i.opcode() == Opcode::Storem && i.label() == Some("main.a")));

    let mut reinit = options(false);
    reinit.dont_reinit_globals = true;
    let program = lower(&tree, reinit);
    assert!(program.global_inits.instructions().is_empty());
}

fn builtin(tree: &mut PtProgram, name: &str, dt: DataType, args: Vec<NodeId>) -> NodeId {
    tree.expr(
        NodeKind::BuiltinCall {
            name: name.to_string(),
            args,
        },
        dt,
    )
}

fn builtin_stmt(tree: &mut PtProgram, name: &str, args: Vec<NodeId>) -> NodeId {
    tree.stmt(NodeKind::BuiltinCall {
        name: name.to_string(),
        args,
    })
}

fn element(tree: &mut PtProgram, name: &str, split: bool, index: NodeId) -> NodeId {
    tree.expr(
        NodeKind::ArrayIndexer {
            name: name.to_string(),
            split,
            index,
        },
        DataType::UWord,
    )
}

fn store(tree: &mut PtProgram, target: NodeId, value: NodeId) -> NodeId {
    tree.stmt(NodeKind::Assignment { target, value })
}

/// `main.i + 1`, an index that needs arithmetic before it can address anything.
fn computed_index(tree: &mut PtProgram) -> NodeId {
    let base = tree.ident(DataType::UByte, "main.i");
    let one = tree.number(DataType::UByte, 1.0);
    tree.expr(
        NodeKind::Binary {
            left: base,
            op: BinaryOperator::Add,
            right: one,
        },
        DataType::UByte,
    )
}

/// Wrap the statements in `main.start`, lower without optimizing and run.
fn run_start(mut tree: PtProgram, mut children: Vec<NodeId>, body: Vec<NodeId>) -> (IrProgram, VirtualMachine) {
    let start = sub(&mut tree, "main.start", Vec::new(), None, body);
    children.push(start);
    main_block(&mut tree, children);
    let program = lower(&tree, options(false));
    let vm = run(&program);
    assert!(vm.value_stack().is_empty());
    (program, vm)
}

fn opcodes(body: &[&IrInstruction], wanted: &[Opcode]) -> Vec<Opcode> {
    body.iter().map(|i| i.opcode()).filter(|op| wanted.contains(op)).collect()
}

#[test]
fn rotate_through_carry_keeps_the_carry_across_a_computed_index() {
    let mut tree = PtProgram::new("rotate");
    let words = array(&mut tree, "main.words", DataType::ArrayUW, &[0.0, 257.0, 0.0]);
    let i = variable(&mut tree, "main.i", DataType::UByte, Some(0.0));
    let set_carry = builtin_stmt(&mut tree, "set_carry", Vec::new());
    let index = computed_index(&mut tree);
    let target = element(&mut tree, "main.words", false, index);
    let rotate = builtin_stmt(&mut tree, "rol", vec![target]);

    let (program, vm) = run_start(tree, vec![words, i], vec![set_carry, rotate]);
    let body = sub_instructions(&program, "main.start");
    assert_eq!(
        opcodes(&body, &[Opcode::Pushst, Opcode::Popst, Opcode::Roxl]),
        [Opcode::Pushst, Opcode::Popst, Opcode::Roxl, Opcode::Pushst, Opcode::Popst]
    );
    let saved = body.iter().position(|i| i.opcode() == Opcode::Pushst).expect("status saved");
    let roxl = body.iter().position(|i| i.opcode() == Opcode::Roxl).expect("rotate emitted");
    assert_eq!(body[roxl - 1].opcode(), Opcode::Popst);
    assert_eq!(body[roxl + 1].opcode(), Opcode::Pushst);
    // scaling the index shifts, which clobbers the carry in between
    assert!(body[saved..roxl].iter().any(|i| i.opcode() == Opcode::Lsl));

    // 0x0101 rotated left with the carry set
    let base = vm.address_of("main.words").expect("array allocated");
    assert_eq!(vm.memory().read_word(base + 2).expect("in range"), 0x0203);
}

#[test]
fn rotate_of_a_simple_operand_or_without_carry_skips_the_status_save() {
    let mut tree = PtProgram::new("rotate");
    let bytes = array(&mut tree, "main.bytes", DataType::ArrayUB, &[129.0, 0.0]);
    let words = array(&mut tree, "main.words", DataType::ArrayUW, &[0.0, 32769.0]);
    let v = variable(&mut tree, "main.v", DataType::UWord, Some(16384.0));
    let i = variable(&mut tree, "main.i", DataType::UByte, Some(0.0));

    let clear = builtin_stmt(&mut tree, "clear_carry", Vec::new());
    let simple_index = tree.ident(DataType::UByte, "main.i");
    let byte = tree.expr(
        NodeKind::ArrayIndexer {
            name: "main.bytes".to_string(),
            split: false,
            index: simple_index,
        },
        DataType::UByte,
    );
    let rol_simple = builtin_stmt(&mut tree, "rol", vec![byte]);
    let index = computed_index(&mut tree);
    let word = element(&mut tree, "main.words", false, index);
    let rol2_computed = builtin_stmt(&mut tree, "rol2", vec![word]);
    let set = builtin_stmt(&mut tree, "set_carry", Vec::new());
    let whole = tree.ident(DataType::UWord, "main.v");
    let rol_memory = builtin_stmt(&mut tree, "rol", vec![whole]);

    let (program, vm) = run_start(
        tree,
        vec![bytes, words, v, i],
        vec![clear, rol_simple, rol2_computed, set, rol_memory],
    );
    let body = sub_instructions(&program, "main.start");
    assert!(opcodes(&body, &[Opcode::Pushst, Opcode::Popst]).is_empty());
    assert!(body.iter().any(|i| i.opcode() == Opcode::Roxl && i.dt() == Some(IrDataType::Byte)));
    assert!(body.iter().any(|i| i.opcode() == Opcode::Rol && i.dt() == Some(IrDataType::Word)));
    assert!(body.iter().any(|i| i.opcode() == Opcode::Roxlm && i.label() == Some("main.v")));

    assert_eq!(byte_at(&vm, "main.bytes"), 0x02);
    let base = vm.address_of("main.words").expect("array allocated");
    assert_eq!(vm.memory().read_word(base + 2).expect("in range"), 0x0003);
    assert_eq!(word_at(&vm, "main.v"), 0x8001);
}

#[test]
fn rotate_of_a_split_element_goes_byte_by_byte() {
    let mut tree = PtProgram::new("rotate");
    let split = array(&mut tree, "main.split", DataType::ArrayUWSplit, &[0.0, 0.0]);
    let first = variable(&mut tree, "main.first", DataType::UWord, None);
    let second = variable(&mut tree, "main.second", DataType::UWord, None);

    let mut body = Vec::new();
    for (i, value) in [(0.0, 384.0), (1.0, 32769.0)] {
        let index = tree.number(DataType::UByte, i);
        let target = element(&mut tree, "main.split", true, index);
        let value = tree.number(DataType::UWord, value);
        body.push(store(&mut tree, target, value));
    }
    for (i, name) in [(1.0, "rol"), (0.0, "ror")] {
        body.push(builtin_stmt(&mut tree, "clear_carry", Vec::new()));
        let index = tree.number(DataType::UByte, i);
        let target = element(&mut tree, "main.split", true, index);
        body.push(builtin_stmt(&mut tree, name, vec![target]));
    }
    for (i, name) in [(0.0, "main.first"), (1.0, "main.second")] {
        let index = tree.number(DataType::UByte, i);
        let value = element(&mut tree, "main.split", true, index);
        body.push(assign(&mut tree, name, DataType::UWord, value));
    }

    let (program, vm) = run_start(tree, vec![split, first, second], body);
    let body = sub_instructions(&program, "main.start");
    let rotations: Vec<_> = body
        .iter()
        .filter(|i| matches!(i.opcode(), Opcode::Roxlm | Opcode::Roxrm))
        .map(|i| (i.opcode(), i.dt(), i.label(), i.label_offset()))
        .collect();
    let byte = Some(IrDataType::Byte);
    assert_eq!(
        rotations,
        [
            (Opcode::Roxlm, byte, Some("main.split_lsb"), Some(1)),
            (Opcode::Roxlm, byte, Some("main.split_msb"), Some(1)),
            (Opcode::Roxrm, byte, Some("main.split_msb"), None),
            (Opcode::Roxrm, byte, Some("main.split_lsb"), None),
        ]
    );
    assert!(opcodes(&body, &[Opcode::Pushst, Opcode::Popst]).is_empty());

    // 0x0180 >> 1 and 0x8001 << 1, the carry passing from one half to the other
    assert_eq!(word_at(&vm, "main.first"), 0x00c0);
    assert_eq!(word_at(&vm, "main.second"), 0x0002);
}

#[test]
fn abs_handles_the_most_negative_byte() {
    let mut tree = PtProgram::new("abs");
    let cases = [
        ("main.a", DataType::Byte, -128.0),
        ("main.b", DataType::Byte, -5.0),
        ("main.w", DataType::Word, -300.0),
        ("main.u", DataType::UByte, 200.0),
        ("main.f", DataType::Float, -2.5),
    ];
    let mut vars = Vec::new();
    let mut body = Vec::new();
    for (name, dt, value) in cases {
        vars.push(variable(&mut tree, name, dt, None));
        let arg = tree.number(dt, value);
        let call = builtin(&mut tree, "abs", dt, vec![arg]);
        body.push(assign(&mut tree, name, dt, call));
    }

    let (program, vm) = run_start(tree, vars, body);
    let body = sub_instructions(&program, "main.start");
    assert!(body.iter().any(|i| i.opcode() == Opcode::Bstpos));
    assert!(body.iter().any(|i| i.opcode() == Opcode::Fabs));

    // two's complement has no +128, the byte stays 0x80
    assert_eq!(byte_at(&vm, "main.a"), 0x80);
    assert_eq!(byte_at(&vm, "main.b"), 5);
    assert_eq!(word_at(&vm, "main.w"), 300);
    assert_eq!(byte_at(&vm, "main.u"), 200);
    assert_eq!(float_at(&vm, "main.f"), 2.5);
}

#[test]
fn sgn_yields_minus_one_zero_or_one() {
    let mut tree = PtProgram::new("sgn");
    let cases = [
        ("main.min", DataType::Byte, -128.0, 0xff),
        ("main.zero", DataType::Byte, 0.0, 0),
        ("main.uzero", DataType::UByte, 0.0, 0),
        ("main.word", DataType::Word, 300.0, 1),
        ("main.negword", DataType::Word, -300.0, 0xff),
        ("main.float", DataType::Float, -2.5, 0xff),
        ("main.fzero", DataType::Float, 0.0, 0),
    ];
    let mut vars = Vec::new();
    let mut body = Vec::new();
    for (name, dt, value, _) in cases {
        vars.push(variable(&mut tree, name, DataType::Byte, None));
        let arg = tree.number(dt, value);
        let call = builtin(&mut tree, "sgn", DataType::Byte, vec![arg]);
        body.push(assign(&mut tree, name, DataType::Byte, call));
    }

    let (_, vm) = run_start(tree, vars, body);
    for (name, _, _, expected) in cases {
        assert_eq!(byte_at(&vm, name), expected, "sgn into {}", name);
    }
}

#[test]
fn sqrt_of_integers_truncates_and_floats_stay_exact() {
    let mut tree = PtProgram::new("sqrt");
    let word_root = variable(&mut tree, "main.wr", DataType::UByte, None);
    let byte_root = variable(&mut tree, "main.br", DataType::UByte, None);
    let float_root = variable(&mut tree, "main.fr", DataType::Float, None);

    let mut body = Vec::new();
    for (name, dt, value, result) in [
        ("main.wr", DataType::UWord, 1000.0, DataType::UByte),
        ("main.br", DataType::UByte, 200.0, DataType::UByte),
        ("main.fr", DataType::Float, 6.25, DataType::Float),
    ] {
        let arg = tree.number(dt, value);
        let call = builtin(&mut tree, "sqrt", result, vec![arg]);
        body.push(assign(&mut tree, name, result, call));
    }

    let (_, vm) = run_start(tree, vec![word_root, byte_root, float_root], body);
    assert_eq!(byte_at(&vm, "main.wr"), 31);
    assert_eq!(byte_at(&vm, "main.br"), 14);
    assert_eq!(float_at(&vm, "main.fr"), 2.5);
}

#[test]
fn min_and_max_respect_signedness_and_floats() {
    let mut tree = PtProgram::new("minmax");
    let cases = [
        ("main.umin", "min", DataType::UByte, 200.0, 10.0),
        ("main.umax", "max", DataType::UByte, 200.0, 10.0),
        ("main.smin", "min", DataType::Byte, -5.0, 3.0),
        ("main.smax", "max", DataType::Byte, -5.0, 3.0),
        ("main.wmin", "min", DataType::Word, 1000.0, -1000.0),
        ("main.fmin", "min", DataType::Float, 1.5, -2.0),
        ("main.fmax", "max", DataType::Float, 1.5, -2.0),
    ];
    let mut vars = Vec::new();
    let mut body = Vec::new();
    for (name, function, dt, a, b) in cases {
        vars.push(variable(&mut tree, name, dt, None));
        let a = tree.number(dt, a);
        let b = tree.number(dt, b);
        let call = builtin(&mut tree, function, dt, vec![a, b]);
        body.push(assign(&mut tree, name, dt, call));
    }

    let (program, vm) = run_start(tree, vars, body);
    let body = sub_instructions(&program, "main.start");
    assert!(body.iter().any(|i| i.opcode() == Opcode::Bgtr));
    assert!(body.iter().any(|i| i.opcode() == Opcode::Bgtsr));
    assert!(!body.iter().any(|i| i.opcode() == Opcode::Jump));

    assert_eq!(byte_at(&vm, "main.umin"), 10);
    assert_eq!(byte_at(&vm, "main.umax"), 200);
    assert_eq!(byte_at(&vm, "main.smin"), 0xfb);
    assert_eq!(byte_at(&vm, "main.smax"), 3);
    assert_eq!(word_at(&vm, "main.wmin"), (-1000i16) as u16);
    assert_eq!(float_at(&vm, "main.fmin"), -2.0);
    assert_eq!(float_at(&vm, "main.fmax"), 1.5);
}

#[test]
fn clamp_goes_through_the_vm_per_datatype() {
    let mut tree = PtProgram::new("clamp");
    let cases = [
        ("main.ub", DataType::UByte, [200.0, 10.0, 100.0]),
        ("main.sb", DataType::Byte, [-50.0, -10.0, 10.0]),
        ("main.sw", DataType::Word, [-300.0, -100.0, 100.0]),
        ("main.uw", DataType::UWord, [1000.0, 0.0, 5000.0]),
        ("main.f", DataType::Float, [7.5, 0.0, 5.0]),
    ];
    let mut vars = Vec::new();
    let mut body = Vec::new();
    for (name, dt, values) in cases {
        vars.push(variable(&mut tree, name, dt, None));
        let args = values.iter().map(|v| tree.number(dt, *v)).collect();
        let call = builtin(&mut tree, "clamp", dt, args);
        body.push(assign(&mut tree, name, dt, call));
    }

    let (program, vm) = run_start(tree, vars, body);
    let calls: Vec<_> = sub_instructions(&program, "main.start")
        .into_iter()
        .filter(|i| i.opcode() == Opcode::Syscall)
        .filter_map(|i| i.immediate())
        .collect();
    assert_eq!(
        calls,
        [
            Syscall::ClampUByte.number(),
            Syscall::ClampByte.number(),
            Syscall::ClampWord.number(),
            Syscall::ClampUWord.number(),
            Syscall::ClampFloat.number(),
        ]
    );

    assert_eq!(byte_at(&vm, "main.ub"), 100);
    assert_eq!(byte_at(&vm, "main.sb"), 0xf6);
    assert_eq!(word_at(&vm, "main.sw"), (-100i16) as u16);
    assert_eq!(word_at(&vm, "main.uw"), 1000);
    assert_eq!(float_at(&vm, "main.f"), 5.0);
}

#[test]
fn peek_and_poke_reach_fixed_and_computed_addresses() {
    let mut tree = PtProgram::new("memory");
    let mut vars = vec![
        variable(&mut tree, "main.ptr", DataType::UWord, Some(12288.0)),
        variable(&mut tree, "main.fptr", DataType::UWord, Some(8704.0)),
    ];
    for (name, dt) in [
        ("main.byte", DataType::UByte),
        ("main.word", DataType::UWord),
        ("main.cleared", DataType::UWord),
        ("main.fixed", DataType::Float),
        ("main.computed", DataType::Float),
        ("main.old", DataType::UByte),
        ("main.new", DataType::UByte),
    ] {
        vars.push(variable(&mut tree, name, dt, None));
    }

    let fixed = |tree: &mut PtProgram, address: f64| tree.number(DataType::UWord, address);
    let mut body = Vec::new();

    let (address, value) = (fixed(&mut tree, 8192.0), tree.number(DataType::UByte, 77.0));
    body.push(builtin_stmt(&mut tree, "poke", vec![address, value]));
    let address = fixed(&mut tree, 8192.0);
    let peek = builtin(&mut tree, "peek", DataType::UByte, vec![address]);
    body.push(assign(&mut tree, "main.byte", DataType::UByte, peek));

    let (pointer, value) = (tree.ident(DataType::UWord, "main.ptr"), tree.number(DataType::UWord, 4660.0));
    body.push(builtin_stmt(&mut tree, "pokew", vec![pointer, value]));
    let pointer = tree.ident(DataType::UWord, "main.ptr");
    let peek = builtin(&mut tree, "peekw", DataType::UWord, vec![pointer]);
    body.push(assign(&mut tree, "main.word", DataType::UWord, peek));

    let (pointer, zero) = (tree.ident(DataType::UWord, "main.ptr"), tree.number(DataType::UByte, 0.0));
    body.push(builtin_stmt(&mut tree, "poke", vec![pointer, zero]));
    let pointer = tree.ident(DataType::UWord, "main.ptr");
    let peek = builtin(&mut tree, "peekw", DataType::UWord, vec![pointer]);
    body.push(assign(&mut tree, "main.cleared", DataType::UWord, peek));

    let (address, value) = (fixed(&mut tree, 8448.0), tree.number(DataType::Float, 1.25));
    body.push(builtin_stmt(&mut tree, "pokef", vec![address, value]));
    let address = fixed(&mut tree, 8448.0);
    let peek = builtin(&mut tree, "peekf", DataType::Float, vec![address]);
    body.push(assign(&mut tree, "main.fixed", DataType::Float, peek));

    let (pointer, value) = (tree.ident(DataType::UWord, "main.fptr"), tree.number(DataType::Float, 2.5));
    body.push(builtin_stmt(&mut tree, "pokef", vec![pointer, value]));
    let pointer = tree.ident(DataType::UWord, "main.fptr");
    let peek = builtin(&mut tree, "peekf", DataType::Float, vec![pointer]);
    body.push(assign(&mut tree, "main.computed", DataType::Float, peek));

    let (address, value) = (fixed(&mut tree, 8192.0), tree.number(DataType::UByte, 5.0));
    let swap = builtin(&mut tree, "pokemon", DataType::UByte, vec![address, value]);
    body.push(assign(&mut tree, "main.old", DataType::UByte, swap));
    let address = fixed(&mut tree, 8192.0);
    let peek = builtin(&mut tree, "peek", DataType::UByte, vec![address]);
    body.push(assign(&mut tree, "main.new", DataType::UByte, peek));

    let (program, vm) = run_start(tree, vars, body);
    let body = sub_instructions(&program, "main.start");
    for op in [Opcode::Storei, Opcode::Storezi, Opcode::Loadi] {
        assert!(body.iter().any(|i| i.opcode() == op), "{:?} emitted", op);
    }

    assert_eq!(byte_at(&vm, "main.byte"), 77);
    assert_eq!(word_at(&vm, "main.word"), 0x1234);
    assert_eq!(word_at(&vm, "main.cleared"), 0x1200);
    assert_eq!(float_at(&vm, "main.fixed"), 1.25);
    assert_eq!(float_at(&vm, "main.computed"), 2.5);
    assert_eq!(byte_at(&vm, "main.old"), 77);
    assert_eq!(byte_at(&vm, "main.new"), 5);
}

#[test]
fn mkword_lsb_and_msb_take_words_apart_and_back() {
    let mut tree = PtProgram::new("bytes");
    let mut vars = vec![variable(&mut tree, "main.w", DataType::UWord, Some(43981.0))];
    for (name, dt) in [
        ("main.joined", DataType::UWord),
        ("main.widened", DataType::UWord),
        ("main.lo", DataType::UByte),
        ("main.hi", DataType::UByte),
        ("main.var_lo", DataType::UByte),
        ("main.byte_lo", DataType::UByte),
        ("main.byte_hi", DataType::UByte),
    ] {
        vars.push(variable(&mut tree, name, dt, None));
    }

    let mut body = Vec::new();
    for (name, msb, lsb) in [("main.joined", 18.0, 52.0), ("main.widened", 0.0, 52.0)] {
        let msb = tree.number(DataType::UByte, msb);
        let lsb = tree.number(DataType::UByte, lsb);
        let call = builtin(&mut tree, "mkword", DataType::UWord, vec![msb, lsb]);
        body.push(assign(&mut tree, name, DataType::UWord, call));
    }
    for (name, function, dt, value) in [
        ("main.lo", "lsb", DataType::UWord, 4660.0),
        ("main.hi", "msb", DataType::UWord, 4660.0),
        ("main.byte_lo", "lsb", DataType::UByte, 153.0),
        ("main.byte_hi", "msb", DataType::UByte, 153.0),
    ] {
        let arg = tree.number(dt, value);
        let call = builtin(&mut tree, function, DataType::UByte, vec![arg]);
        body.push(assign(&mut tree, name, DataType::UByte, call));
    }
    let w = tree.ident(DataType::UWord, "main.w");
    let call = builtin(&mut tree, "lsb", DataType::UByte, vec![w]);
    body.push(assign(&mut tree, "main.var_lo", DataType::UByte, call));

    let (program, vm) = run_start(tree, vars, body);
    let body = sub_instructions(&program, "main.start");
    for op in [Opcode::Concat, Opcode::Ext, Opcode::Lsig, Opcode::Msig] {
        assert!(body.iter().any(|i| i.opcode() == op), "{:?} emitted", op);
    }

    assert_eq!(word_at(&vm, "main.joined"), 0x1234);
    assert_eq!(word_at(&vm, "main.widened"), 0x0034);
    assert_eq!(byte_at(&vm, "main.lo"), 0x34);
    assert_eq!(byte_at(&vm, "main.hi"), 0x12);
    assert_eq!(byte_at(&vm, "main.var_lo"), 0xcd);
    assert_eq!(byte_at(&vm, "main.byte_lo"), 0x99);
    assert_eq!(byte_at(&vm, "main.byte_hi"), 0);
}

#[test]
fn setlsb_and_setmsb_overwrite_one_byte_in_place() {
    let mut tree = PtProgram::new("setbytes");
    let vars = vec![
        variable(&mut tree, "main.w", DataType::UWord, Some(4660.0)),
        array(&mut tree, "main.words", DataType::ArrayUW, &[4369.0, 8738.0]),
        array(&mut tree, "main.split", DataType::ArrayUWSplit, &[13107.0, 17476.0]),
    ];

    let mut body = Vec::new();
    for (function, value) in [("setlsb", 153.0), ("setmsb", 0.0)] {
        let target = tree.ident(DataType::UWord, "main.w");
        let value = tree.number(DataType::UByte, value);
        body.push(builtin_stmt(&mut tree, function, vec![target, value]));
    }
    for (function, array, split, index, value) in [
        ("setmsb", "main.words", false, 1.0, 171.0),
        ("setlsb", "main.words", false, 0.0, 0.0),
        ("setlsb", "main.split", true, 1.0, 85.0),
        ("setmsb", "main.split", true, 0.0, 0.0),
    ] {
        let index = tree.number(DataType::UByte, index);
        let target = element(&mut tree, array, split, index);
        let value = tree.number(DataType::UByte, value);
        body.push(builtin_stmt(&mut tree, function, vec![target, value]));
    }

    let (_, vm) = run_start(tree, vars, body);
    assert_eq!(word_at(&vm, "main.w"), 0x0099);
    let words = vm.address_of("main.words").expect("array allocated");
    assert_eq!(vm.memory().read_word(words).expect("in range"), 0x1100);
    assert_eq!(vm.memory().read_word(words + 2).expect("in range"), 0xab22);
    let lsb = vm.address_of("main.split_lsb").expect("low half allocated");
    let msb = vm.address_of("main.split_msb").expect("high half allocated");
    let split_word = |i: u32| {
        let lo = vm.memory().read_byte(lsb + i).expect("in range") as u16;
        let hi = vm.memory().read_byte(msb + i).expect("in range") as u16;
        hi << 8 | lo
    };
    assert_eq!(split_word(0), 0x0033);
    assert_eq!(split_word(1), 0x4455);
}

#[test]
fn memory_hands_out_one_slab_per_name() {
    let mut tree = PtProgram::new("slabs");
    let vars = vec![
        variable(&mut tree, "main.p", DataType::UWord, None),
        variable(&mut tree, "main.q", DataType::UWord, None),
    ];
    let mut body = Vec::new();
    for name in ["main.p", "main.q"] {
        let slab = tree.expr(
            NodeKind::StringLiteral {
                value: "buf".to_string(),
                label: "main.string_buf".to_string(),
            },
            DataType::Str,
        );
        let size = tree.number(DataType::UWord, 100.0);
        let align = tree.number(DataType::UByte, 0.0);
        let call = builtin(&mut tree, "memory", DataType::UWord, vec![slab, size, align]);
        body.push(assign(&mut tree, name, DataType::UWord, call));
    }

    let (program, vm) = run_start(tree, vars, body);
    let slabs: Vec<_> = program.symbols.slabs().collect();
    assert_eq!(slabs.len(), 1);
    assert_eq!(slabs[0].name, "slabs.memoryslab_buf");
    assert_eq!(slabs[0].size, 100);

    let address = vm.address_of("slabs.memoryslab_buf").expect("slab allocated");
    assert_eq!(word_at(&vm, "main.p") as u32, address);
    assert_eq!(word_at(&vm, "main.q") as u32, address);
}

/// `main.result = main.a > 5 <op> main.b < 3` and `main.called = main.a > 5 <op> main.touch()`
fn logic_program(op: BinaryOperator, a: f64, b: f64) -> PtProgram {
    let mut tree = PtProgram::new("logic");
    let vars = vec![
        variable(&mut tree, "main.a", DataType::UByte, Some(a)),
        variable(&mut tree, "main.b", DataType::UByte, Some(b)),
        variable(&mut tree, "main.result", DataType::UByte, None),
        variable(&mut tree, "main.called", DataType::UByte, None),
        variable(&mut tree, "main.touched", DataType::UByte, Some(0.0)),
    ];

    let counter = tree.ident(DataType::UByte, "main.touched");
    let one = tree.number(DataType::UByte, 1.0);
    let count = tree.stmt(NodeKind::AugmentedAssignment {
        target: counter,
        op: BinaryOperator::Add,
        value: one,
    });
    let one = tree.number(DataType::UByte, 1.0);
    let ret = tree.stmt(NodeKind::Return { value: Some(one) });
    let touch = sub(&mut tree, "main.touch", Vec::new(), Some(DataType::UByte), vec![count, ret]);

    let comparison = |tree: &mut PtProgram, name: &str, op: BinaryOperator, value: f64| {
        let left = tree.ident(DataType::UByte, name);
        let right = tree.number(DataType::UByte, value);
        tree.expr(NodeKind::Binary { left, op, right }, DataType::Bool)
    };
    let left = comparison(&mut tree, "main.a", BinaryOperator::Gt, 5.0);
    let right = comparison(&mut tree, "main.b", BinaryOperator::Lt, 3.0);
    let both = tree.expr(NodeKind::Binary { left, op, right }, DataType::Bool);
    let result = assign(&mut tree, "main.result", DataType::UByte, both);

    let left = comparison(&mut tree, "main.a", BinaryOperator::Gt, 5.0);
    let right = tree.expr(
        NodeKind::FunctionCall {
            target: "main.touch".to_string(),
            args: Vec::new(),
        },
        DataType::UByte,
    );
    let guarded = tree.expr(NodeKind::Binary { left, op, right }, DataType::Bool);
    let called = assign(&mut tree, "main.called", DataType::UByte, guarded);

    let start = sub(&mut tree, "main.start", Vec::new(), None, vec![result, called]);
    let mut children = vars;
    children.extend([start, touch]);
    main_block(&mut tree, children);
    tree
}

#[test]
fn and_or_values_short_circuit() {
    use BinaryOperator::{And, Or};
    // op, a, b, result, whether main.touch() ran
    let cases = [
        (And, 9.0, 1.0, 1, 1),
        (And, 9.0, 7.0, 0, 1),
        (And, 2.0, 1.0, 0, 0),
        (Or, 2.0, 1.0, 1, 1),
        (Or, 2.0, 7.0, 0, 1),
        (Or, 9.0, 7.0, 1, 0),
    ];
    for (op, a, b, result, touched) in cases {
        let program = lower(&logic_program(op, a, b), options(false));
        let body = sub_instructions(&program, "main.start");
        let branch = if op == And { Opcode::Beq } else { Opcode::Bne };
        assert_eq!(body.iter().filter(|i| i.opcode() == branch).count(), 2);
        assert!(body.iter().any(|i| i.opcode() == Opcode::Loadr));

        let vm = run(&program);
        let case = format!("{:?} with a={} b={}", op, a, b);
        assert_eq!(byte_at(&vm, "main.result"), result, "{}", case);
        assert_eq!(byte_at(&vm, "main.touched"), touched, "{}", case);
        assert_eq!(byte_at(&vm, "main.called"), if op == And { touched } else { 1 }, "{}", case);
    }
}

#[test]
fn missing_binary_includes_are_reported_with_their_positions() {
    let mut tree = PtProgram::new("include");
    let missing = |file: &str| BinarySource {
        file: file.to_string(),
        offset: 0,
        length: None,
    };
    let in_block = Position::new("include.p8", 3, 1, 30);
    let in_sub = Position::new("include.p8", 7, 5, 40);
    let block_include = tree.add(
        NodeKind::InlineBinary {
            source: missing("/nonexistent/lowbyte/table.bin"),
        },
        None,
        in_block.clone(),
    );
    let sub_include = tree.add(
        NodeKind::InlineBinary {
            source: missing("/nonexistent/lowbyte/sprite.bin"),
        },
        None,
        in_sub.clone(),
    );
    let start = sub(&mut tree, "main.start", Vec::new(), None, vec![sub_include]);
    main_block(&mut tree, vec![block_include, start]);

    let errors = lower_program(&tree, options(false)).err().expect("missing files are reported");
    assert_eq!(errors.len(), 2);
    for error in &errors {
        assert_eq!(error.kind(), ErrorKind::Io);
        assert!(error.message().contains("cannot include binary file"), "{}", error.message());
    }
    let mut positions: Vec<_> = errors.iter().filter_map(|e| e.position()).collect();
    positions.sort_by_key(|p| p.line);
    assert_eq!(positions, [in_block, in_sub]);
}
