use std::path::PathBuf;

use lowbyte_core::ir::BlockItem;
use lowbyte_core::ir::chunk::ChunkKind;
use lowbyte_core::ir::symbols::{ArrayElement, VariableInit};
use lowbyte_core::ir::textual::default_output_path;
use lowbyte_core::{ErrorKind, read_program, read_program_file, write_program, write_program_file};

const FULL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<PROGRAM NAME="full">
<OPTIONS>
compTarget=virtual
output=PRG
launcher=NONE
zeropage=DONTUSE
zpReserved=0-1,250-255
zpAllowed=
loadAddress=$0000
optimize=false
floats=true
dontReinitGlobals=false
outputDir=.
</OPTIONS>
<ASMSYMBOLS>
main.CHROUT=$ffd2
</ASMSYMBOLS>
<VARIABLESNOINIT>
ubyte main.add.a zp=DONTCARE align=0
ubyte main.add.b zp=DONTCARE align=0
uword_split[2] main.split zp=DONTCARE align=0
</VARIABLESNOINIT>
<VARIABLESWITHINIT>
ubyte[3] main.bytes=1,2,3 zp=DONTCARE align=0
ubyte main.count=9 zp=PREFER_ZEROPAGE align=0
float main.pi=3.25 zp=DONTCARE align=0
uword[2] main.ptrs=@main.bytes,@main.pi zp=DONTCARE align=2
</VARIABLESWITHINIT>
<MEMORYMAPPEDVARIABLES>
@ubyte main.border=$d020
@ubyte[4] main.screen=$0400
</MEMORYMAPPEDVARIABLES>
<MEMORYSLABS>
main.buffer 256 1
</MEMORYSLABS>
<INITGLOBALS>
<CODE LABEL="">
load.b r1,#9
storem.b r1,main.count
</CODE>
</INITGLOBALS>
<BLOCK NAME="main" ADDRESS="" LIBRARY="false" FORCEOUTPUT="false" NOPREFIXING="false" ALIGN="NONE" POS="[full.p8: line 1 col 1-4]">
<SUB NAME="main.start" RETURNTYPE="" POS="[full.p8: line 3 col 5-9]">
<PARAMS>
</PARAMS>
<CODE LABEL="main.start">
load.b r2,#3
storem.b r2,main.add.a
load.b r3,#4
storem.b r3,main.add.b
call.b r4,main.add
storem.b r4,@53280
load.f fr1,#1.5
storem.f fr1,main.pi
load.w r5,#0
storem.w r5,main.ptrs+2
</CODE>
<ASM LABEL="" IR="true">
nop
</ASM>
<CODE LABEL="main.start.done">
return
</CODE>
</SUB>
<SUB NAME="main.add" RETURNTYPE="ubyte" POS="[full.p8: line 10 col 5-7]">
<PARAMS>
ubyte main.add.a
ubyte main.add.b
</PARAMS>
<CODE LABEL="main.add">
loadm.b r1,main.add.a
loadm.b r2,main.add.b
addr.b r1,r2
returnr.b r1
</CODE>
</SUB>
<ASMSUB NAME="main.chrout" ADDRESS="$ffd2" CLOBBERS="A,X" RETURNS="" POS="[full.p8: line 20 col 5-10]">
<ASMPARAMS>
ubyte A
</ASMPARAMS>
<ASM LABEL="" IR="false">
jmp $ffd2
</ASM>
</ASMSUB>
<BYTES LABEL="main.blob">
01 02 03
</BYTES>
</BLOCK>
</PROGRAM>
"#;

#[test]
fn writer_reproduces_a_document_it_can_read() {
    let program = read_program(FULL).expect("document parses");
    assert_eq!(write_program(&program), FULL);
}

#[test]
fn reader_builds_the_program_model() {
    let program = read_program(FULL).expect("document parses");
    assert_eq!(program.name, "full");
    assert_eq!(program.options.zp_reserved, vec![(0, 1), (250, 255)]);
    assert_eq!(program.blocks.len(), 1);
    assert_eq!(program.subroutines().count(), 2);

    let ptrs = program.symbols.variable("main.ptrs").expect("declared");
    assert_eq!(ptrs.align, 2);
    assert_eq!(
        ptrs.init,
        Some(VariableInit::Array(vec![
            ArrayElement::AddressOf("main.bytes".to_string()),
            ArrayElement::AddressOf("main.pi".to_string()),
        ]))
    );
    assert_eq!(program.symbols.slab("main.buffer").map(|s| s.size), Some(256));

    let block = &program.blocks[0];
    assert!(matches!(block.children.last(), Some(BlockItem::Chunk(chunk))
        if matches!(&chunk.kind, ChunkKind::InlineBinary { data, source: None } if data == &[1, 2, 3])));
    let asmsub = block
        .children
        .iter()
        .find_map(|item| match item {
            BlockItem::AsmSub(asmsub) => Some(asmsub),
            _ => None,
        })
        .expect("asmsub present");
    assert_eq!(asmsub.address, Some(0xffd2));
    assert_eq!(asmsub.clobbers.len(), 2);
}

#[test]
fn reader_links_fall_through_chunks() {
    let program = read_program(FULL).expect("document parses");
    let start = program.subroutines().next().expect("main.start");
    assert_eq!(start.chunks[0].next, Some(1));
    assert_eq!(start.chunks[1].next, Some(2));
    assert_eq!(start.chunks[2].next, None);
}

#[test]
fn file_round_trip_through_a_temp_dir() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut program = read_program(FULL).expect("document parses");
    program.options.output_dir = dir.path().to_path_buf();

    let path = default_output_path(&program);
    assert_eq!(path, dir.path().join("full.p8ir"));
    write_program_file(&program, &path).expect("written");

    let reread = read_program_file(&path).expect("read back");
    assert_eq!(reread, program);
}

#[test]
fn missing_file_is_an_io_error() {
    let err = read_program_file(&PathBuf::from("/definitely/not/here.p8ir")).expect_err("no such file");
    assert_eq!(err.kind(), ErrorKind::Io);
}

fn parse_error(text: &str) -> String {
    let err = read_program(text).expect_err("document must be rejected");
    assert_eq!(err.kind(), ErrorKind::Parse);
    err.message()
}

#[test]
fn sections_must_come_in_order() {
    let swapped = FULL.replacen("<ASMSYMBOLS>\nmain.CHROUT=$ffd2\n</ASMSYMBOLS>\n", "", 1);
    let message = parse_error(&swapped);
    assert!(message.contains("missing section <ASMSYMBOLS>"), "{}", message);
}

#[test]
fn unknown_opcode_names_its_line() {
    let broken = FULL.replacen("load.b r2,#3", "frob.b r2,#3", 1);
    let message = parse_error(&broken);
    assert!(message.contains("unknown opcode 'frob'"), "{}", message);
    assert!(message.contains("frob.b r2,#3"), "{}", message);
}

#[test]
fn undefined_symbols_are_rejected() {
    let broken = FULL.replacen("storem.b r2,main.add.a", "storem.b r2,main.nowhere", 1);
    let message = parse_error(&broken);
    assert!(message.contains("undefined symbol 'main.nowhere'"), "{}", message);
}

#[test]
fn duplicate_labels_are_rejected() {
    let broken = FULL.replacen("<CODE LABEL=\"main.start.done\">", "<CODE LABEL=\"main.add\">", 1);
    let message = parse_error(&broken);
    assert!(message.contains("duplicate label"), "{}", message);
}

#[test]
fn variables_must_be_scoped() {
    let broken = FULL.replacen("ubyte main.add.a zp", "ubyte counter zp", 1);
    let message = parse_error(&broken);
    assert!(message.contains("not scoped"), "{}", message);
}

#[test]
fn byte_immediates_are_range_checked() {
    let broken = FULL.replacen("load.b r2,#3", "load.b r2,#300", 1);
    let message = parse_error(&broken);
    assert!(message.contains("out of byte range"), "{}", message);
}
