//! file: core/src/ir/textual/writer.rs
//! description: renders an `IrProgram` as a textual IR document.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::{IoError, LowbyteErrorExt, boxed};
use crate::ir::chunk::{ChunkKind, IrChunk};
use crate::ir::options::{CompilationOptions, format_ranges};
use crate::ir::program::{BlockItem, IrAsmSubroutine, IrBlock, IrProgram, IrSubroutine};
use crate::ir::symbols::{ArrayElement, IrSymbolTable, StaticVariable, VariableInit};
use crate::ir::textual::IR_FILE_EXTENSION;
use crate::types::DataType;

const BYTES_PER_LINE: usize = 16;

struct IrWriter {
    out: String,
}

impl IrWriter {
    fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn options(&mut self, options: &CompilationOptions) {
        self.line("<OPTIONS>");
        self.line(format!("compTarget={}", options.comp_target));
        self.line(format!("output={}", options.output.name()));
        self.line(format!("launcher={}", options.launcher.name()));
        self.line(format!("zeropage={}", options.zeropage.name()));
        self.line(format!("zpReserved={}", format_ranges(&options.zp_reserved)));
        self.line(format!("zpAllowed={}", format_ranges(&options.zp_allowed)));
        self.line(format!("loadAddress=${:04x}", options.load_address));
        self.line(format!("optimize={}", options.optimize));
        self.line(format!("floats={}", options.floats));
        self.line(format!("dontReinitGlobals={}", options.dont_reinit_globals));
        self.line(format!("outputDir={}", options.output_dir.display()));
        self.line("</OPTIONS>");
    }

    fn symbols(&mut self, symbols: &IrSymbolTable) {
        self.line("<ASMSYMBOLS>");
        for (name, value) in symbols.asm_symbols() {
            self.line(format!("{}={}", name, value));
        }
        self.line("</ASMSYMBOLS>");

        self.line("<VARIABLESNOINIT>");
        for var in symbols.variables().filter(|v| v.init.is_none()) {
            self.line(format!("{} {} zp={} align={}", type_text(var.dt, var.length), var.name, var.zp_wish.name(), var.align));
        }
        self.line("</VARIABLESNOINIT>");

        self.line("<VARIABLESWITHINIT>");
        for var in symbols.variables() {
            if let Some(init) = &var.init {
                self.line(format!(
                    "{} {}={} zp={} align={}",
                    type_text(var.dt, var.length),
                    var.name,
                    init_text(var, init),
                    var.zp_wish.name(),
                    var.align
                ));
            }
        }
        self.line("</VARIABLESWITHINIT>");

        self.line("<MEMORYMAPPEDVARIABLES>");
        for var in symbols.memory_mapped() {
            self.line(format!("@{} {}=${:04x}", type_text(var.dt, var.length), var.name, var.address));
        }
        self.line("</MEMORYMAPPEDVARIABLES>");

        self.line("<MEMORYSLABS>");
        for slab in symbols.slabs() {
            self.line(format!("{} {} {}", slab.name, slab.size, slab.align));
        }
        self.line("</MEMORYSLABS>");
    }

    fn block(&mut self, block: &IrBlock) {
        let address = block.options.address.map(|a| format!("${:04x}", a)).unwrap_or_default();
        self.line(format!(
            "<BLOCK NAME=\"{}\" ADDRESS=\"{}\" LIBRARY=\"{}\" FORCEOUTPUT=\"{}\" NOPREFIXING=\"{}\" ALIGN=\"{}\" POS=\"{}\">",
            block.name,
            address,
            block.library,
            block.options.force_output,
            block.options.no_symbol_prefixing,
            block.options.alignment.name(),
            block.position
        ));
        for item in &block.children {
            match item {
                BlockItem::Sub(sub) => self.subroutine(sub),
                BlockItem::AsmSub(asmsub) => self.asm_subroutine(asmsub),
                BlockItem::Chunk(chunk) => self.chunk(chunk),
            }
        }
        self.line("</BLOCK>");
    }

    fn subroutine(&mut self, sub: &IrSubroutine) {
        let return_type = sub.return_type.map(|dt| dt.ir_name()).unwrap_or_default();
        self.line(format!("<SUB NAME=\"{}\" RETURNTYPE=\"{}\" POS=\"{}\">", sub.label, return_type, sub.position));
        self.line("<PARAMS>");
        for param in &sub.parameters {
            self.line(format!("{} {}", param.dt.ir_name(), param.name));
        }
        self.line("</PARAMS>");
        for chunk in &sub.chunks {
            self.chunk(chunk);
        }
        self.line("</SUB>");
    }

    fn asm_subroutine(&mut self, asmsub: &IrAsmSubroutine) {
        let address = asmsub.address.map(|a| format!("${:04x}", a)).unwrap_or_default();
        let clobbers = asmsub.clobbers.iter().map(|c| c.to_string()).collect::<Vec<_>>().join(",");
        let returns = asmsub
            .returns
            .iter()
            .map(|r| format!("{}@{}", r.dt.ir_name(), r.location))
            .collect::<Vec<_>>()
            .join(",");
        self.line(format!(
            "<ASMSUB NAME=\"{}\" ADDRESS=\"{}\" CLOBBERS=\"{}\" RETURNS=\"{}\" POS=\"{}\">",
            asmsub.label, address, clobbers, returns, asmsub.position
        ));
        self.line("<ASMPARAMS>");
        for param in &asmsub.parameters {
            self.line(format!("{} {}", param.dt.ir_name(), param.location));
        }
        self.line("</ASMPARAMS>");
        self.chunk(&asmsub.asm_chunk);
        self.line("</ASMSUB>");
    }

    fn chunk(&mut self, chunk: &IrChunk) {
        let label = chunk.label.as_deref().unwrap_or_default();
        match &chunk.kind {
            ChunkKind::Code(instructions) => {
                self.line(format!("<CODE LABEL=\"{}\">", label));
                for ins in instructions {
                    self.line(ins.to_string());
                }
                self.line("</CODE>");
            }
            ChunkKind::InlineAsm { assembly, is_ir } => {
                self.line(format!("<ASM LABEL=\"{}\" IR=\"{}\">", label, is_ir));
                for text in assembly.split('\n') {
                    self.line(text);
                }
                self.line("</ASM>");
            }
            ChunkKind::InlineBinary { data, source } => {
                match source {
                    Some(source) => self.line(format!(
                        "<BYTES LABEL=\"{}\" FILE=\"{}\" OFFSET=\"{}\" LENGTH=\"{}\">",
                        label,
                        source.file,
                        source.offset,
                        source.length.map(|l| l.to_string()).unwrap_or_default()
                    )),
                    None => self.line(format!("<BYTES LABEL=\"{}\">", label)),
                }
                for row in data.chunks(BYTES_PER_LINE) {
                    self.line(row.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" "));
                }
                self.line("</BYTES>");
            }
        }
    }
}

fn type_text(dt: DataType, length: Option<u32>) -> String {
    match length {
        Some(n) if dt.is_pass_by_reference() => format!("{}[{}]", dt.ir_name(), n),
        _ => dt.ir_name().to_string(),
    }
}

fn number_text(dt: DataType, value: f64) -> String {
    if dt == DataType::Float || dt == DataType::ArrayF {
        format!("{:?}", value)
    } else {
        format!("{}", value as i64)
    }
}

fn init_text(var: &StaticVariable, init: &VariableInit) -> String {
    match init {
        VariableInit::Scalar(value) => number_text(var.dt, *value),
        VariableInit::Array(elements) => elements
            .iter()
            .map(|element| match element {
                ArrayElement::Number(value) => number_text(var.dt, *value),
                ArrayElement::AddressOf(name) => format!("@{}", name),
            })
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Render the whole program as text.
pub fn write_program(program: &IrProgram) -> String {
    let mut writer = IrWriter { out: String::new() };
    writer.line("<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    writer.line(format!("<PROGRAM NAME=\"{}\">", program.name));
    writer.options(&program.options);
    writer.symbols(&program.symbols);
    writer.line("<INITGLOBALS>");
    writer.chunk(&program.global_inits);
    writer.line("</INITGLOBALS>");
    for block in &program.blocks {
        writer.block(block);
    }
    writer.line("</PROGRAM>");
    writer.out
}

/// `<outputDir>/<name>.p8ir`
pub fn default_output_path(program: &IrProgram) -> PathBuf {
    program.options.output_dir.join(format!("{}.{}", program.name, IR_FILE_EXTENSION))
}

pub fn write_program_file(program: &IrProgram, path: &Path) -> Result<(), Box<dyn LowbyteErrorExt>> {
    std::fs::write(path, write_program(program)).map_err(|e| boxed(IoError::new(path.display().to_string(), e.to_string())))?;
    info!("wrote IR program '{}' to {}", program.name, path.display());
    Ok(())
}
