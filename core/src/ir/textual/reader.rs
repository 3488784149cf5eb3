//! file: core/src/ir/textual/reader.rs
//! description: parses a textual IR document back into an `IrProgram`.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{IoError, IrParseError, LowbyteErrorExt, boxed};
use crate::ir::chunk::{BinarySource, IrChunk};
use crate::ir::instruction::IrInstruction;
use crate::ir::options::{CompilationOptions, Launcher, OutputType, ZeropageType, parse_ranges};
use crate::ir::program::{
    BlockAlignment, BlockItem, BlockOptions, IrAsmParameter, IrAsmSubroutine, IrBlock, IrParameter, IrProgram,
    IrSubroutine, RegisterOrFlag,
};
use crate::ir::symbols::{ArrayElement, IrSymbolTable, MemoryMappedVariable, MemorySlab, StaticVariable, VariableInit};
use crate::ir::textual::document::{Element, parse_document};
use crate::ir::textual::parse_int;
use crate::location::Position;
use crate::types::{DataType, ZeropageWish};

const SECTIONS: [&str; 7] = [
    "OPTIONS",
    "ASMSYMBOLS",
    "VARIABLESNOINIT",
    "VARIABLESWITHINIT",
    "MEMORYMAPPEDVARIABLES",
    "MEMORYSLABS",
    "INITGLOBALS",
];

type ParseResult<T> = Result<T, IrParseError>;

fn line_error(message: impl Into<String>, line: usize, text: &str) -> IrParseError {
    IrParseError::new(message).at_line(line, text)
}

/// Parse a textual IR document, link its chunks and validate the result.
pub fn read_program(text: &str) -> Result<IrProgram, Box<dyn LowbyteErrorExt>> {
    let root = parse_document(text).map_err(boxed)?;
    let program = build_program(&root).map_err(boxed)?;
    debug!(
        "read IR program '{}': {} blocks, {} instructions",
        program.name,
        program.blocks.len(),
        program.instruction_count()
    );
    Ok(program)
}

pub fn read_program_file(path: &Path) -> Result<IrProgram, Box<dyn LowbyteErrorExt>> {
    let text =
        std::fs::read_to_string(path).map_err(|e| boxed(IoError::new(path.display().to_string(), e.to_string())))?;
    info!("reading IR program from {}", path.display());
    read_program(&text)
}

fn build_program(root: &Element) -> ParseResult<IrProgram> {
    if root.name != "PROGRAM" {
        return Err(line_error("root element must be <PROGRAM>", root.line, &root.name));
    }
    let name = root.required_attr("NAME")?.to_string();

    let elements: Vec<&Element> = root.elements().collect();
    for (idx, expected) in SECTIONS.iter().enumerate() {
        match elements.get(idx) {
            Some(element) if element.name == *expected => {}
            Some(element) => {
                return Err(line_error(
                    format!("missing section <{}>", expected),
                    element.line,
                    &format!("<{}>", element.name),
                ));
            }
            None => return Err(IrParseError::new(format!("missing section <{}>", expected))),
        }
    }

    let options = parse_options(elements[0])?;
    let mut symbols = IrSymbolTable::new();
    parse_asm_symbols(elements[1], &mut symbols)?;
    parse_variables(elements[2], false, &mut symbols)?;
    parse_variables(elements[3], true, &mut symbols)?;
    parse_memory_mapped(elements[4], &mut symbols)?;
    parse_slabs(elements[5], &mut symbols)?;

    let mut program = IrProgram::new(name, options, symbols);
    if let Some(code) = elements[6].elements().next() {
        program.global_inits = parse_chunk(code)?;
    }

    for element in &elements[SECTIONS.len()..] {
        if element.name != "BLOCK" {
            return Err(line_error("expected <BLOCK>", element.line, &format!("<{}>", element.name)));
        }
        program.blocks.push(parse_block(element)?);
    }

    program.link_chunks();
    program.validate().map_err(IrParseError::new)?;
    Ok(program)
}

fn parse_bool(value: &str, line: usize, text: &str) -> ParseResult<bool> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(line_error(format!("invalid boolean '{}'", value), line, text)),
    }
}

fn parse_u32(value: &str, line: usize, text: &str) -> ParseResult<u32> {
    parse_int(value)
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| line_error(format!("invalid number '{}'", value), line, text))
}

fn parse_number(value: &str, dt: DataType, line: usize, text: &str) -> ParseResult<f64> {
    let parsed = if dt == DataType::Float || dt == DataType::ArrayF {
        value.trim().parse::<f64>().ok()
    } else {
        parse_int(value).map(|v| v as f64)
    };
    parsed.ok_or_else(|| line_error(format!("invalid number '{}'", value), line, text))
}

fn parse_position(value: &str, line: usize) -> ParseResult<Position> {
    Position::parse(value).ok_or_else(|| line_error(format!("bad position '{}'", value), line, value))
}

fn parse_options(element: &Element) -> ParseResult<CompilationOptions> {
    let mut options = CompilationOptions::default();
    for (line, text) in element.content_lines() {
        let (key, value) = text
            .split_once('=')
            .ok_or_else(|| line_error("expected key=value", line, text))?;
        let value = value.trim();
        let invalid = || line_error(format!("invalid value for option {}", key), line, text);
        match key.trim() {
            "compTarget" => options.comp_target = value.to_string(),
            "output" => options.output = OutputType::from_name(value).ok_or_else(invalid)?,
            "launcher" => options.launcher = Launcher::from_name(value).ok_or_else(invalid)?,
            "zeropage" => options.zeropage = ZeropageType::from_name(value).ok_or_else(invalid)?,
            "zpReserved" => options.zp_reserved = parse_ranges(value).ok_or_else(invalid)?,
            "zpAllowed" => options.zp_allowed = parse_ranges(value).ok_or_else(invalid)?,
            "loadAddress" => options.load_address = parse_u32(value, line, text)?,
            "optimize" => options.optimize = parse_bool(value, line, text)?,
            "floats" => options.floats = parse_bool(value, line, text)?,
            "dontReinitGlobals" => options.dont_reinit_globals = parse_bool(value, line, text)?,
            "outputDir" => options.output_dir = PathBuf::from(value),
            other => return Err(line_error(format!("unknown option '{}'", other), line, text)),
        }
    }
    Ok(options)
}

fn parse_asm_symbols(element: &Element, symbols: &mut IrSymbolTable) -> ParseResult<()> {
    for (line, text) in element.content_lines() {
        let (name, value) = text
            .split_once('=')
            .ok_or_else(|| line_error("expected name=value", line, text))?;
        symbols
            .add_asm_symbol(name.trim(), value.trim())
            .map_err(|e| line_error(e.to_string(), line, text))?;
    }
    Ok(())
}

/// `ubyte`, `uword[10]`, `word_split[4]` into a datatype and optional length.
fn parse_type(text: &str, line: usize, full: &str) -> ParseResult<(DataType, Option<u32>)> {
    let (name, length) = match text.split_once('[') {
        Some((name, rest)) => {
            let size = rest
                .strip_suffix(']')
                .ok_or_else(|| line_error(format!("malformed type '{}'", text), line, full))?;
            (name, Some(parse_u32(size, line, full)?))
        }
        None => (text, None),
    };
    let dt = DataType::from_ir_name(name, length.is_some())
        .ok_or_else(|| line_error(format!("unknown type '{}'", text), line, full))?;
    Ok((dt, length))
}

fn scoped_name(name: &str, line: usize, text: &str) -> ParseResult<String> {
    if !name.contains('.') || name.starts_with('.') || name.ends_with('.') {
        return Err(line_error(format!("variable name '{}' is not scoped", name), line, text));
    }
    Ok(name.to_string())
}

fn parse_variables(element: &Element, with_init: bool, symbols: &mut IrSymbolTable) -> ParseResult<()> {
    for (line, text) in element.content_lines() {
        let mut parts = text.split_whitespace();
        let (dt, length) = parse_type(parts.next().unwrap_or_default(), line, text)?;
        let name_part = parts
            .next()
            .ok_or_else(|| line_error("missing variable name", line, text))?;

        let (name, init) = match (with_init, name_part.split_once('=')) {
            (true, Some((name, value))) => (name, Some(value)),
            (true, None) => return Err(line_error("missing initial value", line, text)),
            (false, _) => (name_part, None),
        };
        let mut variable = StaticVariable::new(scoped_name(name, line, text)?, dt);
        variable.length = length;

        if let Some(value) = init {
            let parsed = if dt.is_pass_by_reference() {
                let mut elements = Vec::new();
                for item in value.split(',').filter(|v| !v.is_empty()) {
                    match item.strip_prefix('@') {
                        Some(target) => elements.push(ArrayElement::AddressOf(target.to_string())),
                        None => elements.push(ArrayElement::Number(parse_number(item, dt, line, text)?)),
                    }
                }
                VariableInit::Array(elements)
            } else {
                VariableInit::Scalar(parse_number(value, dt, line, text)?)
            };
            variable.init = Some(parsed);
        }

        for part in parts {
            if let Some(wish) = part.strip_prefix("zp=") {
                variable.zp_wish = ZeropageWish::from_name(wish)
                    .ok_or_else(|| line_error(format!("unknown zeropage wish '{}'", wish), line, text))?;
            } else if let Some(align) = part.strip_prefix("align=") {
                variable.align = parse_u32(align, line, text)?;
            } else {
                return Err(line_error(format!("unexpected '{}'", part), line, text));
            }
        }
        symbols.add_variable(variable).map_err(|e| line_error(e.to_string(), line, text))?;
    }
    Ok(())
}

fn parse_memory_mapped(element: &Element, symbols: &mut IrSymbolTable) -> ParseResult<()> {
    for (line, text) in element.content_lines() {
        let rest = text
            .strip_prefix('@')
            .ok_or_else(|| line_error("memory-mapped variable must start with '@'", line, text))?;
        let (type_part, rest) = rest
            .split_once(' ')
            .ok_or_else(|| line_error("missing variable name", line, text))?;
        let (dt, length) = parse_type(type_part, line, text)?;
        let (name, address) = rest
            .trim()
            .split_once('=')
            .ok_or_else(|| line_error("missing address", line, text))?;
        symbols
            .add_memory_mapped(MemoryMappedVariable {
                name: scoped_name(name, line, text)?,
                dt,
                address: parse_u32(address, line, text)?,
                length,
            })
            .map_err(|e| line_error(e.to_string(), line, text))?;
    }
    Ok(())
}

fn parse_slabs(element: &Element, symbols: &mut IrSymbolTable) -> ParseResult<()> {
    for (line, text) in element.content_lines() {
        let parts: Vec<&str> = text.split_whitespace().collect();
        let [name, size, align] = parts.as_slice() else {
            return Err(line_error("expected '<name> <size> <align>'", line, text));
        };
        symbols
            .add_slab(MemorySlab {
                name: name.to_string(),
                size: parse_u32(size, line, text)?,
                align: parse_u32(align, line, text)?,
            })
            .map_err(|e| line_error(e.to_string(), line, text))?;
    }
    Ok(())
}

fn optional_label(element: &Element) -> Option<String> {
    element.attr("LABEL").filter(|l| !l.is_empty()).map(str::to_string)
}

fn optional_address(element: &Element) -> ParseResult<Option<u32>> {
    match element.attr("ADDRESS") {
        None | Some("") => Ok(None),
        Some(value) => parse_u32(value, element.line, value).map(Some),
    }
}

fn parse_chunk(element: &Element) -> ParseResult<IrChunk> {
    let label = optional_label(element);
    match element.name.as_str() {
        "CODE" => {
            let mut instructions = Vec::new();
            for (line, text) in element.content_lines() {
                if text.starts_with(';') {
                    continue;
                }
                let ins = text
                    .parse::<IrInstruction>()
                    .map_err(|e| line_error(e.to_string(), line, text))?;
                instructions.push(ins);
            }
            Ok(IrChunk::code_with(label, instructions))
        }
        "ASM" => {
            let is_ir = parse_bool(element.attr("IR").unwrap_or("false"), element.line, "<ASM>")?;
            let assembly = element.text_lines().map(|(_, t)| t).collect::<Vec<_>>().join("\n");
            Ok(IrChunk::inline_asm(label, assembly, is_ir))
        }
        "BYTES" => {
            let source = match element.attr("FILE") {
                Some(file) if !file.is_empty() => {
                    let offset = parse_u32(element.attr("OFFSET").unwrap_or("0"), element.line, "<BYTES>")?;
                    let length = match element.attr("LENGTH") {
                        None | Some("") => None,
                        Some(value) => Some(parse_u32(value, element.line, "<BYTES>")?),
                    };
                    Some(BinarySource {
                        file: file.to_string(),
                        offset,
                        length,
                    })
                }
                _ => None,
            };
            let mut data = Vec::new();
            for (line, text) in element.content_lines() {
                for byte in text.split_whitespace() {
                    data.push(
                        u8::from_str_radix(byte, 16)
                            .map_err(|_| line_error(format!("invalid byte '{}'", byte), line, text))?,
                    );
                }
            }
            Ok(IrChunk::inline_binary(label, data, source))
        }
        other => Err(line_error(
            format!("<{}> is not a chunk", other),
            element.line,
            &format!("<{}>", other),
        )),
    }
}

fn parse_block(element: &Element) -> ParseResult<IrBlock> {
    let line = element.line;
    let position = parse_position(element.required_attr("POS")?, line)?;
    let mut block = IrBlock::new(element.required_attr("NAME")?, position);
    block.library = parse_bool(element.attr("LIBRARY").unwrap_or("false"), line, "<BLOCK>")?;
    block.options = BlockOptions {
        address: optional_address(element)?,
        force_output: parse_bool(element.attr("FORCEOUTPUT").unwrap_or("false"), line, "<BLOCK>")?,
        no_symbol_prefixing: parse_bool(element.attr("NOPREFIXING").unwrap_or("false"), line, "<BLOCK>")?,
        alignment: BlockAlignment::from_name(element.attr("ALIGN").unwrap_or("NONE"))
            .ok_or_else(|| line_error("invalid block alignment", line, "<BLOCK>"))?,
    };

    for child in element.elements() {
        let item = match child.name.as_str() {
            "SUB" => BlockItem::Sub(parse_subroutine(child)?),
            "ASMSUB" => BlockItem::AsmSub(parse_asm_subroutine(child)?),
            _ => BlockItem::Chunk(parse_chunk(child)?),
        };
        block.children.push(item);
    }
    Ok(block)
}

fn parse_subroutine(element: &Element) -> ParseResult<IrSubroutine> {
    let line = element.line;
    let return_type = match element.attr("RETURNTYPE") {
        None | Some("") => None,
        Some(name) => Some(
            DataType::from_ir_name(name, false)
                .ok_or_else(|| line_error(format!("unknown return type '{}'", name), line, "<SUB>"))?,
        ),
    };
    let mut sub = IrSubroutine {
        label: element.required_attr("NAME")?.to_string(),
        parameters: Vec::new(),
        return_type,
        position: parse_position(element.required_attr("POS")?, line)?,
        chunks: Vec::new(),
    };

    let mut children = element.elements();
    match children.next() {
        Some(params) if params.name == "PARAMS" => {
            for (line, text) in params.content_lines() {
                let (dt_name, name) = text
                    .split_once(' ')
                    .ok_or_else(|| line_error("expected '<type> <name>'", line, text))?;
                let dt = DataType::from_ir_name(dt_name, false)
                    .ok_or_else(|| line_error(format!("unknown type '{}'", dt_name), line, text))?;
                sub.parameters.push(IrParameter {
                    name: scoped_name(name.trim(), line, text)?,
                    dt,
                });
            }
        }
        _ => return Err(line_error("missing section <PARAMS>", line, "<SUB>")),
    }
    for chunk in children {
        sub.chunks.push(parse_chunk(chunk)?);
    }
    Ok(sub)
}

fn parse_register(text: &str, line: usize, full: &str) -> ParseResult<RegisterOrFlag> {
    RegisterOrFlag::parse(text.trim()).ok_or_else(|| line_error(format!("unknown register '{}'", text), line, full))
}

fn parse_asm_subroutine(element: &Element) -> ParseResult<IrAsmSubroutine> {
    let line = element.line;
    let clobbers = element
        .attr("CLOBBERS")
        .unwrap_or_default()
        .split(',')
        .filter(|c| !c.is_empty())
        .map(|c| parse_register(c, line, "<ASMSUB>"))
        .collect::<ParseResult<Vec<_>>>()?;
    let mut returns = Vec::new();
    for ret in element.attr("RETURNS").unwrap_or_default().split(',').filter(|r| !r.is_empty()) {
        let (dt_name, reg) = ret
            .split_once('@')
            .ok_or_else(|| line_error(format!("malformed return '{}'", ret), line, "<ASMSUB>"))?;
        let dt = DataType::from_ir_name(dt_name, false)
            .ok_or_else(|| line_error(format!("unknown type '{}'", dt_name), line, "<ASMSUB>"))?;
        returns.push(IrAsmParameter {
            location: parse_register(reg, line, "<ASMSUB>")?,
            dt,
        });
    }

    let mut children = element.elements();
    let mut parameters = Vec::new();
    match children.next() {
        Some(params) if params.name == "ASMPARAMS" => {
            for (line, text) in params.content_lines() {
                let (dt_name, reg) = text
                    .split_once(' ')
                    .ok_or_else(|| line_error("expected '<type> <register>'", line, text))?;
                let dt = DataType::from_ir_name(dt_name, false)
                    .ok_or_else(|| line_error(format!("unknown type '{}'", dt_name), line, text))?;
                parameters.push(IrAsmParameter {
                    location: parse_register(reg, line, text)?,
                    dt,
                });
            }
        }
        _ => return Err(line_error("missing section <ASMPARAMS>", line, "<ASMSUB>")),
    }
    let asm_chunk = match children.next() {
        Some(chunk) => parse_chunk(chunk)?,
        None => return Err(line_error("machine-bound subroutine has no body", line, "<ASMSUB>")),
    };

    Ok(IrAsmSubroutine {
        label: element.required_attr("NAME")?.to_string(),
        address: optional_address(element)?,
        clobbers,
        parameters,
        returns,
        position: parse_position(element.required_attr("POS")?, line)?,
        asm_chunk,
    })
}
