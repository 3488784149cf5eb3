//! file: cli/src/output.rs
//! description: styled terminal output for the lowbyte CLI.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, ContentArrangement, Table};
use console::Style;
use lowbyte_core::{LowbyteErrorExt, generate_error_report};

/// Styles for different output elements.
pub struct FormatStyle {
    pub title: Style,
    pub info: Style,
    pub warning: Style,
    pub error: Style,
    pub success: Style,
}

impl Default for FormatStyle {
    fn default() -> Self {
        FormatStyle {
            title: Style::new().bold().underlined(),
            info: Style::new().cyan(),
            warning: Style::new().yellow(),
            error: Style::new().red().bold(),
            success: Style::new().green().bold(),
        }
    }
}

/// Writes status lines to stdout and problems to stderr.
#[derive(Default)]
pub struct Printer {
    formatting: FormatStyle,
}

impl Printer {
    pub fn title(&self, text: &str) {
        println!("{}", self.formatting.title.apply_to(text));
    }

    pub fn info(&self, text: &str) {
        println!("{}", self.formatting.info.apply_to(text));
    }

    pub fn success(&self, text: &str) {
        println!("{}", self.formatting.success.apply_to(text));
    }

    pub fn warning(&self, text: &str) {
        eprintln!("{}", self.formatting.warning.apply_to(text));
    }

    pub fn error(&self, error: &dyn LowbyteErrorExt) {
        eprintln!("{}", self.formatting.error.apply_to(generate_error_report(error)));
    }

    pub fn table(&self, header: &[&str], rows: Vec<Vec<String>>) {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header.iter().map(|h| Cell::new(h)));
        for row in rows {
            table.add_row(row);
        }
        println!("{table}");
    }
}
