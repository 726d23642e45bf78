use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Where command results go
///
/// Human output is line oriented with status marks; JSON output emits whole
/// documents only, so `note` and `field` are dropped in that mode.
pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
    /// Free-form line, suppressed by `--quiet`
    fn note(&self, message: &str);
    /// Labelled value under the previous status line
    fn field(&self, label: &str, value: &str);
    fn document(&self, value: &Value);
}

pub struct HumanFormatter {
    quiet: bool,
}

/// Width of the label column in `field` lines
const LABEL_WIDTH: usize = 22;

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        println!("\u{2713} {message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} {message}");
    }

    fn error(&self, message: &str) {
        eprintln!("\u{2717} {message}");
    }

    fn note(&self, message: &str) {
        if !self.quiet {
            println!("  {message}");
        }
    }

    fn field(&self, label: &str, value: &str) {
        if !self.quiet {
            println!("  {}", format_field(label, value));
        }
    }

    fn document(&self, _value: &Value) {}
}

pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({ "status": "ok", "message": message }));
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", json!({ "status": "warning", "message": message }));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", json!({ "status": "error", "message": message }));
    }

    fn note(&self, _message: &str) {}

    fn field(&self, _label: &str, _value: &str) {}

    fn document(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("{}", json!({ "status": "error", "message": e.to_string() })),
        }
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Json => Box::new(JsonFormatter),
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
    }
}

fn format_field(label: &str, value: &str) -> String {
    let label = format!("{label}:");
    format!("{label:<LABEL_WIDTH$} {value}")
}

/// `"1 file"`, `"3 files"`
pub fn plural(count: u32, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}
