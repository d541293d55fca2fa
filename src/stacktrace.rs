//! §4.8 StacktraceParser. Sniffs which of several heterogeneous stack
//! trace formats (Node, Python, JVM, Go, Ruby, PHP) a blob of text is in,
//! then extracts frames leniently — a frame missing optional fields is
//! still kept, and a completely unrecognized line is simply skipped
//! rather than treated as an error.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StackFrame {
    pub file: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub function: Option<String>,
    pub message: Option<String>,
}

macro_rules! regex_cell {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pat).unwrap())
        }
    };
}

// "    at PaymentService.handleWebhook (src/services/PaymentService.ts:42:17)"
regex_cell!(
    node_re,
    r"at\s+(?:(?P<fn>[\w.$<>]+)\s+\()?(?P<file>[^\s():]+):(?P<line>\d+)(?::(?P<col>\d+))?\)?"
);

// "  File \"src/services/payment.py\", line 42, in handle_webhook"
regex_cell!(
    python_re,
    r#"File\s+"(?P<file>[^"]+)",\s+line\s+(?P<line>\d+)(?:,\s+in\s+(?P<fn>\S+))?"#
);

// "\tat com.example.payments.PaymentService.handleWebhook(PaymentService.java:42)"
regex_cell!(
    jvm_re,
    r"at\s+(?P<fn>[\w.$<>]+)\((?P<file>[\w.]+):(?P<line>\d+)\)"
);

// "/app/services/payment.go:42 +0x1d5" or "\tpayment.handleWebhook()\n\t\t/app/services/payment.go:42 +0x1d5"
regex_cell!(go_re, r"(?P<file>[\w./\-]+\.go):(?P<line>\d+)(?:\s+\+0x[0-9a-f]+)?");

// "  from src/services/payment.rb:42:in `handle_webhook'"
regex_cell!(
    ruby_re,
    r"from\s+(?P<file>[\w./\-]+\.rb):(?P<line>\d+)(?::in\s+`(?P<fn>[^']+)')?"
);

// "#0 /app/services/PaymentService.php(42): PaymentService->handleWebhook()"
regex_cell!(
    php_re,
    r"#\d+\s+(?P<file>[\w./\-]+\.php)\((?P<line>\d+)\):\s*(?P<fn>[\w\->:]+)?"
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Node,
    Python,
    Jvm,
    Go,
    Ruby,
    Php,
}

fn sniff_format(text: &str) -> Option<Format> {
    if python_re().is_match(text) {
        return Some(Format::Python);
    }
    if php_re().is_match(text) {
        return Some(Format::Php);
    }
    if ruby_re().is_match(text) {
        return Some(Format::Ruby);
    }
    if jvm_re().is_match(text) {
        return Some(Format::Jvm);
    }
    if go_re().is_match(text) {
        return Some(Format::Go);
    }
    if node_re().is_match(text) {
        return Some(Format::Node);
    }
    None
}

/// Parses `text` into whatever stack frames it can find. Returns an empty
/// vec (never an error) if no recognizable format is present.
pub fn parse(text: &str) -> Vec<StackFrame> {
    let Some(format) = sniff_format(text) else {
        return Vec::new();
    };

    let re = match format {
        Format::Node => node_re(),
        Format::Python => python_re(),
        Format::Jvm => jvm_re(),
        Format::Go => go_re(),
        Format::Ruby => ruby_re(),
        Format::Php => php_re(),
    };

    let first_line = text.lines().next().map(|l| l.trim().to_string());
    let message = first_line.filter(|l| !re.is_match(l) && !l.is_empty());

    re.captures_iter(text)
        .filter_map(|caps| {
            let file = caps.name("file")?.as_str().to_string();
            let line = caps.name("line").and_then(|m| m.as_str().parse().ok());
            let col = caps.name("col").and_then(|m| m.as_str().parse().ok());
            let func = caps.name("fn").map(|m| m.as_str().to_string());
            Some(StackFrame {
                file: crate::scanner::normalize_path(std::path::Path::new(&file)),
                line,
                column: col,
                function: func,
                message: message.clone(),
            })
        })
        .collect()
}

/// Distinct files named by any frame, in first-seen order.
pub fn frame_files(frames: &[StackFrame]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    frames
        .iter()
        .filter(|f| seen.insert(f.file.clone()))
        .map(|f| f.file.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_node_trace() {
        let text = "TypeError: cannot read property\n    at PaymentService.handleWebhook (src/services/PaymentService.ts:42:17)\n    at Router.dispatch (src/router.ts:10:5)";
        let frames = parse(text);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].file, "src/services/PaymentService.ts");
        assert_eq!(frames[0].line, Some(42));
    }

    #[test]
    fn parses_python_trace() {
        let text = "Traceback (most recent call last):\n  File \"src/services/payment.py\", line 42, in handle_webhook\n    raise ValueError()";
        let frames = parse(text);
        assert_eq!(frames[0].file, "src/services/payment.py");
        assert_eq!(frames[0].function.as_deref(), Some("handle_webhook"));
    }

    #[test]
    fn unrecognized_text_yields_no_frames() {
        assert!(parse("just a plain task description").is_empty());
    }

    #[test]
    fn malformed_trace_never_panics() {
        let _ = parse("at ()))(((:::\nFile \"\", line");
    }
}
