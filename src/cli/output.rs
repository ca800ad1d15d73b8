//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the Braid CLI.

use owo_colors::OwoColorize;
use std::io::{self, Write};

use crate::fusion::{ContentBlock, Placement};
use crate::types::Citation;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print the Braid banner
    pub fn banner(&self) {
        if self.colored {
            println!(
                r#"
   {}
   {}
   {}
   {}
   {}
"#,
                " ____            _     _ ".bright_magenta().bold(),
                "| __ ) _ __ __ _(_) __| |".bright_magenta().bold(),
                "|  _ \\| '__/ _` | |/ _` |".magenta().bold(),
                "| |_) | | | (_| | | (_| |".purple().bold(),
                "|____/|_|  \\__,_|_|\\__,_|".purple().bold(),
            );
            println!(
                "   {} {}\n",
                "Multi-source search aggregation".bright_white().bold(),
                format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
            );
        } else {
            println!(
                r#"
 ____            _     _
| __ ) _ __ __ _(_) __| |
|  _ \| '__/ _` | |/ _` |
| |_) | | | (_| | | (_| |
|____/|_|  \__,_|_|\__,_|

   Multi-source search aggregation v{}
"#,
                env!("CARGO_PKG_VERSION")
            );
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a subheader
    pub fn subheader(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.cyan().bold());
        } else {
            println!("\n  --- {} ---", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a list item
    pub fn list_item(&self, item: &str) {
        if self.colored {
            println!("    {} {}", "•".blue(), item);
        } else {
            println!("    - {}", item);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    // ============= Answer Rendering =============

    /// Print the answer headline
    pub fn headline(&self, headline: &str) {
        if headline.is_empty() {
            return;
        }
        if self.colored {
            println!("\n  {}\n", headline.bright_white().bold());
        } else {
            println!("\n  # {}\n", headline);
        }
    }

    /// Print the fused body, marking where each content block sits.
    pub fn body(&self, body: &str, placements: &[ContentBlock]) {
        let mut cursor = 0;
        for block in placements {
            let offset = block.offset.min(body.len());
            if let Some(text) = body.get(cursor..offset) {
                self.paragraphs(text);
            }
            self.block(block);
            cursor = offset;
        }
        if let Some(text) = body.get(cursor..) {
            self.paragraphs(text);
        }
    }

    fn paragraphs(&self, text: &str) {
        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            println!("  {}\n", paragraph);
        }
    }

    fn block(&self, block: &ContentBlock) {
        let placement = match block.placement {
            Placement::Inline => "inline",
            Placement::Appended => "appended",
        };
        let label = format!(
            "[{} block: {} items, {} tier, {}]",
            block.source_id,
            block.item_ids.len(),
            block.tier,
            placement
        );
        if self.colored {
            println!("  {}\n", label.cyan());
        } else {
            println!("  {}\n", label);
        }
    }

    /// Print the citation list with a remainder indicator.
    pub fn citations(&self, citations: &[Citation], more: usize) {
        if citations.is_empty() {
            return;
        }
        self.subheader("Sources");
        for (i, citation) in citations.iter().enumerate() {
            if self.colored {
                println!(
                    "    {} {} {}",
                    format!("[{}]", i + 1).dimmed(),
                    citation.title.bright_white(),
                    citation.url.dimmed()
                );
            } else {
                println!("    [{}] {} {}", i + 1, citation.title, citation.url);
            }
        }
        if more > 0 {
            let line = format!("+{} more", more);
            if self.colored {
                println!("    {}", line.dimmed());
            } else {
                println!("    {}", line);
            }
        }
    }

    /// Print streamed narrative text without a trailing newline.
    pub fn delta(&self, text: &str) {
        print!("{}", text);
        io::stdout().flush().ok();
    }

    /// Print newline
    pub fn newline(&self) {
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::QualityTier;
    use crate::types::SourceId;

    fn block(offset: usize) -> ContentBlock {
        ContentBlock {
            source_id: SourceId::Video,
            tier: QualityTier::High,
            offset,
            placement: Placement::Inline,
            item_ids: vec!["a".to_string(), "b".to_string()],
        }
    }

    #[test]
    fn test_output_new() {
        let output = Output::new();
        assert!(output.colored);
    }

    #[test]
    fn test_output_no_color() {
        let output = Output::no_color();
        assert!(!output.colored);
    }

    #[test]
    fn test_output_default() {
        let output = Output::default();
        assert!(output.colored);
    }

    #[test]
    fn test_body_with_out_of_range_offset_does_not_panic() {
        let output = Output::no_color();
        output.body("First paragraph.\n\nSecond.", &[block(17), block(500)]);
        output.body("", &[block(0)]);
    }

    #[test]
    fn test_body_offset_inside_multibyte_char_does_not_panic() {
        let output = Output::no_color();
        // 'é' spans bytes 1..3
        output.body("café au lait", &[block(4)]);
    }

    #[test]
    fn test_output_methods_no_panic() {
        let output = Output::no_color();
        let citations = vec![Citation::new("Rust", "https://rust-lang.org")];

        output.success("test success");
        output.info("test info");
        output.warning("test warning");
        output.error("test error");
        output.header("Test Header");
        output.subheader("Test Subheader");
        output.kv("key", "value");
        output.list_item("item");
        output.hint("hint message");
        output.headline("Headline");
        output.headline("");
        output.citations(&citations, 3);
        output.citations(&[], 0);
        output.delta("streamed ");
        output.newline();
    }

    #[test]
    fn test_output_methods_colored_no_panic() {
        let output = Output::new();
        let citations = vec![Citation::new("Rust", "https://rust-lang.org")];

        output.success("test success");
        output.info("test info");
        output.warning("test warning");
        output.error("test error");
        output.header("Test Header");
        output.subheader("Test Subheader");
        output.kv("key", "value");
        output.list_item("item");
        output.hint("hint message");
        output.headline("Headline");
        output.body("Body text.", &[block(10)]);
        output.citations(&citations, 0);
        output.newline();
        output.banner();
    }
}
