use std::io::Write;

use owo_colors::OwoColorize;
use pdfindexer_core::{ExtractionMethod, MethodId, ResourceBudget};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the index value computed for one file.
pub fn print_index_value(
    w: &mut dyn Write,
    path: &str,
    value: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{}", path.bold())?;
    } else {
        writeln!(w, "{}", path)?;
    }
    if value.is_empty() {
        if color.enabled() {
            writeln!(w, "  {}", "(empty)".dimmed())?;
        } else {
            writeln!(w, "  (empty)")?;
        }
    } else {
        for line in value.lines() {
            writeln!(w, "  {}", line)?;
        }
    }
    Ok(())
}

/// Print the method list with probe results and the selection.
pub fn print_methods(
    w: &mut dyn Write,
    methods: &[ExtractionMethod],
    selected: MethodId,
    effective: MethodId,
    notes: &[String],
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Extraction methods:")?;
    for method in methods {
        let marker = if method.id == effective { "*" } else { " " };
        let status = if method.enabled {
            "available"
        } else {
            "unavailable"
        };
        let line = format!(
            "{} {:<10} {:<20} {}",
            marker,
            method.id.as_str(),
            method.label,
            status
        );
        if !color.enabled() {
            writeln!(w, "{}", line)?;
        } else if method.enabled {
            writeln!(w, "{}", line.green())?;
        } else {
            writeln!(w, "{}", line.red())?;
        }
    }

    writeln!(w)?;
    if selected == effective {
        writeln!(w, "Selected: {}", selected)?;
    } else {
        let msg = format!("Selected: {} (unavailable, using {})", selected, effective);
        if color.enabled() {
            writeln!(w, "{}", msg.yellow())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    }
    print_notes(w, notes, color)
}

/// Print the resolved budget for the effective method.
pub fn print_budget(
    w: &mut dyn Write,
    method: MethodId,
    budget: &ResourceBudget,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "Method:             {}", method)?;
    match budget.max_execution_seconds {
        Some(secs) => writeln!(w, "Max execution time: {} s", secs)?,
        None => writeln!(w, "Max execution time: unlimited")?,
    }
    match budget.max_memory_bytes {
        Some(bytes) => writeln!(
            w,
            "Max decode memory:  {} bytes ({} MiB)",
            bytes,
            bytes / 1024 / 1024
        )?,
        None => writeln!(w, "Max decode memory:  unlimited")?,
    }
    print_notes(w, &budget.notes(), color)
}

fn print_notes(w: &mut dyn Write, notes: &[String], color: ColorMode) -> std::io::Result<()> {
    for note in notes {
        if color.enabled() {
            writeln!(w, "{}", note.dimmed())?;
        } else {
            writeln!(w, "{}", note)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfindexer_core::{HostLimits, Registry, resolve_with_host};

    fn render(f: impl FnOnce(&mut dyn Write) -> std::io::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn index_value_is_indented() {
        let out = render(|w| {
            print_index_value(w, "a.pdf", "first\nsecond", ColorMode(false))
        });
        assert_eq!(out, "a.pdf\n  first\n  second\n");
    }

    #[test]
    fn empty_index_value_is_marked() {
        let out = render(|w| print_index_value(w, "a.pdf", "", ColorMode(false)));
        assert_eq!(out, "a.pdf\n  (empty)\n");
    }

    #[test]
    fn methods_show_fallback() {
        let registry = Registry::default();
        let out = render(|w| {
            print_methods(
                w,
                &registry.list_methods(),
                MethodId::Mupdf,
                MethodId::Disabled,
                &registry.notes(),
                ColorMode(false),
            )
        });
        assert!(out.contains("* disabled"));
        assert!(out.contains("mupdf      MuPDF                unavailable"));
        assert!(out.contains("Selected: mupdf (unavailable, using disabled)"));
        assert!(out.contains("no extraction backends available"));
    }

    #[test]
    fn budget_lists_host_notes() {
        let host = HostLimits::new(Some(30), Some("128M"));
        let budget = resolve_with_host(&host, Some(90), None);
        let out = render(|w| print_budget(w, MethodId::Mupdf, &budget, ColorMode(false)));
        assert!(out.contains("Max execution time: 30 s"));
        assert!(out.contains("Max decode memory:  134217728 bytes (128 MiB)"));
        assert!(out.contains("host max execution time is 30 seconds"));
    }
}
