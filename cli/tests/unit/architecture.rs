//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries hold:
//! domain imports nothing above it, application talks to the outside world
//! only through ports, and infra never reaches into presentation.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

fn src(layer: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer)
}

/// `(file:line: text)` for every non-test, non-comment line of `layer`
/// matching `pred`.
fn scan(layer: &str, pred: impl Fn(&str) -> bool) -> Vec<String> {
    let mut hits = Vec::new();
    for file in collect_rs_files(&src(layer)) {
        let rel = file
            .strip_prefix(env!("CARGO_MANIFEST_DIR"))
            .unwrap_or(&file)
            .display()
            .to_string();
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let mut tracker = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            if in_test || line.trim().starts_with("//") {
                continue;
            }
            if pred(line) {
                hits.push(format!("{rel}:{}: {}", i + 1, line.trim()));
            }
        }
    }
    hits
}

fn assert_no_imports(layer: &str, forbidden: &[&str]) {
    let violations = scan(layer, |line| forbidden.iter().any(|f| line.contains(f)));
    assert!(
        violations.is_empty(),
        "{layer}/ must not import {forbidden:?}:\n{}",
        violations.join("\n")
    );
}

#[test]
fn domain_is_pure() {
    assert_no_imports(
        "domain",
        &[
            "crate::application",
            "crate::infra",
            "crate::commands",
            "crate::output",
            "crate::server",
            "tokio",
            "std::net",
            "std::process",
            "reqwest",
        ],
    );
}

#[test]
fn application_depends_only_on_domain_and_ports() {
    assert_no_imports(
        "application",
        &[
            "crate::infra",
            "crate::commands",
            "crate::output",
            "crate::server",
            "reqwest",
            "tokio::net",
        ],
    );
}

#[test]
fn infra_has_no_imports_from_presentation() {
    assert_no_imports("infra", &["crate::commands", "crate::output", "crate::server"]);
}

#[test]
fn library_layers_have_no_print_macros_outside_tests() {
    for layer in ["domain", "application", "infra", "server"] {
        let violations = scan(layer, |line| line.contains("println!") || line.contains("eprintln!"));
        assert!(
            violations.is_empty(),
            "{layer}/ must log through tracing, not print:\n{}",
            violations.join("\n")
        );
    }
}

#[test]
fn adapters_are_constructed_only_in_infra() {
    for layer in ["application", "commands", "server"] {
        let violations = scan(layer, |line| {
            line.contains("TokioCommandRunner::") || line.contains("OpenSshShell::")
        });
        assert!(
            violations.is_empty(),
            "{layer}/ must receive adapters through InstallDeps:\n{}",
            violations.join("\n")
        );
    }
}
