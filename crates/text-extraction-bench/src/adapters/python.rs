//! Python interpreter discovery for Python-hosted frameworks

use super::subprocess::SubprocessCommand;
use std::path::PathBuf;
use std::process::Stdio;

/// How to launch a Python interpreter: program plus leading arguments
#[derive(Debug, Clone, PartialEq)]
pub struct PythonRuntime {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl PythonRuntime {
    /// Whether `import <module>` succeeds under this interpreter
    pub fn can_import(&self, module: &str) -> bool {
        let status = std::process::Command::new(&self.program)
            .args(&self.args)
            .arg("-c")
            .arg(format!("import {}", module))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::debug!("Failed to probe {} for {}: {}", self.program.display(), module, e);
                false
            }
        }
    }

    /// Command running `script` with the document path as `sys.argv[1]`
    pub fn script_command(&self, script: &str) -> SubprocessCommand {
        let mut args = self.args.clone();
        args.push("-c".to_string());
        args.push(script.to_string());
        SubprocessCommand::new(&self.program, args).with_env("PYTHONIOENCODING", "utf-8")
    }
}

/// Candidate interpreters in preference order: `uv run python`, `python3`, `python`
pub fn python_candidates() -> Vec<PythonRuntime> {
    let mut candidates = Vec::new();

    if let Ok(uv) = which::which("uv") {
        candidates.push(PythonRuntime {
            program: uv,
            args: vec!["run".to_string(), "python".to_string()],
        });
    }

    for name in ["python3", "python"] {
        if let Ok(python) = which::which(name) {
            candidates.push(PythonRuntime {
                program: python,
                args: Vec::new(),
            });
        }
    }

    candidates
}

/// Find an interpreter that has `module` installed
///
/// Returns the reason for unavailability when none does.
pub fn find_python_with_module(candidates: &[PythonRuntime], module: &str, package: &str) -> Result<PythonRuntime, String> {
    if candidates.is_empty() {
        return Err("No Python interpreter found (looked for uv, python3, python)".to_string());
    }

    candidates
        .iter()
        .find(|runtime| runtime.can_import(module))
        .cloned()
        .ok_or_else(|| {
            format!(
                "No Python interpreter found with {} installed. Install with: pip install {}",
                module, package
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_command_layout() {
        let runtime = PythonRuntime {
            program: PathBuf::from("uv"),
            args: vec!["run".to_string(), "python".to_string()],
        };
        let command = runtime.script_command("print(1)");
        assert_eq!(command.program, PathBuf::from("uv"));
        assert_eq!(command.args, vec!["run", "python", "-c", "print(1)"]);
        assert!(command.env.iter().any(|(k, v)| k == "PYTHONIOENCODING" && v == "utf-8"));
    }

    #[test]
    fn test_no_candidates_is_unavailable() {
        let reason = find_python_with_module(&[], "docling", "docling").unwrap_err();
        assert!(reason.contains("No Python interpreter"));
    }

    #[test]
    fn test_missing_interpreter_cannot_import() {
        let runtime = PythonRuntime {
            program: PathBuf::from("definitely-not-a-python"),
            args: vec![],
        };
        assert!(!runtime.can_import("sys"));
        let reason = find_python_with_module(&[runtime], "docling", "docling").unwrap_err();
        assert!(reason.contains("pip install docling"));
    }
}
