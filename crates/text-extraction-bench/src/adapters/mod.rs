//! Built-in extraction frameworks
//!
//! Each framework runs in a Python interpreter as a child process. Availability
//! is probed once, when the registry is built; a framework whose module cannot
//! be imported is registered as unavailable with the reason.

pub mod python;
pub mod subprocess;

pub use python::{PythonRuntime, find_python_with_module, python_candidates};
pub use subprocess::{AsyncSubprocessExtractor, SubprocessCommand, SubprocessExtractor};

use crate::extractor::Capability;
use crate::registry::{Framework, FrameworkRegistry};

/// Cache directory the kreuzberg family creates in the working directory
pub const KREUZBERG_CACHE_DIR: &str = ".kreuzberg";

const KREUZBERG_EXCLUSIONS: &[&str] = &["eml", "msg", "json", "yaml", "docx", "odt", "rst", "org"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Driver {
    Blocking,
    NonBlocking,
}

/// Static description of a built-in framework
#[derive(Debug, Clone, Copy)]
pub struct BuiltinFramework {
    pub id: &'static str,
    /// Module imported to probe availability
    pub module: &'static str,
    /// Package name suggested when the module is missing
    pub package: &'static str,
    script: &'static str,
    driver: Driver,
    cache_dir: Option<&'static str>,
    excluded: &'static [&'static str],
}

impl BuiltinFramework {
    pub fn is_async(&self) -> bool {
        self.driver == Driver::NonBlocking
    }

    fn framework(&self, runtime: &PythonRuntime) -> Framework {
        let command = runtime.script_command(self.script);
        let capability = match self.driver {
            Driver::Blocking => Capability::sync(SubprocessExtractor::new(command)),
            Driver::NonBlocking => Capability::asynchronous(AsyncSubprocessExtractor::new(command)),
        };

        let framework = Framework::new(capability).with_excluded_extensions(self.excluded.iter().copied());
        match self.cache_dir {
            Some(dir) => framework.with_cache_dir(dir),
            None => framework,
        }
    }
}

pub const BUILTIN_FRAMEWORKS: &[BuiltinFramework] = &[
    BuiltinFramework {
        id: "kreuzberg_sync",
        module: "kreuzberg",
        package: "kreuzberg",
        script: "import sys, kreuzberg\n\
                 sys.stdout.write(kreuzberg.extract_file_sync(sys.argv[1]).content)",
        driver: Driver::Blocking,
        cache_dir: Some(KREUZBERG_CACHE_DIR),
        excluded: KREUZBERG_EXCLUSIONS,
    },
    BuiltinFramework {
        id: "kreuzberg_async",
        module: "kreuzberg",
        package: "kreuzberg",
        script: "import sys, asyncio, kreuzberg\n\
                 sys.stdout.write(asyncio.run(kreuzberg.extract_file(sys.argv[1])).content)",
        driver: Driver::NonBlocking,
        cache_dir: Some(KREUZBERG_CACHE_DIR),
        excluded: KREUZBERG_EXCLUSIONS,
    },
    BuiltinFramework {
        id: "docling",
        module: "docling",
        package: "docling",
        script: "import sys\n\
                 from docling.document_converter import DocumentConverter\n\
                 sys.stdout.write(DocumentConverter().convert(sys.argv[1]).document.export_to_text())",
        driver: Driver::Blocking,
        cache_dir: None,
        excluded: &["eml", "msg", "json", "yaml", "odt", "org", "rst", "txt", "xls"],
    },
    BuiltinFramework {
        id: "markitdown",
        module: "markitdown",
        package: "markitdown",
        script: "import sys\n\
                 from markitdown import MarkItDown\n\
                 sys.stdout.write(MarkItDown().convert(sys.argv[1]).text_content)",
        driver: Driver::Blocking,
        cache_dir: None,
        excluded: &["docx", "md", "odt"],
    },
    BuiltinFramework {
        id: "unstructured",
        module: "unstructured",
        package: "unstructured[all-docs]",
        script: "import sys\n\
                 from unstructured.partition.auto import partition\n\
                 sys.stdout.write('\\n'.join(str(e) for e in partition(filename=sys.argv[1])))",
        driver: Driver::Blocking,
        cache_dir: None,
        excluded: &["jpeg", "jpg", "odt", "org", "rst"],
    },
    BuiltinFramework {
        id: "extractous",
        module: "extractous",
        package: "extractous",
        script: "import sys\n\
                 from extractous import Extractor\n\
                 text = Extractor().extract_file_to_string(sys.argv[1])\n\
                 sys.stdout.write(text[0] if isinstance(text, tuple) else text)",
        driver: Driver::Blocking,
        cache_dir: None,
        excluded: &["docx", "jpg"],
    },
];

/// Probe every built-in framework and record it in `registry`
pub fn register_builtin(registry: &mut FrameworkRegistry) {
    let candidates = python_candidates();

    for builtin in BUILTIN_FRAMEWORKS {
        let registered = match find_python_with_module(&candidates, builtin.module, builtin.package) {
            Ok(runtime) => {
                tracing::debug!("Framework {} available via {}", builtin.id, runtime.program.display());
                registry.register(builtin.id, builtin.framework(&runtime))
            }
            Err(reason) => {
                tracing::debug!("Framework {} unavailable: {}", builtin.id, reason);
                registry.register_unavailable(builtin.id, reason)
            }
        };

        if let Err(e) = registered {
            tracing::warn!("Failed to register {}: {}", builtin.id, e);
        }
    }
}
