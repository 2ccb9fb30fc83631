//! Specifier resolution for the walker.
//!
//! Built on `oxc_resolver` so local files and `node_modules` packages resolve the
//! same way the bundler resolves them later.

use std::path::{Path, PathBuf};

use bale_config::Platform;
use oxc_resolver::{ResolveOptions, Resolver};
use path_clean::PathClean;

use crate::module::{is_path_specifier, package_name};

/// Extensions tried for extensionless specifiers, in order.
pub const EXTENSIONS: &[&str] = &[
    ".ts", ".tsx", ".mts", ".cts", ".js", ".jsx", ".mjs", ".cjs", ".json", ".d.ts",
];

const NODE_BUILTINS: &[&str] = &[
    "assert", "async_hooks", "buffer", "child_process", "cluster", "console", "constants",
    "crypto", "dgram", "diagnostics_channel", "dns", "domain", "events", "fs", "http", "http2",
    "https", "inspector", "module", "net", "os", "path", "perf_hooks", "process", "punycode",
    "querystring", "readline", "repl", "stream", "string_decoder", "sys", "timers", "tls",
    "trace_events", "tty", "url", "util", "v8", "vm", "wasi", "worker_threads", "zlib",
];

/// Whether `specifier` names a node built-in (`node:fs`, `fs`, `fs/promises`).
pub fn is_node_builtin(specifier: &str) -> bool {
    if specifier.starts_with("node:") {
        return true;
    }
    let name = specifier.split('/').next().unwrap_or(specifier);
    NODE_BUILTINS.contains(&name)
}

/// Outcome of resolving one specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Local(PathBuf),
    External { package: String },
    Inlined { package: String, path: PathBuf },
}

pub struct ModuleResolver {
    resolver: Resolver,
    external: Vec<String>,
}

impl ModuleResolver {
    pub fn new(platform: Platform, external: Vec<String>) -> Self {
        let (condition_names, main_fields): (&[&str], &[&str]) = match platform {
            Platform::Node => (&["node", "import", "require", "default"], &["module", "main"]),
            Platform::Browser => (
                &["browser", "import", "module", "default"],
                &["browser", "module", "main"],
            ),
            Platform::Neutral => (&["import", "module", "default"], &["module", "main"]),
        };

        let resolver = Resolver::new(ResolveOptions {
            condition_names: to_strings(condition_names),
            main_fields: to_strings(main_fields),
            extensions: to_strings(EXTENSIONS),
            // `./x.js` may name `./x.ts` in TypeScript sources
            extension_alias: vec![
                (".js".into(), to_strings(&[".ts", ".tsx", ".js", ".jsx"])),
                (".mjs".into(), to_strings(&[".mts", ".mjs"])),
                (".cjs".into(), to_strings(&[".cts", ".cjs"])),
            ],
            ..Default::default()
        });

        Self { resolver, external }
    }

    /// Whether `specifier` is a configured external or a subpath of one.
    pub fn is_configured_external(&self, specifier: &str) -> bool {
        self.external.iter().any(|ext| {
            specifier == ext
                || specifier
                    .strip_prefix(ext.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }

    /// Resolve `specifier` as imported from the file `importer`.
    pub fn resolve(&self, specifier: &str, importer: &Path) -> Result<Resolution, String> {
        if !is_path_specifier(specifier) {
            if self.is_configured_external(specifier) || is_node_builtin(specifier) {
                return Ok(Resolution::External {
                    package: package_name(specifier).to_string(),
                });
            }
        }

        let dir = importer.parent().unwrap_or_else(|| Path::new("."));
        let resolved = self
            .resolver
            .resolve(dir, specifier)
            .map_err(|e| e.to_string())?;
        let path = resolved.path().to_path_buf().clean();

        if is_path_specifier(specifier) {
            Ok(Resolution::Local(path))
        } else {
            Ok(Resolution::Inlined {
                package: package_name(specifier).to_string(),
                path,
            })
        }
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn builtins() {
        assert!(is_node_builtin("node:fs"));
        assert!(is_node_builtin("fs"));
        assert!(is_node_builtin("fs/promises"));
        assert!(!is_node_builtin("zod"));
        assert!(!is_node_builtin("fsx"));
    }

    #[test]
    fn resolves_ts_through_js_extension() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.ts"), "export const a = 1;").unwrap();
        fs::write(dir.path().join("index.ts"), "").unwrap();

        let resolver = ModuleResolver::new(Platform::Neutral, vec![]);
        let importer = dir.path().join("index.ts");

        let expected = dir.path().join("a.ts");
        for spec in ["./a", "./a.js", "./a.ts"] {
            match resolver.resolve(spec, &importer).unwrap() {
                Resolution::Local(path) => {
                    assert_eq!(path.file_name(), expected.file_name(), "{spec}")
                }
                other => panic!("{spec}: {other:?}"),
            }
        }
    }

    #[test]
    fn configured_externals_skip_resolution() {
        let resolver = ModuleResolver::new(Platform::Neutral, vec!["zod".into()]);
        let importer = Path::new("/nowhere/index.ts");
        assert_eq!(
            resolver.resolve("zod/v4", importer).unwrap(),
            Resolution::External {
                package: "zod".into()
            }
        );
        assert_eq!(
            resolver.resolve("node:path", importer).unwrap(),
            Resolution::External {
                package: "node:path".into()
            }
        );
    }

    #[test]
    fn bare_dependencies_are_inlined() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("node_modules/tiny");
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("package.json"), r#"{"name":"tiny","main":"index.js"}"#).unwrap();
        fs::write(pkg.join("index.js"), "module.exports = 1;").unwrap();
        fs::write(dir.path().join("index.ts"), "").unwrap();

        let resolver = ModuleResolver::new(Platform::Node, vec![]);
        match resolver.resolve("tiny", &dir.path().join("index.ts")).unwrap() {
            Resolution::Inlined { package, path } => {
                assert_eq!(package, "tiny");
                assert!(path.ends_with("node_modules/tiny/index.js"));
            }
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn missing_local_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let resolver = ModuleResolver::new(Platform::Neutral, vec![]);
        assert!(resolver.resolve("./missing", &dir.path().join("index.ts")).is_err());
    }
}
