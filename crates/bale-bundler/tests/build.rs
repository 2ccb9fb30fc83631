use std::fs;
use std::path::Path;

use bale_bundler::{ArtifactKind, Error, LibraryBuilder};
use bale_config::{ConfigError, Format, LibraryConfig};
use bale_graph::GraphError;
use tempfile::TempDir;

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "src/index.ts",
        "export * from './schemas';\nexport { clamp } from './util';\nexport type { Meta } from './types';\n",
    );
    write(
        root,
        "src/schemas.ts",
        "import { z, type ZodTypeAny } from 'zod';\nimport { clamp } from './util';\n\nexport const Positive: ZodTypeAny = z.number().transform(clamp);\n",
    );
    write(
        root,
        "src/util.ts",
        "/** Clamp to zero or above. */\nexport const clamp = (n: number): number => Math.max(0, n);\n",
    );
    write(root, "src/types.ts", "export interface Meta {\n  id: string;\n}\n");
    dir
}

fn config() -> LibraryConfig {
    let mut config = LibraryConfig::default();
    config.build.external = vec!["zod".into()];
    config
}

fn names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn builds_every_format_with_maps_and_types() {
    let dir = project();
    let report = LibraryBuilder::new(config(), dir.path())
        .build()
        .await
        .unwrap();

    let dist = dir.path().join("dist");
    assert_eq!(report.out_dir, dist);
    assert_eq!(
        names(&dist),
        vec!["index.cjs", "index.cjs.map", "index.d.ts", "index.js", "index.js.map"]
    );
    assert_eq!(report.artifacts.len(), 5);
    assert!(
        report
            .artifacts
            .iter()
            .any(|a| a.file_name == "index.d.ts" && a.kind == ArtifactKind::Declarations)
    );

    let esm = fs::read_to_string(dist.join("index.js")).unwrap();
    assert!(esm.contains("from \"zod\""), "{esm}");
    assert!(esm.contains("//# sourceMappingURL=index.js.map"));

    let cjs = fs::read_to_string(dist.join("index.cjs")).unwrap();
    assert!(cjs.contains("require(\"zod\")"), "{cjs}");

    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dist.join("index.js.map")).unwrap()).unwrap();
    assert_eq!(map["version"], 3);

    let dts = fs::read_to_string(dist.join("index.d.ts")).unwrap();
    assert!(dts.contains("import { ZodTypeAny } from \"zod\";"), "{dts}");
    assert!(dts.contains("declare const clamp"), "{dts}");
    assert!(dts.contains("interface Meta"), "{dts}");
    assert!(!dts.contains("from \"./"), "{dts}");
}

#[tokio::test]
async fn umd_bundle_uses_the_configured_global() {
    let dir = project();
    let mut config = config();
    config.build.formats = vec![Format::Umd];
    config.build.name = Some("Positive".into());
    config.build.globals = [("zod".to_string(), "Zod".to_string())].into();
    config.build.dts = false;
    config.build.sourcemap = false;

    LibraryBuilder::new(config, dir.path()).build().await.unwrap();

    let dist = dir.path().join("dist");
    assert_eq!(names(&dist), vec!["index.umd.js"]);
    let umd = fs::read_to_string(dist.join("index.umd.js")).unwrap();
    assert!(umd.contains("Zod"), "{umd}");
    assert!(umd.contains("Positive"), "{umd}");
}

#[tokio::test]
async fn umd_without_global_writes_nothing() {
    let dir = project();
    let mut config = config();
    config.build.formats = vec![Format::Es, Format::Umd];
    config.build.name = Some("Lib".into());

    let err = LibraryBuilder::new(config, dir.path())
        .build()
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::MissingGlobal { ref external }) if external == "zod"
    ));
    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn failed_build_keeps_previous_output() {
    let dir = project();
    write(dir.path(), "dist/index.js", "previous build");
    write(
        dir.path(),
        "src/util.ts",
        "export { clamp } from './missing';\n",
    );

    let err = LibraryBuilder::new(config(), dir.path())
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Graph(GraphError::Unresolved { .. })), "{err}");

    let dist = dir.path().join("dist");
    assert_eq!(names(&dist), vec!["index.js"]);
    assert_eq!(fs::read_to_string(dist.join("index.js")).unwrap(), "previous build");
}

#[tokio::test]
async fn replace_mode_clears_stale_files() {
    let dir = project();
    write(dir.path(), "dist/old-chunk.js", "stale");

    LibraryBuilder::new(config(), dir.path()).build().await.unwrap();
    assert!(!dir.path().join("dist/old-chunk.js").exists());
}

#[tokio::test]
async fn merge_mode_keeps_unrelated_files() {
    let dir = project();
    write(dir.path(), "dist/README.md", "keep me");
    let mut config = config();
    config.build.empty_out_dir = false;

    LibraryBuilder::new(config, dir.path()).build().await.unwrap();

    let dist = dir.path().join("dist");
    assert_eq!(fs::read_to_string(dist.join("README.md")).unwrap(), "keep me");
    assert!(dist.join("index.js").exists());
}

#[tokio::test]
async fn circular_imports_fail_unless_allowed() {
    let dir = project();
    write(
        dir.path(),
        "src/util.ts",
        "import { Positive } from './schemas';\nexport const clamp = (n: number): number => Math.max(0, n);\nexport const again = (): unknown => Positive;\n",
    );

    let err = LibraryBuilder::new(config(), dir.path())
        .build()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Graph(GraphError::Circular { .. })), "{err}");

    let mut config = config();
    config.build.allow_circular = true;
    config.build.dts = false;
    let report = LibraryBuilder::new(config, dir.path()).build().await.unwrap();
    assert!(!report.warnings.is_empty());
}

#[tokio::test]
async fn concurrent_builds_into_one_directory_are_serialized() {
    let dir = project();
    let root = dir.path().to_path_buf();

    let first = tokio::spawn({
        let root = root.clone();
        async move { LibraryBuilder::new(config(), root).build().await }
    });
    let second = tokio::spawn({
        let root = root.clone();
        async move { LibraryBuilder::new(config(), root).build().await }
    });

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(names(&root.join("dist")).len(), 5);
    let leftovers: Vec<_> = names(&root)
        .into_iter()
        .filter(|n| n.starts_with(".bale") || n.ends_with(".bale.lock"))
        .collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[tokio::test]
async fn externals_imported_by_bundled_packages_stay_external() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "src/index.ts",
        "import { shout } from 'tiny';\n\nexport function run(): string {\n  return shout('hi');\n}\n",
    );
    write(
        root,
        "node_modules/tiny/package.json",
        r#"{ "name": "tiny", "type": "module", "main": "index.js" }"#,
    );
    write(
        root,
        "node_modules/tiny/index.js",
        "import { z } from 'zod';\nimport { version } from 'zod/meta';\n\nexport const shout = (s) => `${z}:${version}:${s.toUpperCase()}`;\n",
    );
    write(
        root,
        "node_modules/zod/package.json",
        r#"{ "name": "zod", "type": "module", "main": "index.js", "exports": { ".": "./index.js", "./meta": "./meta.js" } }"#,
    );
    write(
        root,
        "node_modules/zod/index.js",
        "export const z = 'ZOD_BUNDLED_MARKER';\n",
    );
    write(
        root,
        "node_modules/zod/meta.js",
        "export const version = 'ZOD_META_MARKER';\n",
    );

    let mut config = config();
    config.build.dts = false;
    config.build.sourcemap = false;
    LibraryBuilder::new(config, root).build().await.unwrap();

    let dist = root.join("dist");
    for file in ["index.js", "index.cjs"] {
        let code = fs::read_to_string(dist.join(file)).unwrap();
        assert!(code.contains("toUpperCase"), "{file}: {code}");
        assert!(!code.contains("ZOD_BUNDLED_MARKER"), "{file}: {code}");
        assert!(!code.contains("ZOD_META_MARKER"), "{file}: {code}");
        assert!(code.contains("zod/meta"), "{file}: {code}");
    }
}
